use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Broadcast that fires at most once.
///
/// Every current and future waiter observes the signal after [`Signal::fire`].
#[derive(Debug, Default)]
pub struct Signal {
    fired: AtomicBool,
    notify: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal, returns `false` if it was already fired.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    #[inline]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Wait until the signal is fired.
    pub async fn wait(&self) {
        loop {
            let mut notified = pin!(self.notify.notified());
            // register before checking the flag, so `notify_waiters` in between is not lost
            notified.as_mut().enable();
            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use super::Signal;

    #[tokio::test]
    async fn wakes_all_waiters() {
        let signal = Arc::new(Signal::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let signal = Arc::clone(&signal);
                tokio::spawn(async move { signal.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        assert!(signal.fire());
        assert!(!signal.fire());

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn fired_before_wait() {
        let signal = Signal::new();
        signal.fire();
        assert!(signal.is_fired());
        tokio::time::timeout(Duration::from_secs(1), signal.wait()).await.unwrap();
    }
}
