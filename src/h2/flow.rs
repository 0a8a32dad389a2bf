//! Flow control windows and the allocation contract used by the stream write path.
use futures_core::future::BoxFuture;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::h2::error::Error;
use crate::h2::stream::Stream;

/// Maximum flow-control window size, 2^31-1.
pub const MAX_WINDOW_SIZE: i64 = (1 << 31) - 1;

/// Initial connection flow-control window, it is not affected by SETTINGS.
pub const DEFAULT_CONNECTION_WINDOW: u32 = 65_535;

// ===== Allocate =====

/// Grants permission to send DATA octets on a stream.
///
/// An allocation may grant less than `wanted`, and may wait until the window is replenished.
/// Implementations must resolve with an error once the stream or the connection is closed.
pub trait Allocate: Send + Sync {
    fn allocate<'a>(&'a self, stream: &'a Stream, wanted: usize) -> BoxFuture<'a, Result<usize, Error>>;
}

/// Allocates from the stream window and the connection window, bounded by the peer's
/// `SETTINGS_MAX_FRAME_SIZE`.
#[derive(Debug, Default)]
pub struct WindowAllocator;

impl Allocate for WindowAllocator {
    fn allocate<'a>(&'a self, stream: &'a Stream, wanted: usize) -> BoxFuture<'a, Result<usize, Error>> {
        Box::pin(async move {
            let Some(flow) = stream.send_flow() else {
                return Err(Error::StreamClosed);
            };
            let conn = stream.connection();
            let wanted = wanted.min(conn.remote_max_frame_size());

            let granted = flow.allocate(wanted).await?;
            if granted == 0 {
                return Ok(0);
            }

            let conn_granted = match conn.send_flow().allocate(granted).await {
                Ok(n) => n,
                Err(err) => {
                    flow.release(granted);
                    return Err(err);
                }
            };
            if conn_granted < granted {
                flow.release(granted - conn_granted);
            }
            Ok(conn_granted)
        })
    }
}

// ===== Send Window =====

/// Window of octets the peer allows us to send.
#[derive(Debug)]
pub struct SendWindow {
    window: Mutex<i64>,
    cancelled: AtomicBool,
    notify: Notify,
}

impl SendWindow {
    pub fn new(initial: u32) -> Self {
        Self {
            window: Mutex::new(initial as i64),
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, i64> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current window, negative if a SETTINGS change shrunk it below outstanding data.
    pub fn window(&self) -> i64 {
        *self.lock()
    }

    /// Apply WINDOW_UPDATE increment or SETTINGS_INITIAL_WINDOW_SIZE delta.
    pub fn increment_window(&self, delta: i64) -> Result<(), Error> {
        {
            let mut window = self.lock();
            let next = *window + delta;
            if next > MAX_WINDOW_SIZE {
                return Err(Error::FlowControl);
            }
            *window = next;
        }
        if delta > 0 {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    /// Give back octets that were allocated but never sent.
    pub(crate) fn release(&self, n: usize) {
        *self.lock() += n as i64;
        self.notify.notify_waiters();
    }

    /// Force the window to zero, no further octets can be granted.
    pub fn drain(&self) {
        *self.lock() = 0;
    }

    /// Fail every pending and future allocation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Grant up to `wanted` octets without waiting.
    pub fn try_allocate(&self, wanted: usize) -> Result<usize, Error> {
        if self.is_cancelled() {
            return Err(Error::StreamClosed);
        }
        let mut window = self.lock();
        if *window <= 0 {
            return Ok(0);
        }
        let granted = wanted.min(*window as usize);
        *window -= granted as i64;
        Ok(granted)
    }

    /// Grant up to `wanted` octets, waiting while the window is empty.
    pub async fn allocate(&self, wanted: usize) -> Result<usize, Error> {
        if wanted == 0 {
            return Ok(0);
        }
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            let granted = self.try_allocate(wanted)?;
            if granted != 0 {
                return Ok(granted);
            }
            notified.await;
        }
    }
}

// ===== Receive Window =====

/// Window of octets we allow the peer to send.
#[derive(Debug)]
pub struct RecvWindow {
    inner: Mutex<RecvInner>,
}

#[derive(Debug)]
struct RecvInner {
    initial: u32,
    window: i64,
    /// received octets not yet returned
    consumed: u32,
    /// returned octets not yet announced with WINDOW_UPDATE
    unannounced: u32,
}

impl RecvWindow {
    pub fn new(initial: u32) -> Self {
        Self {
            inner: Mutex::new(RecvInner {
                initial,
                window: initial as i64,
                consumed: 0,
                unannounced: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecvInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn window(&self) -> i64 {
        self.lock().window
    }

    /// Octets received and not yet returned.
    pub fn consumed(&self) -> u32 {
        self.lock().consumed
    }

    /// Charge received DATA octets against the window.
    pub fn consume(&self, n: u32) -> Result<(), Error> {
        let mut inner = self.lock();
        if n as i64 > inner.window {
            return Err(Error::FlowControl);
        }
        inner.window -= n as i64;
        inner.consumed += n;
        Ok(())
    }

    /// Return processed octets to the window.
    ///
    /// Returns the increment to announce with WINDOW_UPDATE once at least half of the initial
    /// window is pending.
    pub fn return_bytes(&self, n: u32) -> Option<u32> {
        let mut inner = self.lock();
        let n = n.min(inner.consumed);
        if n == 0 {
            return None;
        }
        inner.consumed -= n;
        inner.window += n as i64;
        inner.unannounced += n;

        if inner.unannounced >= inner.initial / 2 {
            Some(std::mem::take(&mut inner.unannounced))
        } else {
            None
        }
    }
}
