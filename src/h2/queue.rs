use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::h2::error::Error;
use crate::h2::frame::FrameWrite;
use crate::h2::stream::Stream;

/// Schedules streams with a pending frame for transmission.
///
/// Every enqueued unit must be followed by exactly one [`Stream::transmit`] call.
pub trait Dispatch: Send + Sync {
    fn enqueue(&self, stream: Arc<Stream>, urgent: bool);
}

/// First in first out [`Dispatch`], urgent units are placed at the front.
#[derive(Debug, Default)]
pub struct WriteQueue {
    queue: Mutex<VecDeque<Arc<Stream>>>,
    notify: Notify,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<Stream>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn try_next(&self) -> Option<Arc<Stream>> {
        self.lock().pop_front()
    }

    /// Wait for the next stream to transmit.
    pub async fn next(&self) -> Arc<Stream> {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if let Some(stream) = self.try_next() {
                return stream;
            }
            notified.await;
        }
    }

    /// Wait for the next stream and transmit its pending frame into `writer`.
    pub async fn transmit_next<W: FrameWrite + ?Sized>(&self, writer: &mut W) -> Result<(), Error> {
        let stream = self.next().await;
        stream.transmit(writer)
    }
}

impl Dispatch for WriteQueue {
    fn enqueue(&self, stream: Arc<Stream>, urgent: bool) {
        {
            let mut queue = self.lock();
            if urgent {
                queue.push_front(stream);
            } else {
                queue.push_back(stream);
            }
        }
        self.notify.notify_one();
    }
}
