//! Event distribution to outer listeners (audit, webhooks, realtime feeds).
//!
//! The bus is not a source of truth: portal state lives in the stores, and a
//! listener that misses events cannot recover them from the bus. Delivery is
//! at-least-once with no ordering guarantees between concurrent publishers.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// One listener's queue of published messages.
///
/// Sees every message published after it was attached. `None` from the
/// `next_*` methods means nothing arrived in time or the bus is gone.
#[derive(Debug)]
pub struct Listener<M> {
    receiver: Receiver<M>,
}

impl<M> Listener<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    pub fn try_next(&self) -> Option<M> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next message.
    pub fn next_within(&self, timeout: Duration) -> Option<M> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Publish/subscribe seam. Callers publish only after the state change is
/// committed, and a failed publish never undoes that change.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Listener<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Listener<M> {
        (**self).subscribe()
    }
}
