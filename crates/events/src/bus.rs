//! Fan-out of committed fulfillment events.
//!
//! The bus carries notifications about changes the store has already made
//! durable. Nothing here is replayed or persisted, so a consumer that misses a
//! message reads current state from the store instead.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, TryRecvError};

/// Receiving end handed out by [`EventBus::subscribe`].
///
/// Every subscription sees every message published after it was created, in
/// publish order. The audit thread in the server holds one:
///
/// ```ignore
/// let sub = bus.subscribe();
/// while let Ok(envelope) = sub.recv() {
///     audit(envelope);
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    inbox: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(inbox: Receiver<M>) -> Self {
        Self { inbox }
    }

    /// Blocks; fails once the bus is gone.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.inbox.recv()
    }

    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.inbox.try_recv()
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&self) -> Vec<M> {
        self.inbox.try_iter().collect()
    }
}

/// Publisher side of the notification stream.
///
/// Callers publish only after commit. A failed publish is reported back to the
/// caller and never undoes the write it describes.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        <B as EventBus<M>>::publish(self, message)
    }

    fn subscribe(&self) -> Subscription<M> {
        <B as EventBus<M>>::subscribe(self)
    }
}
