//! Process-local bus used by the server and by tests.

use std::sync::{Mutex, MutexGuard, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum InMemoryBusError {
    #[error("subscriber list lock poisoned")]
    Poisoned,
}

/// One unbounded channel per subscriber. A subscriber whose receiver was
/// dropped is forgotten on the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    outboxes: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self {
            outboxes: Mutex::new(Vec::new()),
        }
    }

    /// Subscribers known to the bus; dropped ones linger until the next publish.
    pub fn subscriber_count(&self) -> usize {
        self.outboxes().map(|o| o.len()).unwrap_or(0)
    }

    fn outboxes(&self) -> Result<MutexGuard<'_, Vec<mpsc::Sender<M>>>, InMemoryBusError> {
        self.outboxes.lock().map_err(|_| InMemoryBusError::Poisoned)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut outboxes = self.outboxes()?;
        outboxes.retain(|outbox| outbox.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (outbox, inbox) = mpsc::channel();
        if let Ok(mut outboxes) = self.outboxes() {
            outboxes.push(outbox);
        }
        Subscription::new(inbox)
    }
}
