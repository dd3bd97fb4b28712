//! Fan-out of connection events to subscribers.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use crate::types::ConnectionEvent;

#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<ConnectionEvent>>>,
}

impl EventBus {
    pub(crate) fn subscribe(&self) -> Receiver<ConnectionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber, forgetting the ones that hung up.
    pub(crate) fn emit(&self, event: ConnectionEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_order_and_prunes_dropped() {
        let bus = EventBus::default();
        let first = bus.subscribe();
        let second = bus.subscribe();
        drop(second);

        bus.emit(ConnectionEvent::Opened);
        bus.emit(ConnectionEvent::Closed);

        assert_eq!(first.try_recv(), Ok(ConnectionEvent::Opened));
        assert_eq!(first.try_recv(), Ok(ConnectionEvent::Closed));
        assert!(first.try_recv().is_err());
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    }
}
