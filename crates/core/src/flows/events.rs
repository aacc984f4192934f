use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Change notifications emitted by the flows.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// The list flow's in-memory list changed.
    GamesChanged {
        /// New list length.
        len: usize,
    },
    /// The detail flow's record was loaded or changed.
    GameChanged {
        /// Record identifier.
        id: i64,
    },
    /// The favorites list changed.
    FavoritesChanged {
        /// New visible list length.
        len: usize,
    },
    /// A request failed and local data is being shown instead.
    NetworkFallback {
        /// Rendered network error.
        reason: String,
    },
    /// A background write to the local store failed.
    StorageFailed {
        /// Rendered store error.
        reason: String,
    },
}

/// Subscribers of one flow. Closed receivers are dropped on the next emit.
#[derive(Default)]
pub struct Observers {
    senders: Mutex<Vec<UnboundedSender<FlowEvent>>>,
}

impl Observers {
    /// Register a new subscriber.
    pub fn subscribe(&self) -> UnboundedReceiver<FlowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn emit(&self, event: FlowEvent) {
        self.senders
            .lock()
            .retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Number of live subscribers as of the last emit.
    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    /// Whether nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_to_every_subscriber_and_prunes_closed_ones() {
        let observers = Observers::default();
        let mut first = observers.subscribe();
        let second = observers.subscribe();
        drop(second);

        observers.emit(FlowEvent::GamesChanged { len: 3 });
        assert_eq!(first.try_recv().ok(), Some(FlowEvent::GamesChanged { len: 3 }));
        assert_eq!(observers.len(), 1);
    }
}
