// src/store/observer.rs

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::store::TransitionEvent;

/// Subscribers interested in transition events.
///
/// Cloning shares the subscriber list. Events are delivered over unbounded
/// channels, so publishing never waits on a slow consumer and never calls
/// consumer code. Closed receivers are dropped on the next publish.
#[derive(Debug, Clone, Default)]
pub struct Observers {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<TransitionEvent>>>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TransitionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.lock().is_empty()
    }

    pub(crate) fn publish(&self, event: &TransitionEvent) {
        self.senders
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
