//! Delivery of inventory results
//!
//! All callbacks run on the scan worker thread, never on the thread that
//! called into the session. Observers that need another thread (a UI loop,
//! an async runtime) should forward from here, which is what the
//! [`mpsc::Sender`] implementation does.

use std::sync::mpsc;

use log::debug;

use crate::types::TagRecord;

/// Receiver of scan results
pub trait InventoryObserver: Send + Sync {
    fn on_tag_read(&self, tag: &TagRecord);

    /// The scan loop has exited. Called exactly once per `start_inventory`.
    fn on_inventory_end(&self);

    /// The scan loop hit a transport failure and is about to exit
    fn on_error(&self, message: &str);

    /// One inventory round finished having reported `tags` records.
    ///
    /// A round with zero tags is the practical "nothing in the field" signal.
    fn on_round_complete(&self, _tags: usize) {}
}

/// Scan results as messages
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryEvent {
    TagRead(TagRecord),
    RoundComplete { tags: usize },
    InventoryEnd,
    Error(String),
}

impl InventoryObserver for mpsc::Sender<InventoryEvent> {
    fn on_tag_read(&self, tag: &TagRecord) {
        forward(self, InventoryEvent::TagRead(tag.clone()));
    }

    fn on_inventory_end(&self) {
        forward(self, InventoryEvent::InventoryEnd);
    }

    fn on_error(&self, message: &str) {
        forward(self, InventoryEvent::Error(message.to_string()));
    }

    fn on_round_complete(&self, tags: usize) {
        forward(self, InventoryEvent::RoundComplete { tags });
    }
}

fn forward(tx: &mpsc::Sender<InventoryEvent>, event: InventoryEvent) {
    if let Err(mpsc::SendError(event)) = tx.send(event) {
        debug!("Event receiver gone, dropping {:?}", event);
    }
}
