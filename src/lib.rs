//! Inventory driver for UHF RFID reader modules speaking the length-prefixed,
//! CRC-16 terminated command protocol over a serial link.
//!
//! # Features
//!
//! - `serial` - Serial port transport using the serialport crate
//!
//! # Example
//!
//! ```ignore
//! use uhf_inventory::{InventoryEvent, InventorySession, PowerSequencer, ReaderConfig, SerialOpener};
//!
//! let mut session = InventorySession::new(SerialOpener).with_power(PowerSequencer::handheld_defaults());
//! let events = session.subscribe();
//!
//! session.connect(ReaderConfig::default())?;
//! session.start_inventory()?;
//!
//! while let Ok(event) = events.recv() {
//!     if let InventoryEvent::TagRead(tag) = event {
//!         println!("Found tag: {} ({} dBm)", tag.epc_hex(), tag.rssi);
//!     }
//! }
//! ```

pub mod command;
pub mod crc;
pub mod frame;
mod observer;
mod power;
mod reader;
pub mod tag;
mod transport;
mod types;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use command::{Command, InventoryParams, BROADCAST_ADDRESS};
pub use frame::{FrameDecoder, ResponseFrame};
pub use observer::{InventoryEvent, InventoryObserver};
pub use power::{PowerControl, PowerSequencer, SysfsPowerNode};
pub use reader::InventorySession;
pub use tag::TagRecords;
pub use transport::{RfidTransport, TransportOpener};
pub use types::{ReaderConfig, RfidError, SessionState, SessionTimings, TagRecord};

#[cfg(feature = "serial")]
pub use serial::{SerialOpener, SerialTransport};
