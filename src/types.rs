//! Types shared across the inventory driver

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::command::InventoryParams;

/// A tag observed during an inventory round
#[derive(Debug, Clone)]
pub struct TagRecord {
    /// Protocol-Control word that preceded the EPC
    pub pc: u16,
    pub epc: Vec<u8>,
    /// Signal strength in dBm
    pub rssi: i8,
}

impl TagRecord {
    /// EPC as an uppercase hex string
    pub fn epc_hex(&self) -> String {
        bytes_to_hex(&self.epc)
    }
}

impl PartialEq for TagRecord {
    fn eq(&self, other: &Self) -> bool {
        self.epc == other.epc
    }
}

/// Lifecycle state of an [`InventorySession`](crate::InventorySession)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Scanning,
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Scanning => "scanning",
            SessionState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Time constants used by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Delay after powering the module before the transport is opened
    pub power_settle: Duration,
    /// Sleep between polls when the transport has nothing to read
    pub idle_poll: Duration,
    /// How long `stop_inventory` waits for the worker to exit
    pub stop_timeout: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            power_settle: Duration::from_millis(1500),
            idle_poll: Duration::from_millis(10),
            stop_timeout: Duration::from_secs(1),
        }
    }
}

/// Reader settings passed at connect or configure time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Transport endpoint, e.g. a serial device path
    pub endpoint: String,
    pub baud_rate: u32,
    /// Opaque open flags handed to the transport opener
    pub open_flags: u32,
    /// Reader address; `0xFF` broadcasts
    pub address: u8,
    /// Output power in dBm
    pub output_power: i8,
    pub inventory: InventoryParams,
    pub timings: SessionTimings,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            endpoint: "/dev/ttyHSL0".into(),
            baud_rate: 115_200,
            open_flags: 0,
            address: 0xFF,
            output_power: 30,
            inventory: InventoryParams::default(),
            timings: SessionTimings::default(),
        }
    }
}

/// Errors that can occur while driving the reader
#[derive(Debug, Error)]
pub enum RfidError {
    /// Transport open, read, write or close failed
    #[error("Transport error: {0}")]
    Transport(String),
    /// Invalid parameter, or the operation is not allowed in the current state
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Malformed frame received from the reader
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert bytes to uppercase hex string
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
