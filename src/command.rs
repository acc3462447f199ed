//! Outbound command frames
//!
//! Every frame is `[length, address, opcode, payload.., crc_lo, crc_hi]`
//! where `length` counts every byte after itself.

use crate::crc::append_crc;
use crate::types::RfidError;

/// Address that every reader on the link answers to
pub const BROADCAST_ADDRESS: u8 = 0xFF;

pub(crate) const INVENTORY: u8 = 0x01;
pub(crate) const SET_OUTPUT_POWER: u8 = 0x2F;
pub(crate) const SET_ANTENNA_MUX: u8 = 0x3F;
pub(crate) const STOP_INVENTORY: u8 = 0x93;

pub(crate) const MAX_OUTPUT_POWER_DBM: i8 = 33;

/// Parameters of a single EPC Gen2 inventory round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryParams {
    /// Initial Q (slot count exponent), 0-15
    pub q_value: u8,
    /// Gen2 session S0-S3
    pub session: u8,
    /// Inventoried flag target, 0 = A, 1 = B
    pub target: u8,
    /// Antenna selection; `0x80` lets the module use all antennas
    pub antenna_mask: u8,
    /// Round length in units of 100 ms
    pub scan_time: u8,
}

impl Default for InventoryParams {
    fn default() -> Self {
        Self {
            q_value: 4,
            session: 0,
            target: 0,
            antenna_mask: 0x80,
            scan_time: 10,
        }
    }
}

impl InventoryParams {
    pub fn validate(&self) -> Result<(), RfidError> {
        if self.q_value > 15 {
            return Err(RfidError::Configuration(format!(
                "Q value must be 0-15, got {}",
                self.q_value
            )));
        }
        if self.session > 3 {
            return Err(RfidError::Configuration(format!(
                "Session must be 0-3, got {}",
                self.session
            )));
        }
        if self.target > 1 {
            return Err(RfidError::Configuration(format!(
                "Target must be 0 (A) or 1 (B), got {}",
                self.target
            )));
        }
        if self.scan_time == 0 {
            return Err(RfidError::Configuration(
                "Scan time must be at least 1 (100 ms)".into(),
            ));
        }
        Ok(())
    }

    /// Length of one round as a [`Duration`](std::time::Duration)
    pub fn scan_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scan_time as u64 * 100)
    }
}

/// Commands understood by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run one inventory round
    Inventory(InventoryParams),
    /// Abort the running inventory round
    StopInventory,
    /// Set RF output power in dBm
    SetOutputPower(i8),
    /// Select the working antennas
    SetAntennaMux(u8),
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Inventory(_) => INVENTORY,
            Command::StopInventory => STOP_INVENTORY,
            Command::SetOutputPower(_) => SET_OUTPUT_POWER,
            Command::SetAntennaMux(_) => SET_ANTENNA_MUX,
        }
    }

    /// Check parameters before anything is sent
    pub fn validate(&self) -> Result<(), RfidError> {
        match self {
            Command::Inventory(params) => params.validate(),
            Command::SetOutputPower(dbm) if !(0..=MAX_OUTPUT_POWER_DBM).contains(dbm) => {
                Err(RfidError::Configuration(format!(
                    "Output power must be 0-{} dBm, got {}",
                    MAX_OUTPUT_POWER_DBM, dbm
                )))
            }
            _ => Ok(()),
        }
    }

    /// Encode the command for the reader at `address`
    pub fn encode(&self, address: u8) -> Vec<u8> {
        match self {
            Command::Inventory(p) => create_command(
                address,
                INVENTORY,
                &[p.q_value, p.session, p.target, p.antenna_mask, p.scan_time],
            ),
            Command::StopInventory => create_command(address, STOP_INVENTORY, &[]),
            Command::SetOutputPower(dbm) => {
                create_command(address, SET_OUTPUT_POWER, &[*dbm as u8])
            }
            Command::SetAntennaMux(mask) => create_command(address, SET_ANTENNA_MUX, &[*mask]),
        }
    }
}

/// Build a framed command with its CRC.
///
/// Payloads are a handful of bytes; anything that would overflow the length
/// byte is a programming error in this module.
pub(crate) fn create_command(address: u8, opcode: u8, params: &[u8]) -> Vec<u8> {
    // length byte counts address, opcode, params and the two CRC bytes
    let length = (params.len() + 4) as u8;

    let mut cmd = Vec::with_capacity(params.len() + 5);
    cmd.push(length);
    cmd.push(address);
    cmd.push(opcode);
    cmd.extend_from_slice(params);
    cmd.extend_from_slice(&[0, 0]);

    let covered = cmd.len() - 2;
    append_crc(&mut cmd, covered);
    cmd
}
