//! Response framing over an unreliable byte stream
//!
//! Frames are found by their length byte and confirmed by CRC. Noise is
//! dropped one byte at a time so a valid frame right behind it still decodes,
//! and a frame split across reads stays buffered until the rest arrives.

use log::{debug, trace};

use crate::crc::verify_crc;
use crate::types::{bytes_to_hex, RfidError};

/// Smallest number of bytes worth looking at
const MIN_FRAME_LEN: usize = 5;
const MIN_LENGTH_BYTE: u8 = 4;
const MAX_LENGTH_BYTE: u8 = 250;

/// A CRC-valid frame borrowed from the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame<'a> {
    raw: &'a [u8],
}

impl<'a> ResponseFrame<'a> {
    /// Parse exactly one frame.
    ///
    /// `bytes` must hold the whole frame and nothing else.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, RfidError> {
        let Some(&length) = bytes.first() else {
            return Err(RfidError::Protocol("Empty frame".into()));
        };
        if !(MIN_LENGTH_BYTE..=MAX_LENGTH_BYTE).contains(&length) {
            return Err(RfidError::Protocol(format!(
                "Length byte out of range: {}",
                length
            )));
        }
        if bytes.len() != length as usize + 1 {
            return Err(RfidError::Protocol(format!(
                "Length byte claims {} bytes but frame has {}",
                length as usize + 1,
                bytes.len()
            )));
        }
        if !verify_crc(bytes) {
            return Err(RfidError::Protocol(format!(
                "CRC mismatch in frame {}",
                bytes_to_hex(bytes)
            )));
        }
        Ok(Self { raw: bytes })
    }

    /// The frame's length byte
    pub fn length(&self) -> u8 {
        self.raw[0]
    }

    pub fn address(&self) -> u8 {
        self.raw[1]
    }

    pub fn opcode(&self) -> u8 {
        self.raw[2]
    }

    /// Status byte, absent on the shortest frames
    pub fn status(&self) -> Option<u8> {
        // the status byte is only present when it is not part of the CRC
        (self.raw.len() > 5).then(|| self.raw[3])
    }

    /// Bytes after the status byte, up to the CRC
    pub fn data(&self) -> &'a [u8] {
        let end = self.raw.len() - 2;
        self.raw.get(4..end).unwrap_or(&[])
    }

    /// The whole frame, CRC included
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }
}

/// Scan `buffer` for frames.
///
/// Returns how many leading bytes were consumed (frames and discarded noise)
/// along with the frames found. The unconsumed tail is either shorter than
/// the smallest frame or the start of a frame still being received.
pub fn decode(buffer: &[u8]) -> (usize, Vec<ResponseFrame<'_>>) {
    let mut frames = Vec::new();
    let mut index = 0;

    while buffer.len() - index >= MIN_FRAME_LEN {
        let length = buffer[index];
        if !(MIN_LENGTH_BYTE..=MAX_LENGTH_BYTE).contains(&length) {
            trace!("Skipping 0x{:02X}: not a length byte", length);
            index += 1;
            continue;
        }

        let end = index + length as usize + 1;
        if end > buffer.len() {
            // partial frame, wait for the rest
            break;
        }

        match ResponseFrame::parse(&buffer[index..end]) {
            Ok(frame) => {
                frames.push(frame);
                index = end;
            }
            Err(e) => {
                trace!("Resync at offset {}: {}", index, e);
                index += 1;
            }
        }
    }

    (index, frames)
}

/// Receive buffer that keeps partial frames between reads
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes and hand every complete frame to `on_frame`.
    ///
    /// Consumed bytes are removed afterwards; whatever remains belongs to a
    /// frame that has not fully arrived yet.
    pub fn feed<F>(&mut self, bytes: &[u8], mut on_frame: F) -> usize
    where
        F: FnMut(ResponseFrame<'_>),
    {
        self.buffer.extend_from_slice(bytes);

        let (consumed, frames) = decode(&self.buffer);
        let count = frames.len();
        for frame in frames {
            debug!(
                "Frame: addr=0x{:02X} cmd=0x{:02X} status={:?} len={}",
                frame.address(),
                frame.opcode(),
                frame.status(),
                frame.length()
            );
            on_frame(frame);
        }

        self.buffer.drain(..consumed);
        count
    }

    /// Bytes held back for the next read
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
