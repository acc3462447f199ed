//! Tag records inside inventory responses
//!
//! Inventory data: `[len, addr, 0x01, status, num, record.., crc_lo, crc_hi]`
//! with each record laid out as `[pc_hi, pc_lo, epc.., rssi]`.

use crate::command::INVENTORY;
use crate::frame::ResponseFrame;
use crate::types::TagRecord;

/// Shortest inventory response that can carry a record
const MIN_TAG_FRAME_LEN: u8 = 10;
/// EPC length used when the PC word is implausible
const DEFAULT_EPC_LEN: usize = 12;
const MAX_EPC_LEN: usize = 62;

const STATUS_ROUND_DONE: u8 = 0x01;
const STATUS_ROUND_TIMEOUT: u8 = 0x02;

/// EPC length in bytes announced by a PC word
pub fn epc_len_from_pc(pc: u16) -> usize {
    let words = ((pc >> 11) & 0x1F) as usize;
    match words * 2 {
        0 => DEFAULT_EPC_LEN,
        len if len > MAX_EPC_LEN => DEFAULT_EPC_LEN,
        len => len,
    }
}

/// Whether `frame` is an inventory response that carries tag data
pub fn carries_tags(frame: &ResponseFrame<'_>) -> bool {
    frame.opcode() == INVENTORY
        && frame.length() >= MIN_TAG_FRAME_LEN
        && matches!(
            frame.status(),
            Some(STATUS_ROUND_DONE) | Some(STATUS_ROUND_TIMEOUT)
        )
}

/// Records of an inventory response, decoded one at a time.
///
/// Stops at the announced count or at the first record that does not fit
/// before the CRC; a truncated record is silently dropped.
#[derive(Debug, Clone)]
pub struct TagRecords<'a> {
    body: &'a [u8],
    pos: usize,
    remaining: usize,
}

impl<'a> TagRecords<'a> {
    /// Iterate the records of `frame`. Frames that carry no tags yield nothing.
    pub fn new(frame: &ResponseFrame<'a>) -> Self {
        let data = frame.data();
        match data.split_first() {
            Some((&num, body)) if carries_tags(frame) => Self {
                body,
                pos: 0,
                remaining: num as usize,
            },
            _ => Self {
                body: &[],
                pos: 0,
                remaining: 0,
            },
        }
    }
}

impl Iterator for TagRecords<'_> {
    type Item = TagRecord;

    fn next(&mut self) -> Option<TagRecord> {
        if self.remaining == 0 {
            return None;
        }

        let rest = &self.body[self.pos..];
        let record = rest.get(..2).and_then(|pc_bytes| {
            let pc = u16::from_be_bytes([pc_bytes[0], pc_bytes[1]]);
            let epc_len = epc_len_from_pc(pc);
            let epc = rest.get(2..2 + epc_len)?;
            let rssi = *rest.get(2 + epc_len)? as i8;
            Some((
                TagRecord {
                    pc,
                    epc: epc.to_vec(),
                    rssi,
                },
                2 + epc_len + 1,
            ))
        });

        match record {
            Some((tag, used)) => {
                self.pos += used;
                self.remaining -= 1;
                Some(tag)
            }
            None => {
                self.remaining = 0;
                None
            }
        }
    }
}

/// Decode every tag of `frame`, handing each to `emit` as soon as it is read.
///
/// Returns the number of tags emitted.
pub fn decode_tags<F>(frame: &ResponseFrame<'_>, mut emit: F) -> usize
where
    F: FnMut(TagRecord),
{
    let mut count = 0;
    for tag in TagRecords::new(frame) {
        emit(tag);
        count += 1;
    }
    count
}
