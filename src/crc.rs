//! CRC-16 used by the reader's framing.
//!
//! Reflected CCITT polynomial (`0x8408`), seed `0xFFFF`, LSB-first, no final
//! XOR. The check value over `"123456789"` is `0x6F91`. The CRC is sent low
//! byte first.

const POLY: u16 = 0x8408;
const SEED: u16 = 0xFFFF;

/// Compute the CRC over all of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(SEED, |mut crc, &byte| {
        crc ^= byte as u16;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
        crc
    })
}

/// Compute the CRC over `frame[..len]` and store it at `frame[len]` (low)
/// and `frame[len + 1]` (high).
///
/// The caller sizes the frame; `frame.len()` must be at least `len + 2`.
pub fn append_crc(frame: &mut [u8], len: usize) {
    let [lo, hi] = crc16(&frame[..len]).to_le_bytes();
    frame[len] = lo;
    frame[len + 1] = hi;
}

/// Check a frame against the length byte it carries.
///
/// `frame[0]` declares the byte count after itself, CRC included, so the
/// covered region is `frame[..declared - 1]` and the CRC sits right after it.
/// Anything too short for what it declares is rejected, never indexed.
pub fn verify_crc(frame: &[u8]) -> bool {
    let Some(&declared) = frame.first() else {
        return false;
    };
    let covered = (declared as usize).saturating_sub(1);
    if covered < 2 || covered + 2 > frame.len() {
        return false;
    }
    let [lo, hi] = crc16(&frame[..covered]).to_le_bytes();
    frame[covered] == lo && frame[covered + 1] == hi
}
