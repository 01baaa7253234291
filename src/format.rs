mod eval;
mod moves;
mod zero;

pub use eval::EvalRecord;
pub use moves::{MoveRecord, MOVE_LABELS};
pub use zero::{ZeroRecord, POLICY_TOP_K, WIDTH_POLICY};

use crate::{Error, Result};

/// A fixed-width binary training record.
///
/// Every record in a dataset file occupies exactly `RECORD_SIZE` bytes, all
/// integers little-endian. `encode` writes empty feature slots in the spelling
/// they were decoded with, so decoding then encoding reproduces the input.
pub trait RecordFormat: Clone + Send + Sync + Sized + 'static {
    const RECORD_SIZE: usize;

    /// Feature slots per perspective.
    const SLOTS: usize;

    fn decode(bytes: &[u8]) -> Result<Self>;

    fn encode(&self) -> Vec<u8>;

    /// Side-to-move feature slots.
    fn own(&self) -> &[u16];

    /// Opponent feature slots.
    fn opp(&self) -> &[u16];

    /// The scalar target, on the scale the network is trained against.
    fn value_target(&self) -> f32;
}

pub(crate) fn check_len<R: RecordFormat>(bytes: &[u8]) -> Result<()> {
    if bytes.len() != R::RECORD_SIZE {
        return Err(Error::MalformedRecord { expected: R::RECORD_SIZE, actual: bytes.len() });
    }

    Ok(())
}

pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

pub(crate) fn read_slots<const N: usize>(bytes: &[u8], first: usize) -> [u16; N] {
    let mut slots = [0; N];
    for (i, slot) in slots.iter_mut().enumerate() {
        *slot = read_u16(bytes, 2 * (first + i));
    }
    slots
}

pub(crate) fn write_slots(buf: &mut Vec<u8>, slots: &[u16]) {
    for slot in slots {
        buf.extend_from_slice(&slot.to_le_bytes());
    }
}

/// Decodes a contiguous run of records, aborting on the first bad one.
pub fn decode_all<R: RecordFormat>(bytes: &[u8]) -> Result<Vec<R>> {
    if bytes.len() % R::RECORD_SIZE != 0 {
        return Err(Error::MalformedRecord {
            expected: bytes.len().next_multiple_of(R::RECORD_SIZE),
            actual: bytes.len(),
        });
    }

    bytes.chunks_exact(R::RECORD_SIZE).map(R::decode).collect()
}
