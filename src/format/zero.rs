use super::{check_len, read_slots, read_u16, write_slots, RecordFormat};
use crate::{inputs::FeatureSet, Error, Result};

/// Number of (move, visit share) pairs stored per position.
pub const POLICY_TOP_K: usize = 16;

/// Size of the policy output (compact from/to encoding used by the search).
pub const WIDTH_POLICY: usize = 1792;

// Byte offsets of each region, as running sums of region sizes.
const O1: usize = 2 * 64;
const O2: usize = O1 + 2 * POLICY_TOP_K;
const O3: usize = O2 + 4 * POLICY_TOP_K;
const O4: usize = O3 + 1;

const _RIGHT_SIZE: () = assert!(O4 == ZeroRecord::RECORD_SIZE);

/// Self-play record.
///
/// | bytes          | contents                                   |
/// |----------------|--------------------------------------------|
/// | `[0, 128)`     | 32 + 32 `u16` feature slots                |
/// | `[128, 160)`   | `POLICY_TOP_K` `u16` policy indices        |
/// | `[160, 224)`   | `POLICY_TOP_K` `f32` visit probabilities   |
/// | `[224, 225)`   | `i8` game outcome for the side to move     |
///
/// Unused policy entries carry index 0 with probability 0. Every policy index
/// is below [`WIDTH_POLICY`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZeroRecord {
    pub features: FeatureSet<32>,
    policy_indices: [u16; POLICY_TOP_K],
    pub policy_values: [f32; POLICY_TOP_K],
    pub outcome: i8,
}

impl ZeroRecord {
    pub fn new(
        features: FeatureSet<32>,
        policy_indices: [u16; POLICY_TOP_K],
        policy_values: [f32; POLICY_TOP_K],
        outcome: i8,
    ) -> Result<Self> {
        if let Some(&label) = policy_indices.iter().find(|&&idx| usize::from(idx) >= WIDTH_POLICY) {
            return Err(Error::InvalidLabel { label, limit: WIDTH_POLICY });
        }

        Ok(Self { features, policy_indices, policy_values, outcome })
    }

    pub fn policy_indices(&self) -> &[u16; POLICY_TOP_K] {
        &self.policy_indices
    }

    /// Outcome mapped from {-1, 0, 1} onto a win probability.
    pub fn outcome_target(&self) -> f32 {
        (f32::from(self.outcome) + 1.0) / 2.0
    }

    /// Policy slot with the largest visit share, if any carries weight.
    pub fn best_policy_index(&self) -> Option<u16> {
        self.policy_indices
            .iter()
            .zip(&self.policy_values)
            .filter(|&(_, &p)| p > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&idx, _)| idx)
    }
}

impl RecordFormat for ZeroRecord {
    const RECORD_SIZE: usize = 225;
    const SLOTS: usize = 32;

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len::<Self>(bytes)?;

        let own = read_slots::<32>(bytes, 0);
        let opp = read_slots::<32>(bytes, 32);

        let mut policy_indices = [0; POLICY_TOP_K];
        for (i, idx) in policy_indices.iter_mut().enumerate() {
            *idx = read_u16(bytes, O1 + 2 * i);
        }

        let mut policy_values = [0.0; POLICY_TOP_K];
        for (word, val) in bytes[O2..O3].chunks_exact(4).zip(policy_values.iter_mut()) {
            *val = f32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }

        let outcome = bytes[O3] as i8;

        Self::new(FeatureSet::from_raw(own, opp)?, policy_indices, policy_values, outcome)
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::RECORD_SIZE);
        write_slots(&mut buf, &self.features.raw_own());
        write_slots(&mut buf, &self.features.raw_opp());
        write_slots(&mut buf, &self.policy_indices);
        for val in self.policy_values {
            buf.extend_from_slice(&val.to_le_bytes());
        }
        buf.push(self.outcome as u8);
        buf
    }

    fn own(&self) -> &[u16] {
        self.features.own()
    }

    fn opp(&self) -> &[u16] {
        self.features.opp()
    }

    fn value_target(&self) -> f32 {
        self.outcome_target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::{EMPTY_SLOT, PAD};

    fn sample() -> ZeroRecord {
        let mut own = [EMPTY_SLOT; 32];
        own[..3].copy_from_slice(&[10, 20, 30]);
        let mut opp = [EMPTY_SLOT; 32];
        opp[0] = 40;

        let mut policy_indices = [0; POLICY_TOP_K];
        let mut policy_values = [0.0; POLICY_TOP_K];
        policy_indices[..3].copy_from_slice(&[7, 1000, 1791]);
        policy_values[..3].copy_from_slice(&[0.25, 0.5, 0.25]);

        ZeroRecord::new(FeatureSet::from_raw(own, opp).unwrap(), policy_indices, policy_values, -1).unwrap()
    }

    #[test]
    fn offsets() {
        assert_eq!((O1, O2, O3, O4), (128, 160, 224, 225));
    }

    #[test]
    fn decode_fields() {
        let bytes = sample().encode();
        assert_eq!(bytes.len(), 225);
        assert_eq!(bytes[224], 0xFF);
        assert_eq!(&bytes[160..164], &0.25f32.to_le_bytes());

        let record = ZeroRecord::decode(&bytes).unwrap();
        assert_eq!(record, sample());
        assert_eq!(record.features.own()[3], PAD);
        assert_eq!(record.outcome_target(), 0.0);
        assert_eq!(record.best_policy_index(), Some(1000));
    }

    #[test]
    fn canonical_bytes_round_trip() {
        let bytes = sample().encode();
        assert_eq!(ZeroRecord::decode(&bytes).unwrap().encode(), bytes);
    }

    #[test]
    fn empty_slots_round_trip_as_written() {
        let mut bytes = vec![0xFF; O1];
        bytes[..2].copy_from_slice(&5u16.to_le_bytes());
        bytes.resize(O2, 0);
        bytes.resize(O3, 0);
        bytes.push(1);

        let record = ZeroRecord::decode(&bytes).unwrap();
        assert_eq!(record.features.active(), (1, 0));
        assert_eq!(record.outcome_target(), 1.0);
        assert_eq!(record.encode(), bytes);
    }

    #[test]
    fn policy_index_out_of_range() {
        let mut bytes = sample().encode();
        bytes[O1..O1 + 2].copy_from_slice(&1792u16.to_le_bytes());
        assert!(matches!(ZeroRecord::decode(&bytes), Err(Error::InvalidLabel { label: 1792, .. })));
    }

    #[test]
    fn constructor_checks_policy_indices() {
        let mut indices = *sample().policy_indices();
        indices[15] = 2000;
        let res = ZeroRecord::new(FeatureSet::default(), indices, [0.0; POLICY_TOP_K], 0);
        assert!(matches!(res, Err(Error::InvalidLabel { label: 2000, limit: WIDTH_POLICY })));
    }

    #[test]
    fn wrong_length_is_malformed() {
        let bytes = sample().encode();
        assert!(matches!(ZeroRecord::decode(&bytes[..224]), Err(Error::MalformedRecord { expected: 225, actual: 224 })));
    }
}
