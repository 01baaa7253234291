use super::{check_len, read_slots, read_u16, write_slots, RecordFormat};
use crate::{
    inputs::{FeatureSet, PAD},
    Result,
};

/// Centipawn offset subtracted before scaling scores (the engine's tempo bonus).
pub const SCORE_TEMPO: f32 = 28.0;

/// Centipawns per unit of network output (the engine's endgame pawn value).
pub const SCORE_SCALE: f32 = 208.0;

/// Scalar evaluation record, 64 `u16` slots:
///
/// | slots    | contents                        |
/// |----------|---------------------------------|
/// | `0..32`  | side-to-move features           |
/// | `32..63` | opponent features               |
/// | `63`     | score (`i16`, centipawns)       |
///
/// The score shares storage with the last opponent slot, so that slot always
/// decodes as padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvalRecord {
    pub features: FeatureSet<32>,
    pub score: i16,
}

impl EvalRecord {
    /// Score on the scale the network output is trained against.
    pub fn normalised_score(&self) -> f32 {
        (f32::from(self.score) - SCORE_TEMPO) / SCORE_SCALE
    }
}

impl RecordFormat for EvalRecord {
    const RECORD_SIZE: usize = 128;
    const SLOTS: usize = 32;

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len::<Self>(bytes)?;

        let own = read_slots::<32>(bytes, 0);
        let mut opp = read_slots::<32>(bytes, 32);
        opp[31] = PAD;

        let score = read_u16(bytes, 126) as i16;

        Ok(Self { features: FeatureSet::from_raw(own, opp)?, score })
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::RECORD_SIZE);
        write_slots(&mut buf, &self.features.raw_own());
        write_slots(&mut buf, &self.features.raw_opp()[..31]);
        buf.extend_from_slice(&self.score.to_le_bytes());
        buf
    }

    fn own(&self) -> &[u16] {
        self.features.own()
    }

    fn opp(&self) -> &[u16] {
        self.features.opp()
    }

    fn value_target(&self) -> f32 {
        self.normalised_score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inputs::EMPTY_SLOT, Error};

    fn raw_record(own: &[u16], opp: &[u16], score: i16) -> Vec<u8> {
        let mut slots = [EMPTY_SLOT; 64];
        slots[..own.len()].copy_from_slice(own);
        slots[32..32 + opp.len()].copy_from_slice(opp);
        slots[63] = score as u16;
        slots.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    #[test]
    fn single_feature_position() {
        let bytes = raw_record(&[5], &[], 300);
        assert_eq!(bytes.len(), 128);

        let record = EvalRecord::decode(&bytes).unwrap();

        let mut own = [PAD; 32];
        own[0] = 5;
        assert_eq!(record.features.own(), &own);
        assert_eq!(record.features.opp(), &[PAD; 32]);
        assert_eq!(record.score, 300);
    }

    #[test]
    fn last_opponent_slot_is_forced_to_padding() {
        // a negative score has every bit set in its high byte, well outside the feature range
        let bytes = raw_record(&[1, 2], &[3, 4], -1234);
        let record = EvalRecord::decode(&bytes).unwrap();

        assert_eq!(record.features.opp()[31], PAD);
        assert_eq!(record.score, -1234);
        assert_eq!(record.features.active(), (2, 2));
    }

    #[test]
    fn score_normalisation() {
        let record = EvalRecord { features: FeatureSet::default(), score: 236 };
        assert_eq!(record.normalised_score(), 1.0);
        assert_eq!(record.value_target(), 1.0);
    }

    #[test]
    fn wrong_length_is_malformed() {
        let bytes = raw_record(&[], &[], 0);

        for len in [0, 127, 129, 256] {
            let mut buf = bytes.clone();
            buf.resize(len, 0);
            match EvalRecord::decode(&buf) {
                Err(Error::MalformedRecord { expected: 128, actual }) => assert_eq!(actual, len),
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[test]
    fn out_of_range_feature() {
        let bytes = raw_record(&[40961], &[], 0);
        assert!(matches!(EvalRecord::decode(&bytes), Err(Error::FeatureIndexOutOfRange { index: 40961, .. })));
    }

    #[test]
    fn canonical_bytes_round_trip() {
        let mut slots = [PAD; 64];
        slots[0] = 17;
        slots[1] = 40959;
        slots[32] = 8;
        slots[63] = (-77i16) as u16;
        let bytes: Vec<u8> = slots.iter().flat_map(|x| x.to_le_bytes()).collect();

        let record = EvalRecord::decode(&bytes).unwrap();
        assert_eq!(record.encode(), bytes);
    }

    #[test]
    fn empty_slots_round_trip_as_written() {
        let bytes = raw_record(&[5], &[], 300);
        assert_eq!(&bytes[2..4], &[0xFF, 0xFF]);

        let record = EvalRecord::decode(&bytes).unwrap();
        assert_eq!(record.features.active(), (1, 0));
        assert_eq!(record.encode(), bytes);
    }
}
