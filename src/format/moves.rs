use super::{check_len, read_slots, read_u16, write_slots, RecordFormat};
use crate::{inputs::FeatureSet, Error, Result};

/// Size of the (from, to) move label space.
pub const MOVE_LABELS: usize = 64 * 64;

/// Move-prediction record, 64 `u16` slots:
///
/// | slots    | contents                                  |
/// |----------|-------------------------------------------|
/// | `0..31`  | side-to-move features                     |
/// | `31..62` | opponent features                         |
/// | `62`     | move played, `from * 64 + to`             |
/// | `63`     | auxiliary score (`i16`, centipawns)       |
///
/// The label is always below [`MOVE_LABELS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRecord {
    pub features: FeatureSet<31>,
    label: u16,
    pub score: i16,
}

impl MoveRecord {
    pub fn new(features: FeatureSet<31>, label: u16, score: i16) -> Result<Self> {
        if usize::from(label) >= MOVE_LABELS {
            return Err(Error::InvalidLabel { label, limit: MOVE_LABELS });
        }

        Ok(Self { features, label, score })
    }

    pub fn label(&self) -> u16 {
        self.label
    }

    /// Auxiliary score in pawns.
    pub fn pawn_score(&self) -> f32 {
        f32::from(self.score) / 100.0
    }

    pub fn from_to(&self) -> (u8, u8) {
        ((self.label / 64) as u8, (self.label % 64) as u8)
    }
}

impl RecordFormat for MoveRecord {
    const RECORD_SIZE: usize = 128;
    const SLOTS: usize = 31;

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len::<Self>(bytes)?;

        let own = read_slots::<31>(bytes, 0);
        let opp = read_slots::<31>(bytes, 31);

        let label = read_u16(bytes, 124);
        let score = read_u16(bytes, 126) as i16;

        Self::new(FeatureSet::from_raw(own, opp)?, label, score)
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::RECORD_SIZE);
        write_slots(&mut buf, &self.features.raw_own());
        write_slots(&mut buf, &self.features.raw_opp());
        buf.extend_from_slice(&self.label.to_le_bytes());
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
        self.pawn_score()
    }
}
