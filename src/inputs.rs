use crate::{Error, Result};

/// Number of real HalfKP features: 10 piece kinds x 64 piece squares x 64 king squares.
pub const WIDTH1: usize = 10 * 64 * 64;

/// Reserved padding index. Never a real feature; maps to the frozen zero embedding row.
pub const PAD: u16 = WIDTH1 as u16;

/// What the data generators write into a slot that holds no feature.
pub const EMPTY_SLOT: u16 = 0xFFFF;

/// HalfKP feature indices: (piece kind, piece square, own king square).
///
/// Pieces are packed as in the other data formats: the low three bits are the
/// piece type (pawn = 0 .. queen = 4) and bit 3 is set for black pieces. Kings
/// are never features.
pub struct HalfKP;

impl HalfKP {
    /// Feature indices of one piece from the white and black perspectives.
    /// The black perspective is vertically flipped, so both read as "own side at the bottom".
    pub fn get_feature_indices((piece, square): (u8, u8), (white_king, black_king): (u8, u8)) -> (u16, u16) {
        let black = usize::from(piece & 8 > 0);
        let pc = usize::from(piece & 7);
        debug_assert!(pc < 5, "kings are not HalfKP features");

        let sq = usize::from(square);
        let wkind = pc + [0, 5][black];
        let bkind = pc + [5, 0][black];

        let wfeat = (wkind * 64 + sq) * 64 + usize::from(white_king);
        let bfeat = (bkind * 64 + (sq ^ 56)) * 64 + (usize::from(black_king) ^ 56);

        (wfeat as u16, bfeat as u16)
    }
}

/// Maps one raw slot to a feature index, turning empty slots into [`PAD`].
pub fn normalise_slot(raw: u16) -> Result<u16> {
    match raw {
        EMPTY_SLOT | PAD => Ok(PAD),
        x if usize::from(x) < WIDTH1 => Ok(x),
        index => Err(Error::FeatureIndexOutOfRange { index, limit: WIDTH1 }),
    }
}

/// The sparse input of one position: `N` feature slots for the side to move and
/// `N` for the opponent, each right-padded with [`PAD`].
///
/// Slot order carries no meaning since the network sum-pools each perspective.
/// Empty slots remember whether they were stored as [`EMPTY_SLOT`] or [`PAD`],
/// so a decoded record encodes back to the same bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureSet<const N: usize> {
    own: [u16; N],
    opp: [u16; N],
    /// One bit per slot, set where the stored value was [`EMPTY_SLOT`].
    empty: [u64; 2],
}

impl<const N: usize> FeatureSet<N> {
    pub const SLOTS: usize = N;

    const FITS_MASK: () = assert!(N <= 64);

    pub fn from_raw(own: [u16; N], opp: [u16; N]) -> Result<Self> {
        let () = Self::FITS_MASK;

        let mut res = Self { own, opp, empty: [0; 2] };
        res.empty[0] = normalise_slots(&mut res.own)?;
        res.empty[1] = normalise_slots(&mut res.opp)?;

        Ok(res)
    }

    pub fn own(&self) -> &[u16; N] {
        &self.own
    }

    pub fn opp(&self) -> &[u16; N] {
        &self.opp
    }

    /// Side-to-move slots as they are stored on disk.
    pub fn raw_own(&self) -> [u16; N] {
        spell_empty(self.own, self.empty[0])
    }

    /// Opponent slots as they are stored on disk.
    pub fn raw_opp(&self) -> [u16; N] {
        spell_empty(self.opp, self.empty[1])
    }

    /// Number of non-padding features from each perspective.
    pub fn active(&self) -> (usize, usize) {
        let count = |slots: &[u16; N]| slots.iter().filter(|&&x| x != PAD).count();
        (count(&self.own), count(&self.opp))
    }
}

impl<const N: usize> Default for FeatureSet<N> {
    fn default() -> Self {
        Self { own: [PAD; N], opp: [PAD; N], empty: [0; 2] }
    }
}

fn normalise_slots<const N: usize>(slots: &mut [u16; N]) -> Result<u64> {
    let mut empty = 0;
    for (i, slot) in slots.iter_mut().enumerate() {
        if *slot == EMPTY_SLOT {
            empty |= 1u64 << i;
        }
        *slot = normalise_slot(*slot)?;
    }
    Ok(empty)
}

fn spell_empty<const N: usize>(mut slots: [u16; N], empty: u64) -> [u16; N] {
    for (i, slot) in slots.iter_mut().enumerate() {
        if empty >> i & 1 == 1 {
            *slot = EMPTY_SLOT;
        }
    }
    slots
}
