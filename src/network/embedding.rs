use crate::{
    inputs::{PAD, WIDTH1},
    rng::ParamRng,
    Error, Result,
};

/// Number of embedding rows: every real feature plus the padding row.
pub const ROWS: usize = WIDTH1 + 1;

/// Feature embedding matrix, `ROWS x width`, row-major.
///
/// Row [`PAD`] is all zeros and is never trained, so padded slots contribute
/// nothing to the pooled sum.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingTable {
    width: usize,
    weights: Vec<f32>,
}

impl EmbeddingTable {
    pub fn zeroed(width: usize) -> Self {
        Self { width, weights: vec![0.0; ROWS * width] }
    }

    /// Uniform in `±sqrt(6 / WIDTH1)`, padding row zeroed.
    pub fn random(width: usize, rng: &mut ParamRng) -> Self {
        let bound = (6.0 / WIDTH1 as f32).sqrt();
        let mut res = Self { width, weights: rng.uniform(ROWS * width, bound) };
        res.zero_padding_row();
        res
    }

    pub fn from_weights(width: usize, weights: Vec<f32>) -> Result<Self> {
        if weights.len() != ROWS * width {
            return Err(Error::ShapeMismatch(format!(
                "embedding has {} values, expected {ROWS} x {width}",
                weights.len()
            )));
        }

        let mut res = Self { width, weights };
        res.zero_padding_row();
        Ok(res)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub(crate) fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    pub fn row(&self, index: u16) -> &[f32] {
        let start = usize::from(index) * self.width;
        &self.weights[start..start + self.width]
    }

    /// Sums the rows of `indices` into `out`, skipping padding.
    pub fn pool(&self, indices: &[u16], out: &mut [f32]) {
        assert_eq!(out.len(), self.width, "Pooled output has the wrong width!");

        for &idx in indices.iter().filter(|&&idx| idx != PAD) {
            for (o, &w) in out.iter_mut().zip(self.row(idx)) {
                *o += w;
            }
        }
    }

    /// Zeroes the padding row of a gradient shaped like this table.
    pub fn mask_padding(&self, grad: &mut [f32]) {
        let start = usize::from(PAD) * self.width;
        grad[start..start + self.width].fill(0.0);
    }

    fn zero_padding_row(&mut self) {
        let start = usize::from(PAD) * self.width;
        self.weights[start..start + self.width].fill(0.0);
    }
}
