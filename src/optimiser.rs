use std::collections::BTreeMap;

use crate::Result;

/// Per-tensor optimiser state, owned by a [`crate::trainer::Trainer`].
///
/// The update rule is supplied by the implementor; the network only hands
/// over each trainable tensor with its (already masked) gradient.
pub trait OptimiserState {
    fn update_single_weight(
        &mut self,
        weights: &mut [f32],
        grads: &[f32],
        id: &str,
        gradient_factor: f32,
        learning_rate: f32,
    );

    /// Everything needed to resume bit-for-bit.
    fn snapshot(&self) -> OptimiserSnapshot;

    fn restore(&mut self, snapshot: OptimiserSnapshot) -> Result<()>;
}

/// Serialisable optimiser state: named tensors (e.g. moment estimates, keyed
/// like `l2.weight.momentum`) and named scalars (e.g. step counters).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimiserSnapshot {
    pub tensors: Vec<(String, Vec<f32>)>,
    pub scalars: BTreeMap<String, f64>,
}

impl OptimiserSnapshot {
    pub fn tensor(&self, id: &str) -> Option<&[f32]> {
        self.tensors.iter().find(|(name, _)| name == id).map(|(_, t)| t.as_slice())
    }

    pub fn scalar(&self, id: &str) -> Option<f64> {
        self.scalars.get(id).copied()
    }
}
