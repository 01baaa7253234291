use std::fmt::Debug;

use super::{
    layers::{forward_stack, LayerSpec},
    loss::{bce_with_logits, cross_entropy, mse, sparse_cross_entropy, LossMode},
    Network,
};
use crate::{
    format::{EvalRecord, MoveRecord, RecordFormat, ZeroRecord, MOVE_LABELS, WIDTH_POLICY},
    trainer::metrics::{EvalMetric, Metric, MoveMetric, ZeroMetric},
    Error, Result,
};

/// One model family: its record type, shapes, heads and loss.
///
/// Every variant shares the same input stage: each perspective's features are
/// sum-pooled through the embedding, the two results concatenated and passed
/// through a ReLU. `heads` maps that `2 * WIDTH2` hidden vector to the output.
pub trait NetworkVariant: Clone + Debug + Send + Sync + 'static {
    /// Used in checkpoint manifests and names.
    const NAME: &'static str;

    /// Embedding width.
    const WIDTH2: usize;

    /// Dense layers in parameter order.
    const LAYERS: &'static [LayerSpec];

    /// Layers written to the weight blob, in blob order.
    const EXPORT_LAYERS: &'static [&'static str];

    type Record: RecordFormat;

    type Output: Clone + Debug + Send;

    type Metric: Metric<Self>;

    fn heads(network: &Network<Self>, hidden: &[f32]) -> Self::Output;

    fn loss(&self, output: &Self::Output, record: &Self::Record) -> f32;

    /// The same variant with its scalar loss switched to `mode`. Fails for
    /// variants whose loss is fixed.
    fn with_loss_mode(self, mode: LossMode) -> Result<Self> {
        Err(Error::Config(format!("`loss_mode = \"{mode}\"` does not apply to the {} variant", Self::NAME)))
    }
}

/// Scalar evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Eval {
    pub loss: LossMode,
}

/// Move prediction with an auxiliary evaluation head.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Move;

/// Policy distribution and game outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Zero;

#[derive(Clone, Debug, PartialEq)]
pub struct MoveOutput {
    pub logits: Vec<f32>,
    pub value: f32,
}

impl MoveOutput {
    pub fn best_move(&self) -> usize {
        argmax(&self.logits)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ZeroOutput {
    pub policy: Vec<f32>,
    pub value: f32,
}

impl ZeroOutput {
    pub fn best_move(&self) -> usize {
        argmax(&self.policy)
    }
}

fn argmax(xs: &[f32]) -> usize {
    xs.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).map_or(0, |(i, _)| i)
}

impl NetworkVariant for Eval {
    const NAME: &'static str = "eval";
    const WIDTH2: usize = 128;
    const LAYERS: &'static [LayerSpec] = &[
        LayerSpec::new("l2", 2 * Self::WIDTH2, 32),
        LayerSpec::new("l3", 32, 32),
        LayerSpec::new("l4", 32, 1),
    ];
    const EXPORT_LAYERS: &'static [&'static str] = &["l2", "l3", "l4"];

    type Record = EvalRecord;
    type Output = f32;
    type Metric = EvalMetric;

    fn heads(network: &Network<Self>, hidden: &[f32]) -> f32 {
        forward_stack(network.layers(), hidden)[0]
    }

    fn loss(&self, &output: &f32, record: &EvalRecord) -> f32 {
        self.loss.apply(output, record.normalised_score())
    }

    fn with_loss_mode(self, mode: LossMode) -> Result<Self> {
        Ok(Self { loss: mode })
    }
}

impl NetworkVariant for Move {
    const NAME: &'static str = "move";
    const WIDTH2: usize = 128;
    const LAYERS: &'static [LayerSpec] = &[
        LayerSpec::new("m_l1", 2 * Self::WIDTH2, MOVE_LABELS),
        LayerSpec::new("e_l1", 2 * Self::WIDTH2, 32),
        LayerSpec::new("e_l2", 32, 32),
        LayerSpec::new("e_l3", 32, 1),
    ];
    const EXPORT_LAYERS: &'static [&'static str] = &["m_l1"];

    type Record = MoveRecord;
    type Output = MoveOutput;
    type Metric = MoveMetric;

    fn heads(network: &Network<Self>, hidden: &[f32]) -> MoveOutput {
        let layers = network.layers();

        MoveOutput { logits: layers[0].forward(hidden), value: forward_stack(&layers[1..], hidden)[0] }
    }

    fn loss(&self, output: &MoveOutput, record: &MoveRecord) -> f32 {
        cross_entropy(&output.logits, usize::from(record.label())) + mse(output.value, record.pawn_score())
    }
}

impl NetworkVariant for Zero {
    const NAME: &'static str = "zero";
    const WIDTH2: usize = 256;
    const LAYERS: &'static [LayerSpec] = &[
        LayerSpec::new("fc_policy", 2 * Self::WIDTH2, WIDTH_POLICY),
        LayerSpec::new("fc_value", 2 * Self::WIDTH2, 1),
    ];
    const EXPORT_LAYERS: &'static [&'static str] = &["fc_policy", "fc_value"];

    type Record = ZeroRecord;
    type Output = ZeroOutput;
    type Metric = ZeroMetric;

    fn heads(network: &Network<Self>, hidden: &[f32]) -> ZeroOutput {
        let layers = network.layers();

        ZeroOutput { policy: layers[0].forward(hidden), value: layers[1].forward(hidden)[0] }
    }

    fn loss(&self, output: &ZeroOutput, record: &ZeroRecord) -> f32 {
        let policy = sparse_cross_entropy(&output.policy, record.policy_indices(), &record.policy_values);
        policy + bce_with_logits(output.value, record.outcome_target())
    }
}
