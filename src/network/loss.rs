use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::util::sigmoid;

/// Loss applied to the scalar evaluation output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossMode {
    /// Squared error against the normalised score.
    #[default]
    Mse,
    /// Binary cross-entropy of the output logit against `sigmoid(target)`.
    Bce,
}

impl fmt::Display for LossMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mse => write!(f, "mse"),
            Self::Bce => write!(f, "bce"),
        }
    }
}

impl FromStr for LossMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mse" => Ok(Self::Mse),
            "bce" => Ok(Self::Bce),
            _ => Err(format!("unknown loss mode `{s}` (expected `mse` or `bce`)")),
        }
    }
}

pub fn mse(output: f32, target: f32) -> f32 {
    (output - target).powi(2)
}

/// Binary cross-entropy of a logit against a probability target, in the
/// numerically stable form `max(x, 0) - x t + ln(1 + e^-|x|)`.
pub fn bce_with_logits(logit: f32, target: f32) -> f32 {
    logit.max(0.0) - logit * target + (-logit.abs()).exp().ln_1p()
}

pub fn log_sum_exp(logits: &[f32]) -> f32 {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return max;
    }

    max + logits.iter().map(|&x| (x - max).exp()).sum::<f32>().ln()
}

/// `-log softmax(logits)[label]`. `label` must index `logits`.
pub fn cross_entropy(logits: &[f32], label: usize) -> f32 {
    log_sum_exp(logits) - logits[label]
}

/// Cross-entropy against a sparse distribution given as (index, probability)
/// pairs. Every index with nonzero probability must index `logits`.
pub fn sparse_cross_entropy(logits: &[f32], indices: &[u16], probabilities: &[f32]) -> f32 {
    let lse = log_sum_exp(logits);

    indices
        .iter()
        .zip(probabilities)
        .filter(|&(_, &p)| p != 0.0)
        .map(|(&idx, &p)| p * (lse - logits[usize::from(idx)]))
        .sum()
}

impl LossMode {
    pub fn apply(self, output: f32, target: f32) -> f32 {
        match self {
            Self::Mse => mse(output, target),
            Self::Bce => bce_with_logits(output, sigmoid(target)),
        }
    }
}
