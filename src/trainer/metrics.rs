use std::fmt;

use crate::{
    format::{EvalRecord, MoveRecord, ZeroRecord},
    network::{Eval, Move, MoveOutput, NetworkVariant, Zero, ZeroOutput},
    util::sigmoid,
};

use super::logger::{ansi, NUM_CS};

/// Loss and headline accuracy of one pass over a dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricSummary {
    pub loss: f32,
    pub accuracy: f32,
}

/// Running statistics accumulated from per-record forward passes.
pub trait Metric<V: NetworkVariant>: Default + fmt::Display + Send {
    fn update(&mut self, output: &V::Output, record: &V::Record, loss: f32);

    /// Folds in statistics gathered on another thread.
    fn merge(&mut self, other: Self);

    fn count(&self) -> usize;

    fn summary(&self) -> MetricSummary;
}

fn ratio(x: f64, count: usize) -> f32 {
    if count == 0 {
        0.0
    } else {
        (x / count as f64) as f32
    }
}

/// Error moments, mean absolute error and sign agreement of the scalar output
/// against the normalised score.
#[derive(Clone, Debug, Default)]
pub struct EvalMetric {
    count: usize,
    sum: f64,
    sum_sq: f64,
    l1: f64,
    correct: usize,
    loss: f64,
}

impl EvalMetric {
    pub fn mean(&self) -> f32 {
        ratio(self.sum, self.count)
    }

    pub fn std(&self) -> f32 {
        let mean = f64::from(self.mean());
        let var = f64::from(ratio(self.sum_sq, self.count)) - mean * mean;
        var.max(0.0).sqrt() as f32
    }

    pub fn l1(&self) -> f32 {
        ratio(self.l1, self.count)
    }
}

impl Metric<Eval> for EvalMetric {
    fn update(&mut self, &output: &f32, record: &EvalRecord, loss: f32) {
        let target = record.normalised_score();
        let diff = f64::from(output - target);

        self.count += 1;
        self.sum += diff;
        self.sum_sq += diff * diff;
        self.l1 += diff.abs();
        self.correct += usize::from((output >= 0.0) == (target >= 0.0));
        self.loss += f64::from(loss);
    }

    fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.l1 += other.l1;
        self.correct += other.correct;
        self.loss += other.loss;
    }

    fn count(&self) -> usize {
        self.count
    }

    fn summary(&self) -> MetricSummary {
        MetricSummary { loss: ratio(self.loss, self.count), accuracy: ratio(self.correct as f64, self.count) }
    }
}

impl fmt::Display for EvalMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = NUM_CS;
        let s = Metric::<Eval>::summary(self);
        write!(
            f,
            "loss {} | acc {} | l1 {} | mean {} | std {}",
            ansi(format!("{:.6}", s.loss), c),
            ansi(format!("{:.4}", s.accuracy), c),
            ansi(format!("{:.4}", self.l1()), c),
            ansi(format!("{:.4}", self.mean()), c),
            ansi(format!("{:.4}", self.std()), c),
        )
    }
}

/// Top-1 move accuracy and value error.
#[derive(Clone, Debug, Default)]
pub struct MoveMetric {
    count: usize,
    correct: usize,
    value_l1: f64,
    loss: f64,
}

impl Metric<Move> for MoveMetric {
    fn update(&mut self, output: &MoveOutput, record: &MoveRecord, loss: f32) {
        self.count += 1;
        self.correct += usize::from(output.best_move() == usize::from(record.label()));
        self.value_l1 += f64::from((output.value - record.pawn_score()).abs());
        self.loss += f64::from(loss);
    }

    fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.correct += other.correct;
        self.value_l1 += other.value_l1;
        self.loss += other.loss;
    }

    fn count(&self) -> usize {
        self.count
    }

    fn summary(&self) -> MetricSummary {
        MetricSummary { loss: ratio(self.loss, self.count), accuracy: ratio(self.correct as f64, self.count) }
    }
}

impl fmt::Display for MoveMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = NUM_CS;
        let s = Metric::<Move>::summary(self);
        write!(
            f,
            "loss {} | move acc {} | value l1 {}",
            ansi(format!("{:.6}", s.loss), c),
            ansi(format!("{:.4}", s.accuracy), c),
            ansi(format!("{:.4}", ratio(self.value_l1, self.count)), c),
        )
    }
}

/// Agreement with the most visited move, and outcome error.
#[derive(Clone, Debug, Default)]
pub struct ZeroMetric {
    count: usize,
    policy_correct: usize,
    value_l1: f64,
    loss: f64,
}

impl Metric<Zero> for ZeroMetric {
    fn update(&mut self, output: &ZeroOutput, record: &ZeroRecord, loss: f32) {
        self.count += 1;
        self.policy_correct += usize::from(record.best_policy_index().map(usize::from) == Some(output.best_move()));
        self.value_l1 += f64::from((sigmoid(output.value) - record.outcome_target()).abs());
        self.loss += f64::from(loss);
    }

    fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.policy_correct += other.policy_correct;
        self.value_l1 += other.value_l1;
        self.loss += other.loss;
    }

    fn count(&self) -> usize {
        self.count
    }

    fn summary(&self) -> MetricSummary {
        MetricSummary { loss: ratio(self.loss, self.count), accuracy: ratio(self.policy_correct as f64, self.count) }
    }
}

impl fmt::Display for ZeroMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = NUM_CS;
        let s = Metric::<Zero>::summary(self);
        write!(
            f,
            "loss {} | policy acc {} | value l1 {}",
            ansi(format!("{:.6}", s.loss), c),
            ansi(format!("{:.4}", s.accuracy), c),
            ansi(format!("{:.4}", ratio(self.value_l1, self.count)), c),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::FeatureSet;

    fn eval(score: i16) -> EvalRecord {
        EvalRecord { features: FeatureSet::default(), score }
    }

    #[test]
    fn eval_statistics() {
        let mut m = EvalMetric::default();
        // targets: 1.0 and -1.0
        m.update(&1.5, &eval(236), 0.25);
        m.update(&0.5, &eval(-180), 2.25);

        assert_eq!(m.count(), 2);
        assert_eq!(m.mean(), 1.0);
        assert_eq!(m.l1(), 1.0);
        assert_eq!(m.std(), 0.5);

        let s = m.summary();
        assert_eq!(s.loss, 1.25);
        assert_eq!(s.accuracy, 0.5);
    }

    #[test]
    fn merge_matches_sequential() {
        let records = [eval(0), eval(100), eval(-300), eval(50)];
        let outputs = [0.1, -0.2, -1.0, 0.3];

        let mut all = EvalMetric::default();
        let mut left = EvalMetric::default();
        let mut right = EvalMetric::default();

        for (i, (out, rec)) in outputs.iter().zip(&records).enumerate() {
            all.update(out, rec, 1.0);
            let half = if i < 2 { &mut left } else { &mut right };
            half.update(out, rec, 1.0);
        }

        left.merge(right);
        assert_eq!(left.summary(), all.summary());
        assert_eq!(left.count(), 4);
    }

    #[test]
    fn move_accuracy() {
        let mut logits = vec![0.0; 4096];
        logits[12 * 64 + 28] = 5.0;
        let output = MoveOutput { logits, value: 1.0 };

        let hit = MoveRecord::new(FeatureSet::default(), 12 * 64 + 28, 100).unwrap();
        let miss = MoveRecord::new(FeatureSet::default(), 0, 100).unwrap();

        let mut m = MoveMetric::default();
        m.update(&output, &hit, 1.0);
        m.update(&output, &miss, 3.0);
        assert_eq!(m.summary(), MetricSummary { loss: 2.0, accuracy: 0.5 });
    }

    #[test]
    fn empty_metric_is_zero() {
        assert_eq!(ZeroMetric::default().summary(), MetricSummary::default());
    }
}
