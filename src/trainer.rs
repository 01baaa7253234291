pub mod logger;
pub mod metrics;
mod run;
pub mod schedule;
mod settings;

pub use metrics::{Metric, MetricSummary};
pub use run::{evaluate, run};
pub use schedule::{PlateauLR, ScheduleState};
pub use settings::TrainingConfig;

use crate::{
    network::{Network, NetworkVariant},
    optimiser::OptimiserState,
    Result,
};

/// The gradient step, supplied by the user of this crate.
///
/// An implementation computes gradients for a batch however it likes and
/// applies them through [`Network::apply_gradients`] with its own optimiser
/// state, which is checkpointed through [`OptimiserState::snapshot`].
pub trait Trainer<V: NetworkVariant> {
    type Optimiser: OptimiserState;

    fn optimiser(&self) -> &Self::Optimiser;

    fn optimiser_mut(&mut self) -> &mut Self::Optimiser;

    /// Called once by [`run()`] before the first epoch, for the settings the run
    /// loop does not apply itself, such as `weight_decay`.
    fn configure(&mut self, _config: &TrainingConfig) {}

    /// Performs one update and returns the mean loss over `batch`.
    fn train_on_batch(&mut self, network: &mut Network<V>, batch: &[V::Record], learning_rate: f32) -> Result<f32>;
}
