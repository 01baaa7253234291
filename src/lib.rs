//! Training core for HalfKP evaluation networks.
//!
//! Reads fixed-width binary position records, sum-pools their sparse HalfKP
//! features through an embedding, runs one of three head stacks
//! ([`Eval`], [`Move`], [`Zero`]) and exports the parameters to the flat
//! little-endian blob the engine loads. The gradient step itself is supplied
//! through the [`trainer::Trainer`] trait.

pub mod checkpoint;
mod error;
pub mod export;
pub mod format;
pub mod inputs;
pub mod loader;
pub mod network;
pub mod optimiser;
pub mod rng;
pub mod trainer;
pub mod util;

pub use checkpoint::{CheckpointHandle, CheckpointStore, TrainingState};
pub use error::{Error, Result};
pub use loader::{BatchDataset, BatchLoader};
pub use network::{Eval, LossMode, Move, Network, NetworkVariant, Zero};
pub use optimiser::{OptimiserSnapshot, OptimiserState};
pub use trainer::{Trainer, TrainingConfig};
