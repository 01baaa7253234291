use std::path::PathBuf;

use anyhow::Context;
use halfkp_trainer::{
    trainer::PlateauLR, CheckpointStore, LossMode, Network, NetworkVariant, OptimiserSnapshot, TrainingState,
};
use structopt::StructOpt;

use crate::variant::{with_variant, VariantKind};

#[derive(StructOpt)]
pub struct InitOptions {
    #[structopt(required = true, short, long)]
    variant: VariantKind,
    /// Checkpoint directory to write into.
    #[structopt(required = true, short, long)]
    output: PathBuf,
    /// Defaults to 0x12345678.
    #[structopt(short, long, default_value = "305419896")]
    seed: u64,
    #[structopt(long, default_value = "0.001")]
    learning_rate: f32,
    #[structopt(long, default_value = "0")]
    scheduler_patience: usize,
}

impl InitOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        with_variant!(self.variant, LossMode::Mse, init(self))
    }
}

fn init<V: NetworkVariant>(variant: V, options: &InitOptions) -> anyhow::Result<()> {
    let store = CheckpointStore::new(&options.output)
        .with_context(|| format!("Could not create [{}].", options.output.display()))?;

    let state = TrainingState {
        network: Network::new(variant, options.seed),
        optimiser: OptimiserSnapshot::default(),
        schedule: PlateauLR::new(options.learning_rate, options.scheduler_patience).state(),
        epoch: 0,
    };

    let name = format!("{}-init-seed-{:#x}", V::NAME, options.seed);
    let handle = store.save(&name, &state).with_context(|| "Failed to write checkpoint.")?;

    println!("Initialised {}", state.network);
    println!("Saved [{}]", handle.path().display());

    Ok(())
}
