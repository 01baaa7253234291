use std::path::PathBuf;

use anyhow::Context;
use halfkp_trainer::{
    checkpoint, trainer::evaluate, trainer::Metric, BatchDataset, BatchLoader, CheckpointHandle, LossMode,
    NetworkVariant,
};
use structopt::StructOpt;

use crate::variant::{with_variant, VariantKind};

#[derive(StructOpt)]
pub struct ValidateOptions {
    #[structopt(required = true, short, long)]
    variant: VariantKind,
    #[structopt(required = true, short, long)]
    checkpoint: PathBuf,
    #[structopt(required = true, short, long)]
    dataset: PathBuf,
    #[structopt(short, long, default_value = "1024")]
    batch_size: usize,
    #[structopt(short, long, default_value = "1")]
    threads: usize,
    /// Loss of the eval variant: 'mse' or 'bce'.
    #[structopt(short, long, default_value = "mse")]
    loss_mode: LossMode,
}

impl ValidateOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        with_variant!(self.variant, self.loss_mode, validate(self))
    }
}

fn validate<V: NetworkVariant>(variant: V, options: &ValidateOptions) -> anyhow::Result<()> {
    let handle = CheckpointHandle::open(&options.checkpoint)
        .with_context(|| format!("Could not open checkpoint [{}].", options.checkpoint.display()))?;
    let state = checkpoint::load(&handle, variant).with_context(|| "Failed to load checkpoint.")?;

    let dataset = BatchDataset::<V::Record>::open(&options.dataset, options.batch_size)
        .with_context(|| format!("Could not open dataset [{}].", options.dataset.display()))?;

    let loader = BatchLoader::new(options.threads, 2 * options.threads);
    let metric = evaluate(&state.network, &dataset, &loader).with_context(|| "Validation failed.")?;

    println!("Checkpoint epoch {} on {} records", state.epoch, metric.count());
    println!("{metric}");

    Ok(())
}
