use std::path::PathBuf;

use anyhow::Context;
use halfkp_trainer::{checkpoint, export, CheckpointHandle, LossMode, NetworkVariant};
use structopt::StructOpt;

use crate::variant::{with_variant, VariantKind};

#[derive(StructOpt)]
pub struct ExportOptions {
    #[structopt(required = true, short, long)]
    variant: VariantKind,
    #[structopt(required = true, short, long)]
    checkpoint: PathBuf,
    #[structopt(required = true, short, long)]
    output: PathBuf,
}

impl ExportOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        with_variant!(self.variant, LossMode::Mse, export_blob(self))
    }
}

fn export_blob<V: NetworkVariant>(variant: V, options: &ExportOptions) -> anyhow::Result<()> {
    let handle = CheckpointHandle::open(&options.checkpoint)
        .with_context(|| format!("Could not open checkpoint [{}].", options.checkpoint.display()))?;
    let state = checkpoint::load(&handle, variant).with_context(|| "Failed to load checkpoint.")?;

    let size = export::write_weight_blob(&state.network, &options.output)
        .with_context(|| format!("Failed to export to [{}].", options.output.display()))?;

    println!("Exported epoch {} ({size} bytes) to [{}]", state.epoch, options.output.display());

    Ok(())
}
