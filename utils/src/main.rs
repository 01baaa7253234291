mod embed;
mod export;
mod init;
mod inspect;
mod validate;
mod variant;

use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(about = "Tools for HalfKP network datasets, checkpoints and weight blobs")]
pub enum Options {
    /// Write a freshly initialised checkpoint.
    Init(init::InitOptions),
    /// Export a checkpoint to the engine's weight blob.
    Export(export::ExportOptions),
    /// Render a weight blob as an embeddable C++ source fragment.
    Embed(embed::EmbedOptions),
    /// Summarise a dataset file.
    Inspect(inspect::InspectOptions),
    /// Evaluate a checkpoint on a dataset.
    Validate(validate::ValidateOptions),
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Options::from_args() {
        Options::Init(options) => options.run(),
        Options::Export(options) => options.run(),
        Options::Embed(options) => options.run(),
        Options::Inspect(options) => options.run(),
        Options::Validate(options) => options.run(),
    }
}
