use std::{
    fs,
    io::{stdout, Write},
    path::PathBuf,
};

use anyhow::Context;
use halfkp_trainer::export::embedded_source;
use structopt::StructOpt;

#[derive(StructOpt)]
pub struct EmbedOptions {
    #[structopt(required = true, short, long)]
    input: PathBuf,
    /// Writes to stdout if omitted.
    #[structopt(short, long)]
    output: Option<PathBuf>,
    #[structopt(short, long, default_value = "kEmbeddedWeight")]
    symbol: String,
}

impl EmbedOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        let bytes = fs::read(&self.input).with_context(|| format!("Could not read [{}].", self.input.display()))?;
        let source = embedded_source(&bytes, &self.symbol);

        match &self.output {
            Some(path) => fs::write(path, source).with_context(|| format!("Could not write [{}].", path.display()))?,
            None => stdout().lock().write_all(source.as_bytes())?,
        }

        log::info!("embedded {} bytes as `{}`", bytes.len(), self.symbol);

        Ok(())
    }
}
