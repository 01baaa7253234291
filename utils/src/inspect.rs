use std::path::PathBuf;

use anyhow::Context;
use halfkp_trainer::{format::RecordFormat, inputs::PAD, BatchDataset, BatchLoader, LossMode, NetworkVariant};
use structopt::StructOpt;

use crate::variant::{with_variant, VariantKind};

#[derive(StructOpt)]
pub struct InspectOptions {
    #[structopt(required = true, short, long)]
    variant: VariantKind,
    #[structopt(required = true, short, long)]
    dataset: PathBuf,
    #[structopt(short, long, default_value = "1024")]
    batch_size: usize,
    #[structopt(short, long, default_value = "1")]
    threads: usize,
}

impl InspectOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        with_variant!(self.variant, LossMode::Mse, inspect(self))
    }
}

#[derive(Debug, Default)]
struct Summary {
    records: usize,
    own_features: usize,
    opp_features: usize,
    target_sum: f64,
    target_min: f32,
    target_max: f32,
}

impl Summary {
    fn update<R: RecordFormat>(&mut self, record: &R) {
        let active = |slots: &[u16]| slots.iter().filter(|&&x| x != PAD).count();
        let target = record.value_target();

        if self.records == 0 {
            self.target_min = target;
            self.target_max = target;
        }

        self.records += 1;
        self.own_features += active(record.own());
        self.opp_features += active(record.opp());
        self.target_sum += f64::from(target);
        self.target_min = self.target_min.min(target);
        self.target_max = self.target_max.max(target);
    }

    fn mean(&self, x: f64) -> f64 {
        if self.records == 0 {
            0.0
        } else {
            x / self.records as f64
        }
    }
}

fn inspect<V: NetworkVariant>(_: V, options: &InspectOptions) -> anyhow::Result<()> {
    let dataset = BatchDataset::<V::Record>::open(&options.dataset, options.batch_size)
        .with_context(|| format!("Could not open dataset [{}].", options.dataset.display()))?;

    let mut summary = Summary::default();
    BatchLoader::new(options.threads, 2 * options.threads)
        .for_each_batch(&dataset, |_, batch| {
            batch.iter().for_each(|record| summary.update(record));
            Ok(())
        })
        .with_context(|| "Failed to read dataset.")?;

    println!("Variant                : {}", V::NAME);
    println!("Record Size            : {} bytes", <V::Record as RecordFormat>::RECORD_SIZE);
    println!("Records                : {}", dataset.record_count());
    println!("Batches                : {} (batch size {})", dataset.len(), dataset.batch_size());
    println!("Mean Active Features   : {:.2} own, {:.2} opp", summary.mean(summary.own_features as f64), summary.mean(summary.opp_features as f64));
    println!("Target                 : mean {:.4}, min {:.4}, max {:.4}", summary.mean(summary.target_sum), summary.target_min, summary.target_max);

    Ok(())
}
