use std::time::Instant;

use super::{
    logger::{self, ansi, NUM_CS},
    metrics::Metric,
    schedule::PlateauLR,
    settings::TrainingConfig,
    Trainer,
};
use crate::{
    checkpoint::{self, checkpoint_name, CheckpointHandle, CheckpointStore, TrainingState},
    loader::{BatchDataset, BatchLoader},
    network::{Network, NetworkVariant},
    optimiser::OptimiserState,
    Error, Result,
};

/// Forward pass over every record of `dataset`, accumulating `V::Metric`.
///
/// Each batch is split across the loader's thread count.
pub fn evaluate<V: NetworkVariant>(
    network: &Network<V>,
    dataset: &BatchDataset<V::Record>,
    loader: &BatchLoader,
) -> Result<V::Metric> {
    let threads = loader.threads();
    let mut metric = V::Metric::default();

    loader.for_each_batch(dataset, |_, batch| {
        let chunk_size = batch.len().div_ceil(threads).max(1);

        std::thread::scope(|s| {
            let handles: Vec<_> = batch
                .chunks(chunk_size)
                .map(|chunk| {
                    s.spawn(move || {
                        let mut partial = V::Metric::default();
                        for record in chunk {
                            let output = network.forward(record);
                            let loss = network.variant().loss(&output, record);
                            partial.update(&output, record, loss);
                        }
                        partial
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(partial) => metric.merge(partial),
                    Err(e) => std::panic::resume_unwind(e),
                }
            }
        });

        Ok(())
    })?;

    Ok(metric)
}

/// Trains `variant` as described by `config`, checkpointing after every epoch.
///
/// Resumes from `config.checkpoint` if set, starting at the epoch after the
/// one it records. Returns the final network.
pub fn run<V: NetworkVariant, T: Trainer<V>>(trainer: &mut T, variant: V, config: &TrainingConfig) -> Result<Network<V>> {
    config.validate()?;

    let variant = match config.loss_mode {
        Some(mode) => variant.with_loss_mode(mode)?,
        None => variant,
    };
    trainer.configure(config);

    let mut scheduler = PlateauLR::new(config.learning_rate, config.scheduler_patience);

    let (mut network, start_epoch) = match &config.checkpoint {
        Some(path) => {
            let handle = CheckpointHandle::open(path)?;
            let state = checkpoint::load(&handle, variant)?;
            let next_epoch = state.next_epoch();

            trainer.optimiser_mut().restore(state.optimiser)?;
            scheduler.restore(state.schedule);
            log::info!("resuming from [{}] at epoch {next_epoch}", path.display());

            (state.network, next_epoch)
        }
        None => (Network::new(variant, config.seed), 0),
    };

    if let Some(path) = &config.checkpoint_embedding {
        let embedding = checkpoint::load_embedding(&CheckpointHandle::open(path)?)?;
        network.load_embedding(&embedding)?;
        log::info!("loaded embedding from [{}]", path.display());
    }

    let train = BatchDataset::<V::Record>::open(&config.dataset, config.batch_size)?;
    let test = config.test_dataset.as_ref().map(|path| BatchDataset::<V::Record>::open(path, config.batch_size)).transpose()?;
    let loader = BatchLoader::new(config.threads, config.batch_queue_size);
    let store = config.checkpoint_dir.as_ref().map(CheckpointStore::new).transpose()?;

    println!("{}", ansi("Beginning Training", "34;1"));
    println!("Net Type               : {}", ansi(V::NAME, "32;1"));
    println!("Arch                   : {}", ansi(&network, 31));
    println!("Parameters             : {}", ansi(network.parameter_count(), 31));
    println!("LR Scheduler           : {}", scheduler.colourful());
    config.display();
    println!("Positions              : {}", ansi(train.record_count(), 31));
    println!("Start Epoch            : {}", ansi(start_epoch, 31));

    let timer = Instant::now();
    let batches = train.len();

    for epoch in start_epoch..config.num_epochs {
        let lr = scheduler.lr();
        logger::report_epoch_start(epoch, lr);

        let epoch_timer = Instant::now();
        let mut loss_sum = 0.0f64;
        let mut positions = 0;

        loader.for_each_batch(&train, |index, batch| {
            let loss = trainer.train_on_batch(&mut network, &batch, lr)?;

            if !loss.is_finite() {
                return Err(Error::NonFiniteLoss { epoch, batch: index });
            }

            loss_sum += f64::from(loss) * batch.len() as f64;
            positions += batch.len();

            if index % 128 == 0 {
                let running = (loss_sum / positions as f64) as f32;
                logger::report_epoch_progress(epoch, batches, index + 1, &epoch_timer, positions, running);
            }

            Ok(())
        })?;

        let train_loss = if positions == 0 { 0.0 } else { (loss_sum / positions as f64) as f32 };

        let test_summary = match &test {
            Some(test) => {
                let metric = evaluate(&network, test, &loader)?;
                println!("validation | {metric}");

                let summary = metric.summary();
                if scheduler.step(summary.loss) {
                    println!("LR Dropped to {}", ansi(scheduler.lr(), NUM_CS));
                }

                Some(summary)
            }
            None => None,
        };

        let epoch_time = epoch_timer.elapsed().as_secs_f32();
        let total_time = timer.elapsed().as_secs_f32();
        logger::report_epoch_finished(epoch, train_loss, test_summary.as_ref(), epoch_time, total_time, positions);
        logger::report_time_left(start_epoch, config.num_epochs, epoch, total_time);

        if let Some(store) = &store {
            let state = TrainingState {
                network,
                optimiser: trainer.optimiser().snapshot(),
                schedule: scheduler.state(),
                epoch,
            };

            let test_loss = test_summary.map_or(0.0, |s| s.loss);
            let handle = store.save(&checkpoint_name::<V>(epoch, train_loss, test_loss), &state)?;
            println!("Saved [{}]", ansi(handle.path().display(), "32;1"));

            network = state.network;
        }
    }

    Ok(network)
}
