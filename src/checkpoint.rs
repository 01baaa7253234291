use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    inputs::WIDTH1,
    network::{EmbeddingTable, Network, NetworkVariant, EMBEDDING_WEIGHT},
    optimiser::OptimiserSnapshot,
    trainer::ScheduleState,
    util::{read_labelled_tensors, write_labelled_tensor},
    Error, Result,
};

pub const FORMAT_VERSION: u32 = 1;

const MANIFEST: &str = "manifest.toml";
const WEIGHTS: &str = "weights.bin";
const OPTIMISER: &str = "optimiser.bin";

/// Full training state at the end of an epoch.
#[derive(Clone, Debug)]
pub struct TrainingState<V> {
    pub network: Network<V>,
    pub optimiser: OptimiserSnapshot,
    pub schedule: ScheduleState,
    /// Last completed epoch.
    pub epoch: usize,
}

impl<V> TrainingState<V> {
    /// First epoch to run when resuming.
    pub fn next_epoch(&self) -> usize {
        self.epoch + 1
    }
}

/// A published checkpoint directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointHandle {
    path: PathBuf,
    epoch: usize,
}

impl CheckpointHandle {
    /// Refers to an existing checkpoint, reading its epoch from the manifest.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let manifest = Manifest::read(&path)?;
        Ok(Self { path, epoch: manifest.epoch })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct LayerEntry {
    id: String,
    inputs: usize,
    outputs: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct TensorEntry {
    id: String,
    len: usize,
}

/// Self-describing header of a checkpoint directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    variant: String,
    width1: usize,
    width2: usize,
    epoch: usize,
    schedule: ScheduleState,
    optimiser_scalars: BTreeMap<String, f64>,
    layers: Vec<LayerEntry>,
    weights: Vec<TensorEntry>,
    optimiser: Vec<TensorEntry>,
}

impl Manifest {
    fn read(dir: &Path) -> Result<Self> {
        let text = fs::read_to_string(dir.join(MANIFEST))?;
        let manifest: Self = toml::from_str(&text)
            .map_err(|e| Error::CheckpointFormat(format!("[{}]: {e}", dir.join(MANIFEST).display())))?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::CheckpointFormat(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                manifest.format_version
            )));
        }

        Ok(manifest)
    }

    fn check_shapes<V: NetworkVariant>(&self) -> Result<()> {
        let layers: Vec<LayerEntry> = V::LAYERS
            .iter()
            .map(|l| LayerEntry { id: l.id.to_string(), inputs: l.inputs, outputs: l.outputs })
            .collect();

        if self.variant != V::NAME || self.width1 != WIDTH1 || self.width2 != V::WIDTH2 || self.layers != layers {
            return Err(Error::ShapeMismatch(format!(
                "checkpoint holds a `{}` network (width1 {}, width2 {}), expected `{}` (width1 {WIDTH1}, width2 {})",
                self.variant,
                self.width1,
                self.width2,
                V::NAME,
                V::WIDTH2,
            )));
        }

        Ok(())
    }
}

fn inventory(tensors: &[(String, Vec<f32>)]) -> Vec<TensorEntry> {
    tensors.iter().map(|(id, t)| TensorEntry { id: id.clone(), len: t.len() }).collect()
}

fn read_tensors(path: &Path, expected: &[TensorEntry]) -> Result<Vec<(String, Vec<f32>)>> {
    let tensors = read_labelled_tensors(&fs::read(path)?)?;

    if inventory(&tensors) != expected {
        return Err(Error::CheckpointFormat(format!("[{}] does not match the manifest inventory", path.display())));
    }

    Ok(tensors)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// `ckpt-<variant>-epoch-<n>-loss-<train>-<test>`.
pub fn checkpoint_name<V: NetworkVariant>(epoch: usize, train_loss: f32, test_loss: f32) -> String {
    format!("ckpt-{}-epoch-{epoch}-loss-{train_loss:.4}-{test_loss:.4}", V::NAME)
}

/// A directory of checkpoints.
///
/// Each checkpoint is written into a hidden `.staging-*` directory and only
/// renamed to its final name once every file is on disk, so a checkpoint
/// directory either exists complete or not at all.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save<V: NetworkVariant>(&self, name: &str, state: &TrainingState<V>) -> Result<CheckpointHandle> {
        let weights: Vec<(String, Vec<f32>)> =
            state.network.tensors().into_iter().map(|(id, t)| (id, t.to_vec())).collect();

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            variant: V::NAME.to_string(),
            width1: WIDTH1,
            width2: V::WIDTH2,
            epoch: state.epoch,
            schedule: state.schedule,
            optimiser_scalars: state.optimiser.scalars.clone(),
            layers: V::LAYERS
                .iter()
                .map(|l| LayerEntry { id: l.id.to_string(), inputs: l.inputs, outputs: l.outputs })
                .collect(),
            weights: inventory(&weights),
            optimiser: inventory(&state.optimiser.tensors),
        };

        let manifest = toml::to_string(&manifest).map_err(|e| Error::CheckpointFormat(e.to_string()))?;

        let staging = tempfile::Builder::new().prefix(".staging-").tempdir_in(&self.dir)?;

        let mut buf = Vec::new();
        for (id, values) in &weights {
            write_labelled_tensor(&mut buf, id, values);
        }
        write_file(&staging.path().join(WEIGHTS), &buf)?;

        buf.clear();
        for (id, values) in &state.optimiser.tensors {
            write_labelled_tensor(&mut buf, id, values);
        }
        write_file(&staging.path().join(OPTIMISER), &buf)?;

        // written last, a directory without a manifest is never a checkpoint
        write_file(&staging.path().join(MANIFEST), manifest.as_bytes())?;

        // an existing checkpoint is moved aside, not deleted, until the new one is in place
        let target = self.dir.join(name);
        let retired = if target.exists() {
            log::warn!("replacing existing checkpoint [{}]", target.display());
            let old = tempfile::Builder::new().prefix(".old-").tempdir_in(&self.dir)?;
            fs::rename(&target, old.path().join(name))?;
            Some(old)
        } else {
            None
        };

        if let Err(e) = fs::rename(staging.path(), &target) {
            if let Some(old) = &retired {
                let _ = fs::rename(old.path().join(name), &target);
            }
            return Err(e.into());
        }

        drop(retired);
        log::info!("saved checkpoint [{}]", target.display());

        Ok(CheckpointHandle { path: target, epoch: state.epoch })
    }

    /// The published checkpoint with the highest epoch, if any.
    pub fn latest(&self) -> Result<Option<CheckpointHandle>> {
        let mut best: Option<CheckpointHandle> = None;

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();

            let hidden = path.file_name().and_then(|n| n.to_str()).is_none_or(|n| n.starts_with('.'));
            if hidden || !path.join(MANIFEST).is_file() {
                continue;
            }

            let handle = CheckpointHandle::open(&path)?;
            if best.as_ref().is_none_or(|b| handle.epoch > b.epoch) {
                best = Some(handle);
            }
        }

        Ok(best)
    }
}

/// Loads a checkpoint, failing with [`Error::ShapeMismatch`] if it was written
/// by a different variant or with different shapes.
pub fn load<V: NetworkVariant>(handle: &CheckpointHandle, variant: V) -> Result<TrainingState<V>> {
    let dir = handle.path();
    let manifest = Manifest::read(dir)?;
    manifest.check_shapes::<V>()?;

    let network = Network::from_tensors(variant, read_tensors(&dir.join(WEIGHTS), &manifest.weights)?)?;
    let tensors = read_tensors(&dir.join(OPTIMISER), &manifest.optimiser)?;

    Ok(TrainingState {
        network,
        optimiser: OptimiserSnapshot { tensors, scalars: manifest.optimiser_scalars },
        schedule: manifest.schedule,
        epoch: manifest.epoch,
    })
}

/// Reads only the embedding of a checkpoint of any variant.
pub fn load_embedding(handle: &CheckpointHandle) -> Result<EmbeddingTable> {
    let dir = handle.path();
    let manifest = Manifest::read(dir)?;

    let weights = read_tensors(&dir.join(WEIGHTS), &manifest.weights)?
        .into_iter()
        .find(|(id, _)| id == EMBEDDING_WEIGHT)
        .ok_or_else(|| Error::CheckpointFormat(format!("[{}] has no `{EMBEDDING_WEIGHT}`", dir.display())))?
        .1;

    EmbeddingTable::from_weights(manifest.width2, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Eval, Move, Zero};

    fn state<V: NetworkVariant>(variant: V, epoch: usize) -> TrainingState<V> {
        let network = Network::new(variant, 11);
        let momentum = network.tensors().into_iter().map(|(id, t)| (format!("{id}.momentum"), vec![0.125; t.len().min(7)]));

        TrainingState {
            optimiser: OptimiserSnapshot {
                tensors: momentum.collect(),
                scalars: BTreeMap::from([("step".to_string(), 1234.0), ("beta1".to_string(), 0.9)]),
            },
            network,
            schedule: ScheduleState { lr: 0.000_25, best: 0.031_25, num_bad_epochs: 2 },
            epoch,
        }
    }

    #[test]
    fn round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();

        let saved = state(Eval::default(), 4);
        let handle = store.save(&checkpoint_name::<Eval>(4, 0.5, 0.25), &saved).unwrap();
        assert_eq!(handle.epoch(), 4);
        assert_eq!(handle.path().file_name().unwrap(), "ckpt-eval-epoch-4-loss-0.5000-0.2500");

        let loaded = load(&handle, Eval::default()).unwrap();
        assert_eq!(loaded.network, saved.network);
        assert_eq!(loaded.optimiser, saved.optimiser);
        assert_eq!(loaded.schedule, saved.schedule);
        assert_eq!(loaded.next_epoch(), 5);
    }

    #[test]
    fn wrong_variant_is_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let handle = store.save("move", &state(Move, 0)).unwrap();

        assert!(matches!(load(&handle, Eval::default()), Err(Error::ShapeMismatch(_))));
        assert!(matches!(load(&handle, Zero), Err(Error::ShapeMismatch(_))));
        assert!(load(&handle, Move).is_ok());
    }

    #[test]
    fn latest_ignores_staging_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        assert_eq!(store.latest().unwrap(), None);

        store.save("a", &state(Eval::default(), 2)).unwrap();
        store.save("b", &state(Eval::default(), 7)).unwrap();
        store.save("c", &state(Eval::default(), 5)).unwrap();

        // an interrupted save
        let staging = dir.path().join(".staging-xyz");
        fs::create_dir(&staging).unwrap();
        fs::copy(dir.path().join("b").join(MANIFEST), staging.join(MANIFEST)).unwrap();

        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.epoch(), 7);
        assert_eq!(latest.path(), dir.path().join("b"));

        let published = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| !e.as_ref().unwrap().file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(published, 3);
    }

    #[test]
    fn corrupt_weights_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let handle = store.save("z", &state(Zero, 1)).unwrap();

        let weights = handle.path().join(WEIGHTS);
        let bytes = fs::read(&weights).unwrap();
        fs::write(&weights, &bytes[..bytes.len() - 4]).unwrap();

        assert!(matches!(load(&handle, Zero), Err(Error::CheckpointFormat(_))));
    }

    #[test]
    fn embedding_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let saved = state(Move, 0);
        let handle = store.save("m", &saved).unwrap();

        let embedding = load_embedding(&handle).unwrap();
        assert_eq!(&embedding, saved.network.embedding());
    }

    #[test]
    fn resave_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        store.save("same", &state(Eval::default(), 1)).unwrap();
        let handle = store.save("same", &state(Eval::default(), 2)).unwrap();
        assert_eq!(CheckpointHandle::open(handle.path()).unwrap().epoch(), 2);

        // nothing of the replaced checkpoint is left behind
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("same")]);
    }

    #[test]
    fn interrupted_replacement_keeps_a_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        store.save("same", &state(Eval::default(), 1)).unwrap();

        // a crash after the old checkpoint was moved aside, before the new one was published
        let old = dir.path().join(".old-crashed");
        fs::create_dir(&old).unwrap();
        fs::rename(dir.path().join("same"), old.join("same")).unwrap();
        assert_eq!(store.latest().unwrap(), None);
        assert!(CheckpointHandle::open(old.join("same")).is_ok());

        let handle = store.save("same", &state(Eval::default(), 2)).unwrap();
        assert_eq!(store.latest().unwrap(), Some(handle));
    }
}
