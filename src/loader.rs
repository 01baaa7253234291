use std::{
    fs::File,
    io,
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::mpsc::{sync_channel, Receiver},
};

use crate::{format::RecordFormat, util, Error, Result};

/// Random-access reader over a file of fixed-size records.
///
/// Batch `i` covers records `[i * batch_size, (i + 1) * batch_size)`, the
/// last batch being partial when the record count is not a multiple of the
/// batch size. Reads are positional, so one dataset can be shared by many
/// threads.
pub struct BatchDataset<R> {
    path: PathBuf,
    file: File,
    record_count: usize,
    batch_size: usize,
    phantom: PhantomData<R>,
}

impl<R: RecordFormat> BatchDataset<R> {
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if batch_size == 0 {
            return Err(Error::Config("batch size must be positive".to_string()));
        }

        let io_err = |source| Error::DatasetIo { path: path.clone(), source };
        let file = File::open(&path).map_err(io_err)?;
        let file_size = file.metadata().map_err(io_err)?.len();

        if file_size % R::RECORD_SIZE as u64 != 0 {
            return Err(Error::InvalidRecordSize { path, file_size, record_size: R::RECORD_SIZE });
        }

        let record_count = usize::try_from(file_size / R::RECORD_SIZE as u64)
            .map_err(|_| Error::Config(format!("[{}] has too many records", path.display())))?;

        log::debug!("opened [{}]: {record_count} records of {} bytes", path.display(), R::RECORD_SIZE);

        Ok(Self { path, file, record_count, batch_size, phantom: PhantomData })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches, counting a final partial one.
    pub fn len(&self) -> usize {
        self.record_count.div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Undecoded bytes of batch `index`.
    pub fn read_raw(&self, index: usize) -> Result<Vec<u8>> {
        if index >= self.len() {
            return Err(Error::BatchOutOfRange { index, len: self.len() });
        }

        let first = index * self.batch_size;
        let records = self.batch_size.min(self.record_count - first);
        let offset = (first * R::RECORD_SIZE) as u64;

        let mut buf = vec![0; records * R::RECORD_SIZE];
        util::read_exact_at(&self.file, &mut buf, offset)
            .map_err(|source| Error::DatasetIo { path: self.path.clone(), source })?;

        Ok(buf)
    }

    pub fn read_batch(&self, index: usize) -> Result<Vec<R>> {
        crate::format::decode_all(&self.read_raw(index)?)
    }
}

/// Prefetches and decodes batches on worker threads.
///
/// Worker `w` of `threads` reads batches `w, w + threads, ...` into its own
/// bounded queue; the consumer drains the queues round-robin, so batches are
/// delivered exactly once and in index order.
#[derive(Clone, Copy, Debug)]
pub struct BatchLoader {
    threads: usize,
    queue_size: usize,
}

impl BatchLoader {
    pub fn new(threads: usize, queue_size: usize) -> Self {
        Self { threads: threads.max(1), queue_size: queue_size.max(1) }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Calls `f(index, batch)` for every batch of `dataset` in order.
    ///
    /// The first read, decode or callback error stops the pass and is returned.
    pub fn for_each_batch<R, F>(&self, dataset: &BatchDataset<R>, mut f: F) -> Result<()>
    where
        R: RecordFormat,
        F: FnMut(usize, Vec<R>) -> Result<()>,
    {
        let batches = dataset.len();
        let threads = self.threads.min(batches.max(1));
        let per_worker = self.queue_size.div_ceil(threads).max(1);

        std::thread::scope(|s| {
            let receivers: Vec<Receiver<Result<Vec<R>>>> = (0..threads)
                .map(|worker| {
                    let (sender, receiver) = sync_channel(per_worker);

                    s.spawn(move || {
                        for index in (worker..batches).step_by(threads) {
                            let batch = dataset.read_batch(index);
                            let failed = batch.is_err();

                            if sender.send(batch).is_err() || failed {
                                break;
                            }
                        }
                    });

                    receiver
                })
                .collect();

            for index in 0..batches {
                let batch = receivers[index % threads].recv().map_err(|_| Error::DatasetIo {
                    path: dataset.path().to_path_buf(),
                    source: io::Error::other(format!("loader worker exited before batch {index}")),
                })??;

                f(index, batch)?;
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::EvalRecord,
        inputs::{FeatureSet, PAD},
    };

    fn record(i: usize) -> EvalRecord {
        let mut own = [PAD; 32];
        own[0] = i as u16;
        EvalRecord { features: FeatureSet::from_raw(own, [PAD; 32]).unwrap(), score: i as i16 }
    }

    fn write_dataset(count: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let bytes: Vec<u8> = (0..count).flat_map(|i| record(i).encode()).collect();
        std::io::Write::write_all(&mut file, &bytes).unwrap();
        file
    }

    #[test]
    fn batches_and_partial_tail() {
        let file = write_dataset(10);
        let dataset = BatchDataset::<EvalRecord>::open(file.path(), 4).unwrap();

        assert_eq!(dataset.record_count(), 10);
        assert_eq!(dataset.len(), 3);

        let first = dataset.read_batch(0).unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first[3], record(3));

        let last = dataset.read_batch(2).unwrap();
        assert_eq!(last, vec![record(8), record(9)]);

        assert!(matches!(dataset.read_batch(3), Err(Error::BatchOutOfRange { index: 3, len: 3 })));
    }

    #[test]
    fn exact_multiple_has_no_partial_batch() {
        let file = write_dataset(8);
        let dataset = BatchDataset::<EvalRecord>::open(file.path(), 4).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.read_batch(1).unwrap().len(), 4);
    }

    #[test]
    fn invalid_record_size() {
        let file = write_dataset(3);
        file.as_file().set_len(3 * 128 - 5).unwrap();

        match BatchDataset::<EvalRecord>::open(file.path(), 2) {
            Err(Error::InvalidRecordSize { file_size, record_size, .. }) => {
                assert_eq!(file_size, 379);
                assert_eq!(record_size, 128);
            }
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn missing_file_is_dataset_io() {
        let dir = tempfile::tempdir().unwrap();
        let res = BatchDataset::<EvalRecord>::open(dir.path().join("none.bin"), 2);
        assert!(matches!(res, Err(Error::DatasetIo { .. })));
    }

    #[test]
    fn loader_delivers_in_order() {
        let file = write_dataset(23);
        let dataset = BatchDataset::<EvalRecord>::open(file.path(), 3).unwrap();

        for threads in [1, 2, 3, 16] {
            let mut seen = Vec::new();
            BatchLoader::new(threads, 4)
                .for_each_batch(&dataset, |index, batch| {
                    assert_eq!(index, seen.len());
                    seen.extend(batch.iter().map(|r| r.score as usize));
                    Ok(())
                })
                .unwrap();

            assert_eq!(seen, (0..23).collect::<Vec<_>>(), "threads = {threads}");
        }
    }

    #[test]
    fn loader_stops_on_bad_record() {
        let file = write_dataset(6);
        // out-of-range feature in record 4
        let mut bytes = std::fs::read(file.path()).unwrap();
        bytes[4 * 128..4 * 128 + 2].copy_from_slice(&50000u16.to_le_bytes());
        std::fs::write(file.path(), bytes).unwrap();

        let dataset = BatchDataset::<EvalRecord>::open(file.path(), 2).unwrap();
        let mut delivered = 0;
        let res = BatchLoader::new(2, 2).for_each_batch(&dataset, |_, _| {
            delivered += 1;
            Ok(())
        });

        assert!(matches!(res, Err(Error::FeatureIndexOutOfRange { index: 50000, .. })));
        assert_eq!(delivered, 2);
    }
}
