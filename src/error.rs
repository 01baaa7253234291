use std::{io, path::PathBuf};

/// Every failure the training core can report. All of them are fatal to the
/// operation that raised them.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed record: expected {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },

    #[error("feature index {index} out of range (expected < {limit} or an empty slot)")]
    FeatureIndexOutOfRange { index: u16, limit: usize },

    #[error("target label {label} out of range (expected < {limit})")]
    InvalidLabel { label: u16, limit: usize },

    #[error("dataset I/O error on [{}]: {source}", path.display())]
    DatasetIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid record size: [{}] is {file_size} bytes, not a multiple of {record_size}", path.display())]
    InvalidRecordSize { path: PathBuf, file_size: u64, record_size: usize },

    #[error("batch {index} out of range ({len} batches)")]
    BatchOutOfRange { index: usize, len: usize },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("size verification failed for [{}]: expected {expected} bytes, wrote {actual}", path.display())]
    SizeVerification { path: PathBuf, expected: u64, actual: u64 },

    #[error("corrupt checkpoint: {0}")]
    CheckpointFormat(String),

    #[error("non-finite loss at epoch {epoch}, batch {batch}")]
    NonFiniteLoss { epoch: usize, batch: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
