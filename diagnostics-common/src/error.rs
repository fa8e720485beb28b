//! Error taxonomy shared by the diagnostics engine and its collaborators.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    /// The read cursor has reached the last available snapshot.
    /// This is the normal end of a read loop, not a failure.
    #[error("no snapshots remain after index {cursor}")]
    EndOfData { cursor: usize },

    #[error("snapshot {index} is corrupt: '{}' holds {found} bytes, expected {expected}", path.display())]
    CorruptSnapshot {
        index: usize,
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    /// A variable file is absent at `index` while later snapshot files exist.
    #[error("snapshot {index} is incomplete: '{}' is missing but later outputs exist", path.display())]
    MissingSnapshot { index: usize, path: PathBuf },

    #[error("failed to read snapshot {index} from '{}'", path.display())]
    SnapshotRead {
        index: usize,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("companion trajectory has {available} subsampled points, {required} required")]
    TrajectoryTooShort { available: usize, required: usize },

    #[error("no persisted files for diagnostic '{name}' in '{}'", directory.display())]
    MissingDiagnosticFiles { name: String, directory: PathBuf },

    #[error("batch size must be greater than 0")]
    InvalidBatchSize,

    #[error("malformed input file '{}': {reason}", path.display())]
    InputFormat { path: PathBuf, reason: String },

    #[error("cannot assemble series '{name}': {reason}")]
    SeriesShape { name: String, reason: String },

    #[error("I/O error on '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode or decode '{}': {reason}", path.display())]
    Encode { path: PathBuf, reason: String },
}

impl DiagnosticsError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DiagnosticsError::Io { path: path.into(), source }
    }

    pub fn input_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DiagnosticsError::InputFormat { path: path.into(), reason: reason.into() }
    }

    /// True for the expected end-of-sequence signal.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, DiagnosticsError::EndOfData { .. })
    }
}

pub type DiagnosticsResult<T> = Result<T, DiagnosticsError>;
