//! Checkpoint trait and codec for deterministic model persistence.
//!
//! [`Checkpointable`] fixes a versioned, little-endian bincode encoding that
//! every persisted component shares. Implementations store a version header
//! with the payload so that incompatible files are rejected on load.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;

/// Errors that can occur while saving or loading checkpoints.
#[derive(Debug)]
pub enum CheckpointError {
    /// Underlying I/O failure while reading or writing checkpoint files.
    Io(std::io::Error),
    /// Serialization or deserialization error from the binary codec.
    Serialization(bincode::Error),
    /// The file was well formed but carries an incompatible schema version.
    VersionMismatch { expected: u32, found: u32 },
    /// The file decoded but its contents do not describe a valid model.
    InvalidFormat(String),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::Io(err) => write!(f, "I/O error while accessing checkpoint: {err}"),
            CheckpointError::Serialization(err) => {
                write!(f, "Failed to (de)serialize checkpoint payload: {err}")
            }
            CheckpointError::VersionMismatch { expected, found } => write!(
                f,
                "Checkpoint version mismatch: expected {expected}, found {found}",
            ),
            CheckpointError::InvalidFormat(msg) => {
                write!(f, "Checkpoint file has invalid structure: {msg}")
            }
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(err) => Some(err),
            CheckpointError::Serialization(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CheckpointError {
    fn from(err: std::io::Error) -> Self {
        CheckpointError::Io(err)
    }
}

impl From<bincode::Error> for CheckpointError {
    fn from(err: bincode::Error) -> Self {
        CheckpointError::Serialization(err)
    }
}

/// Deterministic binary codec options shared by all checkpoint implementations.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_little_endian()
}

/// Sibling path used while a snapshot is being written.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Components that support deterministic persistence implement this trait.
pub trait Checkpointable: Sized {
    /// Save the current state to `path` using the deterministic codec.
    fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError>;

    /// Load a state from `path`, replacing any existing instance.
    fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError>;

    /// Writes a snapshot next to `path` and renames it into place, so readers
    /// see either the previous file or the complete new one.
    fn write_snapshot<P, T>(snapshot: &T, path: P) -> Result<(), CheckpointError>
    where
        P: AsRef<Path>,
        T: serde::Serialize,
    {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let staging = staging_path(path);
        let written = (|| -> Result<(), CheckpointError> {
            let file = File::create(&staging)?;
            let mut writer = BufWriter::new(file);
            codec().serialize_into(&mut writer, snapshot)?;
            writer.flush()?;
            writer
                .into_inner()
                .map_err(|err| CheckpointError::Io(err.into_error()))?
                .sync_all()?;
            Ok(())
        })();

        if let Err(err) = written {
            fs::remove_file(&staging).ok();
            return Err(err);
        }

        fs::rename(&staging, path)?;
        Ok(())
    }

    /// Utility for reading a serializable snapshot with the shared codec.
    fn read_snapshot<P, T>(path: P) -> Result<T, CheckpointError>
    where
        P: AsRef<Path>,
        T: serde::de::DeserializeOwned,
    {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Ok(codec().deserialize_from(&mut reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        version: u32,
        values: Vec<f32>,
    }

    impl Checkpointable for Counter {
        fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
            Self::write_snapshot(self, path)
        }

        fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
            Self::read_snapshot(path)
        }
    }

    #[test]
    fn snapshot_replaces_previous_file_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("counter.bin");

        let first = Counter {
            version: 1,
            values: vec![1.0, 2.0],
        };
        first.save_checkpoint(&path).expect("first save");

        let second = Counter {
            version: 1,
            values: vec![0.5; 8],
        };
        second.save_checkpoint(&path).expect("second save");

        let restored = Counter::load_checkpoint(&path).expect("load");
        assert_eq!(restored, second);
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn truncated_payload_is_a_serialization_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.bin");
        fs::write(&path, [1u8, 0, 0]).expect("write");

        let err = Counter::load_checkpoint(&path).expect_err("truncated");
        assert!(matches!(err, CheckpointError::Serialization(_)));
    }
}
