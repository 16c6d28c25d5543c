use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::error::{LearnerError, Result};
use crate::training::EpochProgress;

const DEFAULT_FILTER: &str = "glyphnet_core=info";

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `glyphnet_core=info`. Later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    // a subscriber installed by the host application wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

fn append_json_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
    writer.write_all(b"\n")
}

#[derive(Debug, Serialize)]
pub struct EpochLogEntry {
    pub run: u64,
    pub epoch: usize,
    pub loss: f32,
    pub timestamp_ms: u128,
}

/// Appends one JSON object per epoch to a run log.
#[derive(Debug)]
pub struct EpochLogWriter {
    path: PathBuf,
    run: u64,
    writer: BufWriter<File>,
}

impl EpochLogWriter {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| LearnerError::io(parent, err))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| LearnerError::io(&path, err))?;
        Ok(Self {
            path,
            run: timestamp_ms() as u64,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, progress: &EpochProgress) -> Result<()> {
        let entry = EpochLogEntry {
            run: self.run,
            epoch: progress.epoch,
            loss: progress.loss,
            timestamp_ms: timestamp_ms(),
        };
        append_json_line(&mut self.writer, &entry)
            .and_then(|()| self.writer.flush())
            .map_err(|err| LearnerError::io(&self.path, err))
    }
}
