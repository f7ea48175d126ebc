//! Atomic snapshot publishing
//!
//! The snapshot is written to a process-unique temporary file beside the
//! destination, flushed to disk and renamed over the destination. A reader
//! therefore sees either the previous complete file or the new one.

use nfb_core::{FeedbackSnapshot, NfbError, NfbResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

pub struct StatePublisher {
    destination: PathBuf,
    temp_path: PathBuf,
    published: AtomicU64,
}

impl StatePublisher {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        let destination = destination.into();
        let mut temp_name = destination.clone().into_os_string();
        temp_name.push(format!(".{}.tmp", std::process::id()));

        StatePublisher {
            destination,
            temp_path: PathBuf::from(temp_name),
            published: AtomicU64::new(0),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Snapshots successfully written so far
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Replace the published snapshot. Failures are logged and reported as
    /// `false`; they never propagate into the processing loop.
    pub fn publish(&self, snapshot: &FeedbackSnapshot) -> bool {
        match self.write_atomic(snapshot) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                trace!(path = %self.destination.display(), "snapshot published");
                true
            }
            Err(e) => {
                let _ = fs::remove_file(&self.temp_path);
                warn!(error = %e, "failed to publish feedback snapshot");
                false
            }
        }
    }

    fn write_atomic(&self, snapshot: &FeedbackSnapshot) -> NfbResult<()> {
        let bytes = snapshot.to_json()?;

        let mut file = File::create(&self.temp_path).map_err(|e| self.io_error(&self.temp_path, e))?;
        file.write_all(&bytes)
            .map_err(|e| self.io_error(&self.temp_path, e))?;
        file.sync_all()
            .map_err(|e| self.io_error(&self.temp_path, e))?;
        drop(file);

        fs::rename(&self.temp_path, &self.destination)
            .map_err(|e| self.io_error(&self.destination, e))
    }

    fn io_error(&self, path: &Path, error: std::io::Error) -> NfbError {
        NfbError::Io {
            path: path.display().to_string(),
            reason: error.to_string(),
        }
    }
}
