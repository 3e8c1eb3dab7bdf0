//! Append-only joint record file.
//!
//! Headerless CSV, one row of radians per record request. The file is created
//! on the first write and appended afterwards.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use eyre::WrapErr;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct JointRecorder {
    path: PathBuf,
}

impl JointRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row.
    pub fn append(&self, positions: &[f64]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .wrap_err_with(|| format!("open joint record {}", self.path.display()))?;
        let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        w.serialize(positions)
            .wrap_err_with(|| format!("write joint record {}", self.path.display()))?;
        w.flush()
            .wrap_err_with(|| format!("flush joint record {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), joints = positions.len(), "joint positions recorded");
        Ok(())
    }

    /// Remove the file so the next append starts fresh. Missing file is fine.
    pub fn reset(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "joint record cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).wrap_err_with(|| format!("remove joint record {}", self.path.display())),
        }
    }
}
