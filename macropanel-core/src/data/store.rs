//! CSV snapshot storage with atomic writes.
//!
//! Every file is written to a `.tmp` sibling and renamed into place. A
//! `StagedWrite` batches all files of one pipeline stage: nothing is renamed
//! until every file has been written, and dropping an uncommitted batch
//! removes its temporaries so a failed stage leaves the previous outputs
//! untouched.

use super::provider::DataError;
use crate::domain::{Scope, SeriesFrame};
use crate::panel::frame::format_value;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Write one file atomically: write to .tmp, then rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DataError> {
    ensure_parent(path)?;
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::io(&tmp, e)
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        // Clean up temp file on rename failure
        let _ = fs::remove_file(&tmp);
        DataError::io(path, e)
    })
}

/// A batch of files that become visible together.
#[derive(Debug, Default)]
pub struct StagedWrite {
    staged: Vec<(PathBuf, PathBuf)>,
    committed: bool,
}

impl StagedWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `bytes` to the temporary sibling of `path`.
    pub fn stage(&mut self, path: impl Into<PathBuf>, bytes: &[u8]) -> Result<(), DataError> {
        let path = path.into();
        ensure_parent(&path)?;
        let tmp = tmp_path(&path);
        fs::write(&tmp, bytes).map_err(|e| DataError::io(&tmp, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "staged");
        self.staged.push((path, tmp));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Rename every staged file into place. Returns the final paths.
    pub fn commit(mut self) -> Result<Vec<PathBuf>, DataError> {
        let mut done = Vec::with_capacity(self.staged.len());
        let staged = std::mem::take(&mut self.staged);
        let mut iter = staged.into_iter();
        while let Some((path, tmp)) = iter.next() {
            if let Err(e) = fs::rename(&tmp, &path) {
                let _ = fs::remove_file(&tmp);
                // Put the rest back so Drop removes their temporaries.
                self.staged = iter.collect();
                return Err(DataError::io(&path, e));
            }
            done.push(path);
        }
        self.committed = true;
        Ok(done)
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (path, tmp) in &self.staged {
            if fs::remove_file(tmp).is_ok() {
                warn!(path = %path.display(), "discarded staged output");
            }
        }
    }
}

/// Render a series as CSV: `date[,state],<name>`.
pub fn series_to_csv(frame: &SeriesFrame) -> Result<Vec<u8>, DataError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let header: Vec<&str> = match frame.scope() {
        Scope::National => vec!["date", frame.name()],
        Scope::State => vec!["date", "state", frame.name()],
    };
    wtr.write_record(&header)
        .map_err(|e| DataError::Other(format!("CSV write: {e}")))?;

    for obs in frame.observations() {
        let date = obs.date.format("%Y-%m-%d").to_string();
        let value = format_value(obs.value);
        let result = match obs.state {
            Some(state) => wtr.write_record([date.as_str(), state.as_str(), value.as_str()]),
            None => wtr.write_record([date.as_str(), value.as_str()]),
        };
        result.map_err(|e| DataError::Other(format!("CSV write: {e}")))?;
    }

    wtr.into_inner()
        .map_err(|e| DataError::Other(format!("CSV flush: {e}")))
}

/// BLAKE3 hex digest of a byte buffer.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
