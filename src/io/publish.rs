//! All-or-nothing publication of a run's output files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SimError;

/// Output files written to temporary siblings and renamed onto their
/// targets only once every file has been written.
///
/// Dropping without [`commit`](Self::commit) removes the staged files and
/// leaves every target untouched.
#[derive(Debug, Default)]
pub struct StagedOutputs {
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files waiting to be published.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Runs `write` against a temporary path next to `target`.
    ///
    /// # Errors
    ///
    /// Returns whatever `write` returns. A target without a file name is a
    /// [`SimError::Write`].
    pub fn stage<F>(&mut self, target: &Path, write: F) -> Result<(), SimError>
    where
        F: FnOnce(&Path) -> Result<(), SimError>,
    {
        let tmp = staging_path(target)?;
        // tracked before writing so a half-written file is cleaned up too
        self.staged.push((tmp.clone(), target.to_path_buf()));
        write(&tmp)
    }

    /// Renames every staged file onto its target, in staging order.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Write`] for the first rename that fails.
    pub fn commit(mut self) -> Result<Vec<PathBuf>, SimError> {
        let staged = std::mem::take(&mut self.staged);
        let mut published = Vec::with_capacity(staged.len());
        for (i, (tmp, target)) in staged.iter().enumerate() {
            if let Err(source) = fs::rename(tmp, target) {
                // unpublished files are removed on drop
                self.staged = staged[i..].to_vec();
                return Err(SimError::Write {
                    path: target.clone(),
                    source,
                });
            }
            published.push(target.clone());
        }
        tracing::debug!(files = published.len(), "published outputs");
        Ok(published)
    }
}

impl Drop for StagedOutputs {
    fn drop(&mut self) {
        for (tmp, _) in &self.staged {
            let _ = fs::remove_file(tmp);
        }
    }
}

fn staging_path(target: &Path) -> Result<PathBuf, SimError> {
    let name = target.file_name().ok_or_else(|| SimError::Write {
        path: target.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "output path has no file name"),
    })?;
    let mut staged = name.to_os_string();
    staged.push(".tmp");
    Ok(target.with_file_name(staged))
}
