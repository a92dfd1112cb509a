//! Scratch storage for in-flight job artifacts.
//!
//! Every job gets its own uniquely named subdirectory under the scratch root,
//! so two concurrent jobs for media with the same title never write to the
//! same path.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Process-wide scratch root.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scratch root from `SCRATCH_DIR`.
    pub fn from_config() -> Self {
        Self::new(crate::core::config::SCRATCH_DIR.as_str())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root if it does not exist yet.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Allocates a fresh, empty per-job directory.
    pub fn create_job_dir(&self) -> io::Result<JobDir> {
        let id = Uuid::new_v4().simple().to_string();
        let path = self.root.join(format!("job-{}", id));
        std::fs::create_dir_all(&path)?;
        log::debug!("Created job directory {}", path.display());
        Ok(JobDir { id, path, armed: true })
    }
}

/// Per-job scratch directory. Owned by exactly one job.
///
/// Dropping it removes the directory, so a job that unwinds or is abandoned
/// still leaves nothing behind. `remove` does the same explicitly and reports
/// the error.
#[derive(Debug)]
pub struct JobDir {
    id: String,
    path: PathBuf,
    armed: bool,
}

impl JobDir {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory and anything left in it.
    ///
    /// Idempotent: a directory that is already gone is not an error.
    pub fn remove(mut self) -> io::Result<()> {
        self.armed = false;
        remove_dir_if_exists(&self.path)
    }
}

impl Drop for JobDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::warn!("Job {} dropped without cleanup, removing {}", self.id, self.path.display());
        if let Err(e) = remove_dir_if_exists(&self.path) {
            log::error!("Failed to remove abandoned job directory {}: {}", self.path.display(), e);
        }
    }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            log::debug!("Removed job directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
