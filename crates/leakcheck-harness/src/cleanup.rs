//! Removal of the subject's working directory after a run.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Removes a directory tree at most once.
///
/// The guard starts disarmed and only acts after [`arm`](Self::arm), which
/// the runner calls once the subject has launched. If the run unwinds before
/// [`run`](Self::run) is called, `Drop` performs the removal.
#[derive(Debug)]
pub struct WorkspaceCleanup {
    path: PathBuf,
    enabled: bool,
    armed: bool,
    ran: bool,
}

impl WorkspaceCleanup {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
            armed: false,
            ran: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Whether the removal has been performed.
    pub fn ran(&self) -> bool {
        self.ran
    }

    /// Remove the directory if enabled and armed. Returns true only for the
    /// call that performed the removal.
    pub fn run(&mut self) -> bool {
        if !self.enabled || !self.armed || self.ran {
            return false;
        }
        self.ran = true;

        match remove_tree(&self.path) {
            Ok(()) => info!("Removed working directory {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove working directory {}: {}",
                self.path.display(),
                e
            ),
        }
        true
    }
}

impl Drop for WorkspaceCleanup {
    fn drop(&mut self) {
        self.run();
    }
}

fn remove_tree(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
