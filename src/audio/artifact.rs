use crate::error::Result;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Who is responsible for deleting the file behind an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Someone else's file; never deleted through this handle
    Borrowed,
    /// Temporary file; deleted when the handle is released or dropped
    Owned,
}

/// A file-backed audio resource plus its deletion responsibility.
///
/// Handles are move-only, so an owned file is deleted exactly once: either by
/// an explicit `release`, or by `Drop` on whatever exit path drops it first.
pub struct AudioArtifact {
    path: PathBuf,
    ownership: Ownership,
    released: bool,
}

impl AudioArtifact {
    pub fn borrowed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ownership: Ownership::Borrowed,
            released: false,
        }
    }

    pub fn owned(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ownership: Ownership::Owned,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }

    /// A non-owning handle to the same file.
    pub fn borrow_handle(&self) -> AudioArtifact {
        AudioArtifact::borrowed(self.path.clone())
    }

    /// Delete the file now (if owned) and report failures instead of logging them.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        if self.is_owned() {
            remove_if_present(&self.path)?;
        }
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Deleted temporary audio artifact {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

impl fmt::Debug for AudioArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioArtifact")
            .field("path", &self.path)
            .field("ownership", &self.ownership)
            .finish()
    }
}

impl Drop for AudioArtifact {
    fn drop(&mut self) {
        if self.released || !self.is_owned() {
            return;
        }
        if let Err(e) = remove_if_present(&self.path) {
            warn!(
                "Failed to delete temporary audio artifact {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
