//! Request-scoped temporary files.
//!
//! A `StagedArtifact` owns one path inside the staging directory. The file is
//! removed at most once: either explicitly through [`StagedArtifact::remove`]
//! or when the handle is dropped, whichever happens first. Nothing is shared
//! between requests, so no locking is involved.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use rand_core::{OsRng, RngCore};

use crate::video_id::VideoId;

pub struct StagedArtifact {
    path: PathBuf,
    removed: bool,
}

impl StagedArtifact {
    /// Reserves a collision-free path for `role` (e.g. `video`, `audio`,
    /// `merged`). The file itself is created by whoever writes to it.
    pub fn reserve(dir: &Path, video_id: &VideoId, role: &str, extension: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let suffix = OsRng.next_u64();
        let name = format!("tubegrab-{video_id}-{role}-{millis}-{suffix:016x}.{extension}");
        Self {
            path: dir.join(name),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file. Repeated calls are no-ops and a file that was never
    /// written counts as removed.
    pub fn remove(&mut self) -> io::Result<()> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "removed staged artifact");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

impl fmt::Debug for StagedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedArtifact")
            .field("path", &self.path)
            .field("removed", &self.removed)
            .finish()
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if let Err(err) = self.remove() {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to remove staged artifact");
        }
    }
}

/// Removes every artifact, attempting each one even when an earlier removal
/// fails. Returns the number of failures.
pub fn remove_all(artifacts: &mut [&mut StagedArtifact]) -> usize {
    let mut failures = 0;
    for artifact in artifacts.iter_mut() {
        if let Err(err) = artifact.remove() {
            failures += 1;
            tracing::warn!(path = %artifact.path.display(), error = %err, "failed to remove staged artifact");
        }
    }
    failures
}
