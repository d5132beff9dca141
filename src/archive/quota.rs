//! Admission control before any job is launched

use crate::error::{Error, Result};
use crate::types::{QuotaKind, ResolvedFileSet};
use crate::utils::get_available_space;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Reports free space on a volume
///
/// Injected so tests can simulate a full scratch disk.
pub trait FreeSpaceProbe: Send + Sync {
    /// Bytes available to this process on the volume holding `path`
    fn available_space(&self, path: &Path) -> std::io::Result<u64>;
}

/// Probe backed by `statvfs` / `GetDiskFreeSpaceExW`
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemFreeSpace;

impl FreeSpaceProbe for SystemFreeSpace {
    fn available_space(&self, path: &Path) -> std::io::Result<u64> {
        get_available_space(path)
    }
}

/// Rejects selections that exceed the size ceiling or the scratch volume
///
/// The space check is a conservative heuristic (compressed output is
/// normally smaller than its input) and is not reserved against concurrent
/// jobs.
#[derive(Clone)]
pub struct QuotaGuard {
    max_archive_size: u64,
    scratch_dir: PathBuf,
    probe: Arc<dyn FreeSpaceProbe>,
}

impl QuotaGuard {
    /// Create a guard for `scratch_dir` with a size ceiling in bytes
    pub fn new(max_archive_size: u64, scratch_dir: PathBuf, probe: Arc<dyn FreeSpaceProbe>) -> Self {
        Self {
            max_archive_size,
            scratch_dir,
            probe,
        }
    }

    /// Admit or reject a resolved selection
    pub fn check(&self, set: &ResolvedFileSet) -> Result<()> {
        let required = set.total_weight_bytes;

        if required > self.max_archive_size {
            return Err(Error::QuotaExceeded {
                kind: QuotaKind::SizeLimit,
                required,
                limit: self.max_archive_size,
            });
        }

        let available = self
            .probe
            .available_space(&self.scratch_dir)
            .map_err(|e| {
                Error::DiskSpaceCheckFailed(format!("{}: {}", self.scratch_dir.display(), e))
            })?;

        if required > available {
            return Err(Error::QuotaExceeded {
                kind: QuotaKind::DiskSpace,
                required,
                limit: available,
            });
        }

        debug!(required, available, "quota check passed");
        Ok(())
    }
}

impl std::fmt::Debug for QuotaGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaGuard")
            .field("max_archive_size", &self.max_archive_size)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}
