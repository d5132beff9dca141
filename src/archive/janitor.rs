//! Retention sweep of the scratch directory

use crate::archive::store::JobStore;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Delete scratch files older than `retention`, returning how many were removed
///
/// Only files following the store's naming convention are considered. Every
/// failure (unreadable directory, vanished file, permission error) is logged
/// and skipped; a sweep never fails. `now` is taken as a parameter so callers
/// can evaluate ages against any clock.
pub async fn sweep(store: &JobStore, retention: Duration, now: SystemTime) -> usize {
    let dir = store.scratch_dir();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(?dir, error = %e, "cannot read scratch directory for cleanup");
            }
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(?dir, error = %e, "scratch directory listing failed");
                break;
            }
        };

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !store.owns(&name) {
            continue;
        }

        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };

        // Files from the future (clock skew) have age zero
        let age = now.duration_since(modified).unwrap_or_default();
        if age <= retention {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!(file = %name, age_secs = age.as_secs(), "removed expired scratch file");
                removed += 1;
            }
            Err(e) => warn!(file = %name, error = %e, "failed to remove expired scratch file"),
        }
    }

    removed
}
