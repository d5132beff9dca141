//! Allowed-set resolution
//!
//! Intersects a client selection with the authoritative scan. The result only
//! ever contains entries taken from the scan, so a name the scanner did not
//! report (or hid) can never reach the compressor.

use crate::error::{Error, Result};
use crate::types::{ArchiveMode, ArchiveRequest, DirectoryEntry, ResolvedFileSet};
use crate::utils::final_component;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Resolve `request` against `scan`
///
/// - `All` takes every existing entry of the scan.
/// - `Subset` strips each requested name to its final path component and
///   keeps it only if the scan has an existing entry of exactly that name.
///   Unknown names are dropped silently; duplicates are kept once, in first
///   request order.
///
/// Fails with [`Error::InvalidSelection`] when nothing survives.
pub fn resolve_selection(
    request: &ArchiveRequest,
    scan: &[DirectoryEntry],
) -> Result<ResolvedFileSet> {
    let entries: Vec<DirectoryEntry> = match request.mode {
        ArchiveMode::All => scan.iter().filter(|e| e.exists).cloned().collect(),
        ArchiveMode::Subset => {
            let by_name: HashMap<&str, &DirectoryEntry> = scan
                .iter()
                .filter(|e| e.exists)
                .map(|e| (e.name.as_str(), e))
                .collect();

            let mut seen = HashSet::new();
            let mut selected = Vec::new();
            for requested in &request.requested_names {
                let Some(name) = final_component(requested) else {
                    debug!(requested = %requested, "dropping unusable selection name");
                    continue;
                };
                match by_name.get(name) {
                    Some(entry) if seen.insert(name) => selected.push((*entry).clone()),
                    Some(_) => {}
                    None => debug!(requested = %requested, "dropping name absent from scan"),
                }
            }
            selected
        }
    };

    if entries.is_empty() {
        return Err(Error::InvalidSelection(match request.mode {
            ArchiveMode::All => "the directory has nothing to archive".to_string(),
            ArchiveMode::Subset => "none of the selected items exist in this directory".to_string(),
        }));
    }

    Ok(ResolvedFileSet::from_entries(entries))
}
