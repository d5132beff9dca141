//! Core types for dirindex

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// One entry of an authoritative directory scan
///
/// Produced by a [`DirectoryScanner`](crate::scanner::DirectoryScanner) and
/// read-only to the archive pipeline. `name` is unique within one directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DirectoryEntry {
    /// Final path component of the entry
    pub name: String,
    /// Size in bytes (recursive size or 0 for directories, depending on configuration)
    pub size_bytes: u64,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// False for broken symlinks and entries whose target vanished
    pub exists: bool,
}

impl DirectoryEntry {
    /// Convenience constructor for an existing regular file
    pub fn file(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            is_directory: false,
            exists: true,
        }
    }

    /// Convenience constructor for an existing directory
    pub fn directory(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            is_directory: true,
            exists: true,
        }
    }
}

/// Which part of the directory a request wants archived
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveMode {
    /// Every entry of the scan
    #[default]
    All,
    /// Only the requested names
    #[serde(rename = "selected")]
    Subset,
}

/// A validated archive request, created per HTTP request and never persisted
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveRequest {
    /// ALL or SUBSET
    pub mode: ArchiveMode,
    /// Requested entry names, in client order (ignored for [`ArchiveMode::All`])
    pub requested_names: Vec<String>,
    /// Whether the client wants a live progress feed
    pub wants_live_progress: bool,
}

impl ArchiveRequest {
    /// Request every entry of the directory
    pub fn all() -> Self {
        Self::default()
    }

    /// Request a subset of the directory by name
    pub fn subset<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: ArchiveMode::Subset,
            requested_names: names.into_iter().map(Into::into).collect(),
            wants_live_progress: false,
        }
    }

    /// Set whether the client wants a live progress feed
    pub fn with_live_progress(mut self, wants_live_progress: bool) -> Self {
        self.wants_live_progress = wants_live_progress;
        self
    }
}

/// Folder and file counts of a selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStats {
    /// Number of selected directories
    pub total_folders: usize,
    /// Number of selected files
    pub total_files: usize,
}

/// The authorized subset of a directory's entries that will be archived
///
/// Every member is taken from the authoritative scan, never from client input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFileSet {
    /// Entries in archive order
    pub entries: Vec<DirectoryEntry>,
    /// Sum of the entries' sizes
    pub total_weight_bytes: u64,
    /// Folder and file counts
    pub stats: ArchiveStats,
}

impl ResolvedFileSet {
    /// Build a set from entries, computing the aggregate weight and counts
    pub fn from_entries(entries: Vec<DirectoryEntry>) -> Self {
        let total_weight_bytes = entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.size_bytes));
        let total_folders = entries.iter().filter(|e| e.is_directory).count();
        let stats = ArchiveStats {
            total_folders,
            total_files: entries.len() - total_folders,
        };

        Self {
            entries,
            total_weight_bytes,
            stats,
        }
    }

    /// Number of resolved entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing survived resolution
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in archive order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

/// Which limit rejected an archive request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    /// The configured maximum archive size
    SizeLimit,
    /// Free space on the scratch volume
    DiskSpace,
}

/// A background archive job
///
/// A job has no in-memory owner beyond its filesystem paths: the compressor
/// writes the artifact and then the marker, observers delete both on terminal
/// observation.
#[derive(Clone, Debug)]
pub struct ArchiveJob {
    /// Opaque, unguessable token (lowercase hex)
    pub id: String,
    /// Scratch location of the in-progress/finished archive
    pub artifact_path: PathBuf,
    /// Sentinel whose existence signals successful completion
    pub marker_path: PathBuf,
    /// Sentinel whose existence signals a failed compressor run
    pub failure_path: PathBuf,
    /// User-facing filename, sanitized and timestamped
    pub display_name: String,
    /// Aggregate input size, fixed for the job's lifetime
    pub total_weight_bytes: u64,
    /// Folder and file counts
    pub stats: ArchiveStats,
    /// Wall clock start time
    pub started_at: DateTime<Utc>,
}

/// Status of a progress event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// The compressor is still running
    Progress,
    /// The archive is ready to download
    Done,
    /// The job failed or timed out
    Error,
}

/// One event of the live progress feed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Estimated completion, 0..=100 (at most 99 until the job is done)
    pub percent: u8,
    /// Current status
    pub status: ProgressStatus,
    /// Folder and file counts of the selection
    pub stats: ArchiveStats,
    /// Download handoff URL, present only on the `done` event
    pub download_url: Option<String>,
    /// Short failure reason, present only on `error` events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_set_sums_weights_and_counts_kinds() {
        let set = ResolvedFileSet::from_entries(vec![
            DirectoryEntry::file("a.txt", 100),
            DirectoryEntry::directory("sub", 400),
            DirectoryEntry::file("b.bin", 24),
        ]);

        assert_eq!(set.total_weight_bytes, 524);
        assert_eq!(set.stats.total_folders, 1);
        assert_eq!(set.stats.total_files, 2);
        assert_eq!(set.names().collect::<Vec<_>>(), ["a.txt", "sub", "b.bin"]);
    }

    #[test]
    fn archive_mode_uses_wire_names() {
        assert_eq!(serde_json::to_value(ArchiveMode::All).unwrap(), "all");
        assert_eq!(serde_json::to_value(ArchiveMode::Subset).unwrap(), "selected");
        let mode: ArchiveMode = serde_json::from_str("\"selected\"").unwrap();
        assert_eq!(mode, ArchiveMode::Subset);
    }

    #[test]
    fn progress_event_serializes_feed_shape() {
        let event = ProgressEvent {
            percent: 42,
            status: ProgressStatus::Progress,
            stats: ArchiveStats {
                total_folders: 1,
                total_files: 3,
            },
            download_url: None,
            message: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["percent"], 42);
        assert_eq!(json["status"], "progress");
        assert_eq!(json["stats"]["totalFolders"], 1);
        assert_eq!(json["stats"]["totalFiles"], 3);
        assert!(json["downloadUrl"].is_null());
        assert!(json.get("message").is_none());
    }
}
