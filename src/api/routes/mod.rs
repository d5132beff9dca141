//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`archive`] - Archive creation, progress feed and download handoff
//! - [`listing`] - Directory listings used to build selections
//! - [`system`] - Health and OpenAPI

use crate::types::{ArchiveMode, ArchiveRequest, DirectoryEntry};
use serde::{Deserialize, Serialize};

mod archive;
mod listing;
mod system;

pub use archive::*;
pub use listing::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /archive
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ArchiveForm {
    /// Directory to archive from, relative to the served root (default: root)
    #[serde(default)]
    pub path: String,
    /// `all` or `selected`
    #[serde(default)]
    pub mode: ArchiveMode,
    /// Entry names to archive when mode is `selected`
    #[serde(default)]
    pub names: Vec<String>,
    /// Stream progress events instead of waiting for the archive (default: false)
    #[serde(default)]
    pub progress: bool,
}

impl ArchiveForm {
    /// Validate the loosely typed form into a pipeline request
    pub fn to_request(&self) -> ArchiveRequest {
        let request = match self.mode {
            ArchiveMode::All => ArchiveRequest::all(),
            ArchiveMode::Subset => ArchiveRequest::subset(self.names.iter().cloned()),
        };
        request.with_live_progress(self.progress)
    }
}

/// Query parameters for GET /download/:token
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadQuery {
    /// Attachment filename (sanitized, `.zip` appended if missing)
    pub name: Option<String>,
}

/// Response for GET /list
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ListingResponse {
    /// Directory that was listed, relative to the served root
    pub path: String,
    /// Entries visible in the directory, sorted by name
    pub entries: Vec<DirectoryEntry>,
}
