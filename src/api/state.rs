//! Application state for the API server

use crate::archive::ArchiveService;
use crate::config::Config;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone, Debug)]
pub struct AppState {
    /// The archive pipeline
    pub service: Arc<ArchiveService>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<ArchiveService>, config: Arc<Config>) -> Self {
        Self { service, config }
    }
}
