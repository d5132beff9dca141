//! # dirindex
//!
//! Directory browser backend whose core is an archive pipeline: turn a
//! selection of files and folders into one zip built by the external `zip`
//! binary, stream live progress while it runs, and hand the result off
//! exactly once.
//!
//! ## Design
//!
//! - **Scan is the trust boundary** - client-supplied names are only ever
//!   matched against a fresh directory scan, never used as paths
//! - **Admission before work** - size and scratch-space quotas are checked
//!   before any job exists
//! - **Filesystem handshake** - a job is a pair of files in the scratch
//!   directory; the compressor's supervisor writes a marker when it is done
//! - **Library-first** - the HTTP API is a router you can mount or serve
//!
//! ## Quick Start
//!
//! ```no_run
//! use dirindex::{ArchiveService, Config, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.listing.root_dir = "/srv/files".into();
//!     config.validate()?;
//!
//!     // Serve /api/v1 until SIGTERM or Ctrl+C
//!     run_with_shutdown(config).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Archive build pipeline
pub mod archive;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Directory scanning
pub mod scanner;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

use std::sync::Arc;

// Re-export commonly used types
pub use archive::{ArchiveService, JobHandle, JobMonitor, JobStore};
pub use config::{ArchiveConfig, Config, DirectorySizeMode, ListingConfig};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use scanner::{DirectoryScanner, FsScanner};
pub use types::{
    ArchiveJob, ArchiveMode, ArchiveRequest, ArchiveStats, DirectoryEntry, ProgressEvent,
    ProgressStatus, QuotaKind, ResolvedFileSet,
};

/// Serve the API with graceful signal handling.
///
/// Validates `config`, sweeps expired scratch files left by a previous run,
/// then serves until a termination signal arrives and in-flight requests
/// have drained.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(config: Config) -> Result<()> {
    let service = Arc::new(ArchiveService::new(&config)?);
    let removed = service.sweep().await;
    if removed > 0 {
        tracing::info!(removed, "removed expired scratch files");
    }

    api::serve_with_shutdown(service, Arc::new(config), wait_for_signal()).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::SignalKind;

    // Registration may fail in restricted environments (containers, tests)
    let sigterm = register(SignalKind::terminate(), "SIGTERM");
    let sigint = register(SignalKind::interrupt(), "SIGINT");

    if sigterm.is_none() && sigint.is_none() {
        tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
        tokio::signal::ctrl_c().await.ok();
        return;
    }

    tokio::select! {
        _ = next_signal(sigterm) => tracing::info!("Received SIGTERM signal"),
        _ = next_signal(sigint) => tracing::info!("Received SIGINT signal (Ctrl+C)"),
    }
}

#[cfg(unix)]
fn register(kind: tokio::signal::unix::SignalKind, name: &str) -> Option<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(kind)
        .map_err(|e| tracing::warn!(error = %e, signal = name, "Could not register signal handler"))
        .ok()
}

/// Resolve on the next delivery, or never if the handler is missing
#[cfg(unix)]
async fn next_signal(signal: Option<tokio::signal::unix::Signal>) {
    match signal {
        Some(mut signal) => {
            signal.recv().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        return;
    }
    tracing::info!("Received Ctrl+C signal");
}
