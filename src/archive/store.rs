//! Filesystem job store
//!
//! The only channel between the compressor and its observers is a pair of
//! paths in the scratch directory. Everything this subsystem writes there
//! starts with the configured prefix:
//!
//! ```text
//! <prefix><token>.zip          artifact, the compressor's stdout
//! <prefix><token>.zip.done     completion marker, empty, written last
//! <prefix><token>.zip.failed   failure sentinel, holds the exit code
//! <prefix><token>.zip.claimed  artifact being handed off
//! ```

use crate::error::{Error, Result};
use crate::types::{ArchiveJob, ResolvedFileSet};
use chrono::Utc;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const ARTIFACT_EXTENSION: &str = ".zip";
const MARKER_SUFFIX: &str = ".done";
const FAILURE_SUFFIX: &str = ".failed";
const CLAIMED_SUFFIX: &str = ".claimed";

/// Length of a job token in hex characters (128 bits)
pub const TOKEN_LEN: usize = 32;

/// Attempts at drawing an unused token before giving up
const MAX_TOKEN_ATTEMPTS: u32 = 8;

/// Scratch directory plus naming convention
#[derive(Clone, Debug)]
pub struct JobStore {
    scratch_dir: PathBuf,
    prefix: String,
}

impl JobStore {
    /// Create a store rooted at `scratch_dir` using `prefix` for every file
    pub fn new(scratch_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            prefix: prefix.into(),
        }
    }

    /// The scratch directory
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// True if `file_name` follows this store's naming convention
    pub fn owns(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix) && file_name.len() > self.prefix.len()
    }

    /// Reject anything that is not a well-formed job token
    ///
    /// Tokens are exactly [`TOKEN_LEN`] lowercase hex characters, which rules
    /// out separators, dots and every other way of escaping the scratch dir.
    pub fn validate_token(token: &str) -> Result<()> {
        let well_formed = token.len() == TOKEN_LEN
            && token
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        if well_formed {
            Ok(())
        } else {
            Err(Error::InvalidPath("malformed archive token".to_string()))
        }
    }

    /// Artifact path for a token
    pub fn artifact_path(&self, token: &str) -> PathBuf {
        self.scratch_dir
            .join(format!("{}{}{}", self.prefix, token, ARTIFACT_EXTENSION))
    }

    fn sibling(&self, token: &str, suffix: &str) -> PathBuf {
        self.scratch_dir.join(format!(
            "{}{}{}{}",
            self.prefix, token, ARTIFACT_EXTENSION, suffix
        ))
    }

    /// Completion marker path for a token
    pub fn marker_path(&self, token: &str) -> PathBuf {
        self.sibling(token, MARKER_SUFFIX)
    }

    /// Failure sentinel path for a token
    pub fn failure_path(&self, token: &str) -> PathBuf {
        self.sibling(token, FAILURE_SUFFIX)
    }

    /// Path an artifact is renamed to while it is being served
    pub fn claimed_path(&self, token: &str) -> PathBuf {
        self.sibling(token, CLAIMED_SUFFIX)
    }

    /// Allocate a new job with fresh, unused paths
    ///
    /// Creates the scratch directory if needed but no job files: the
    /// launcher creates the artifact when it starts the compressor.
    pub async fn create(&self, display_name: String, set: &ResolvedFileSet) -> Result<ArchiveJob> {
        fs::create_dir_all(&self.scratch_dir).await?;

        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = format!("{:032x}", rand::thread_rng().r#gen::<u128>());

            let artifact_path = self.artifact_path(&token);
            let paths = [
                artifact_path.clone(),
                self.marker_path(&token),
                self.failure_path(&token),
                self.claimed_path(&token),
            ];
            if any_exists(&paths).await? {
                debug!(token = %token, "job token collision, drawing again");
                continue;
            }

            return Ok(ArchiveJob {
                marker_path: self.marker_path(&token),
                failure_path: self.failure_path(&token),
                id: token,
                artifact_path,
                display_name,
                total_weight_bytes: set.total_weight_bytes,
                stats: set.stats,
                started_at: Utc::now(),
            });
        }

        Err(Error::LaunchFailed(format!(
            "no unused job token after {} attempts in {}",
            MAX_TOKEN_ATTEMPTS,
            self.scratch_dir.display()
        )))
    }

    /// Current artifact size in bytes, from a fresh stat
    ///
    /// The compressor streams into the artifact, so this grows while the job
    /// runs. Returns 0 if the file is missing.
    pub async fn poll(&self, job: &ArchiveJob) -> u64 {
        fs::metadata(&job.artifact_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Observe and remove the completion marker in one step
    ///
    /// Returns true exactly once per marker: the removal is the observation,
    /// so two observers can never both see completion.
    pub async fn consume_marker(&self, job: &ArchiveJob) -> std::io::Result<bool> {
        match fs::remove_file(&job.marker_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Observe and remove the failure sentinel
    ///
    /// `Ok(None)` means the job has not failed; `Ok(Some(code))` carries the
    /// recorded exit code, if any.
    pub async fn consume_failure(&self, job: &ArchiveJob) -> std::io::Result<Option<Option<i32>>> {
        let contents = match fs::read_to_string(&job.failure_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        remove_if_exists(&job.failure_path).await?;
        Ok(Some(contents.trim().parse().ok()))
    }

    /// Take exclusive ownership of a finished artifact for handoff
    ///
    /// The rename is atomic, so of two concurrent handoffs only one succeeds;
    /// the other sees [`Error::NotFound`].
    pub async fn claim(&self, token: &str) -> Result<PathBuf> {
        Self::validate_token(token)?;

        let artifact = self.artifact_path(token);
        let claimed = self.claimed_path(token);

        // Failed jobs leave a partial artifact behind
        if fs::try_exists(self.failure_path(token)).await.unwrap_or(false) {
            return Err(Error::NotFound(format!("archive {}", token)));
        }

        match fs::rename(&artifact, &claimed).await {
            Ok(()) => {
                remove_if_exists(&self.marker_path(token)).await.ok();
                Ok(claimed)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("archive {}", token)))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Remove every file belonging to a job, ignoring ones already gone
    pub async fn discard(&self, job: &ArchiveJob) {
        for path in [
            &job.artifact_path,
            &job.marker_path,
            &job.failure_path,
            &self.claimed_path(&job.id),
        ] {
            if let Err(e) = remove_if_exists(path).await {
                warn!(job = %job.id, ?path, error = %e, "failed to remove job file");
            }
        }
    }
}

async fn any_exists(paths: &[PathBuf]) -> Result<bool> {
    for path in paths {
        if fs::try_exists(path).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Remove a file, treating "already gone" as success
pub(crate) async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
