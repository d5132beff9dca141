//! External compressor invocation
//!
//! [`Compressor`] starts the `zip` binary as a detached child and hands the
//! child to a supervisor task. The supervisor is the only place that knows
//! how the run ended; it reports the outcome through the job store's naming
//! convention (marker or failure sentinel) and nowhere else.

use crate::config::CompressorConfig;
use crate::error::{Error, Result};
use crate::types::{ArchiveJob, ResolvedFileSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Handle on the external `zip` binary
#[derive(Clone, Debug)]
pub struct Compressor {
    binary_path: PathBuf,
    level: u8,
    recursive: bool,
}

impl Compressor {
    /// Create a compressor with an explicit binary path
    pub fn new(binary_path: PathBuf, level: u8, recursive: bool) -> Self {
        Self {
            binary_path,
            level,
            recursive,
        }
    }

    /// Attempt to find `zip` in PATH
    pub fn from_path(level: u8, recursive: bool) -> Option<Self> {
        which::which("zip")
            .ok()
            .map(|path| Self::new(path, level, recursive))
    }

    /// Resolve the binary from configuration
    ///
    /// An explicit `zip_path` wins; otherwise `PATH` is searched when
    /// `search_path` is enabled. A missing binary is a [`Error::LaunchFailed`].
    pub fn from_config(config: &CompressorConfig) -> Result<Self> {
        if let Some(path) = &config.zip_path {
            return Ok(Self::new(path.clone(), config.level, config.recursive));
        }

        if config.search_path
            && let Some(compressor) = Self::from_path(config.level, config.recursive)
        {
            return Ok(compressor);
        }

        Err(Error::LaunchFailed(
            "zip binary not configured and not found in PATH".to_string(),
        ))
    }

    /// Path of the binary this compressor runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Command line arguments for one job
    ///
    /// The archive goes to stdout (`-`), which the launcher points at the
    /// job's artifact. Every name is passed as `./<name>` so a file called
    /// `-T` is never parsed as an option, and `-nw` turns off zip's own
    /// wildcard expansion.
    fn args(&self, set: &ResolvedFileSet) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-q".into(),
            "-nw".into(),
            format!("-{}", self.level.min(9)).into(),
        ];
        if self.recursive {
            args.push("-r".into());
        }
        args.push("-".into());
        args.extend(set.names().map(|name| format!("./{}", name).into()));
        args
    }

    /// Start compressing `set` from `working_dir` into the job's artifact
    ///
    /// The artifact is created here and handed to the child as its stdout,
    /// so it grows in place under the job's own name and zip never creates
    /// a temp file of its own. Returns as soon as the child is running. The
    /// returned token cancels the run: the supervisor kills the child and
    /// leaves the partial artifact for the janitor.
    pub fn launch(
        &self,
        job: &ArchiveJob,
        working_dir: &Path,
        set: &ResolvedFileSet,
    ) -> Result<CancellationToken> {
        let artifact = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&job.artifact_path)
            .map_err(|e| {
                Error::LaunchFailed(format!(
                    "failed to create {}: {}",
                    job.artifact_path.display(),
                    e
                ))
            })?;

        let spawned = Command::new(&self.binary_path)
            .args(self.args(set))
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(artifact))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_file(&job.artifact_path) {
                    warn!(job = %job.id, error = %cleanup, "failed to remove unused artifact");
                }
                return Err(Error::LaunchFailed(format!(
                    "failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                )));
            }
        };

        info!(
            job = %job.id,
            pid = child.id(),
            entries = set.len(),
            total_bytes = set.total_weight_bytes,
            dir = ?working_dir,
            "archive job started"
        );

        let cancel = CancellationToken::new();
        tokio::spawn(supervise(child, job.clone(), cancel.clone()));
        Ok(cancel)
    }
}

/// Own the child until it exits, then publish the outcome
async fn supervise(mut child: Child, job: ArchiveJob, cancel: CancellationToken) {
    let stderr = tokio::spawn(drain(child.stderr.take()));

    let status = tokio::select! {
        status = child.wait() => status,
        _ = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!(job = %job.id, error = %e, "failed to kill compressor");
            }
            warn!(job = %job.id, "compressor cancelled");
            return;
        }
    };

    let stderr = stderr.await.unwrap_or_default();

    match status {
        Ok(status) if status.success() => {
            if !stderr.trim().is_empty() {
                debug!(job = %job.id, output = %stderr.trim(), "compressor output");
            }
            finish(&job).await;
        }
        Ok(status) => {
            error!(
                job = %job.id,
                exit_code = ?status.code(),
                stderr = %stderr.trim(),
                "compressor failed"
            );
            fail(&job, status).await;
        }
        Err(e) => {
            error!(job = %job.id, error = %e, "failed to wait for compressor");
            write_sentinel(&job, &job.failure_path, b"").await;
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Signal success, but only if the compressor actually wrote an archive
async fn finish(job: &ArchiveJob) {
    match fs::metadata(&job.artifact_path).await {
        Ok(meta) if meta.len() > 0 => {
            write_sentinel(job, &job.marker_path, b"").await;
            info!(job = %job.id, bytes = meta.len(), "archive job finished");
        }
        Ok(_) => {
            error!(job = %job.id, "compressor succeeded without producing an archive");
            write_sentinel(job, &job.failure_path, b"").await;
        }
        Err(e) => {
            error!(job = %job.id, error = %e, "archive disappeared before completion");
            write_sentinel(job, &job.failure_path, b"").await;
        }
    }
}

async fn fail(job: &ArchiveJob, status: ExitStatus) {
    let contents = status.code().map(|c| c.to_string()).unwrap_or_default();
    write_sentinel(job, &job.failure_path, contents.as_bytes()).await;
}

/// Publish a sentinel atomically so observers never read it half-written
async fn write_sentinel(job: &ArchiveJob, path: &Path, contents: &[u8]) {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    let result = match fs::write(&staging, contents).await {
        Ok(()) => fs::rename(&staging, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        error!(job = %job.id, ?path, error = %e, "failed to write job sentinel");
    }
}
