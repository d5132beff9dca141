//! Progress observation for running archive jobs
//!
//! The compressor has no progress API, so a [`JobMonitor`] watches its
//! filesystem footprint instead: the artifact's size on every tick, and the
//! marker or failure sentinel for the terminal state.

use crate::archive::store::JobStore;
use crate::error::{Error, Result};
use crate::types::{ArchiveJob, ProgressEvent, ProgressStatus};
use futures::Stream;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

/// Client-facing message for a failed job
const FAILED_MESSAGE: &str = "the archive could not be created";
/// Client-facing message for a job that ran out of time
const TIMED_OUT_MESSAGE: &str = "the archive took too long to create";

/// Estimate completion from artifact size
///
/// Capped at 99 until the job is done, exactly 100 afterwards. An empty
/// selection weight reads as 0 so there is no division by zero.
pub fn compute_percent(current_bytes: u64, total_bytes: u64, done: bool) -> u8 {
    if done {
        return 100;
    }
    if total_bytes == 0 {
        return 0;
    }
    let ratio = (current_bytes as f64 / total_bytes as f64 * 100.0).round();
    ratio.min(99.0) as u8
}

/// A running job as returned by the launcher
#[derive(Clone, Debug)]
pub struct JobHandle {
    /// The job being built
    pub job: ArchiveJob,
    /// Cancels the compressor
    pub cancel: CancellationToken,
    /// When the job was launched (monotonic clock)
    pub started: Instant,
}

/// Outcome of one poll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Still running; percent is already monotonic
    Progress(u8),
    /// The marker was observed (and consumed)
    Done,
    /// The compressor failed with this exit code
    Failed(Option<i32>),
    /// The safety timeout expired
    TimedOut,
}

impl Tick {
    /// True for states that end the job
    pub fn is_terminal(self) -> bool {
        !matches!(self, Tick::Progress(_))
    }
}

/// Per-job poll loop state
#[derive(Debug)]
pub struct JobMonitor {
    store: JobStore,
    handle: JobHandle,
    poll_interval: Duration,
    timeout: Duration,
    last_percent: u8,
}

impl JobMonitor {
    /// Watch `handle` every `poll_interval` until done or `timeout` after launch
    pub fn new(store: JobStore, handle: JobHandle, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            store,
            handle,
            poll_interval,
            timeout,
            last_percent: 0,
        }
    }

    /// The job being watched
    pub fn job(&self) -> &ArchiveJob {
        &self.handle.job
    }

    /// Poll the job once
    pub async fn tick(&mut self) -> Result<Tick> {
        let job = &self.handle.job;

        if self.store.consume_marker(job).await? {
            self.last_percent = 100;
            info!(job = %job.id, "archive ready");
            return Ok(Tick::Done);
        }

        if let Some(exit_code) = self.store.consume_failure(job).await? {
            warn!(job = %job.id, ?exit_code, "archive job failed");
            self.store.discard(job).await;
            return Ok(Tick::Failed(exit_code));
        }

        if self.handle.started.elapsed() >= self.timeout {
            warn!(
                job = %job.id,
                waited_secs = self.timeout.as_secs(),
                "archive job timed out, cancelling compressor"
            );
            self.handle.cancel.cancel();
            return Ok(Tick::TimedOut);
        }

        let current = self.store.poll(job).await;
        let percent = compute_percent(current, job.total_weight_bytes, false).max(self.last_percent);
        self.last_percent = percent;
        trace!(job = %job.id, current, percent, "archive progress");
        Ok(Tick::Progress(percent))
    }

    fn event(&self, tick: Tick, download_base: &str) -> ProgressEvent {
        let job = &self.handle.job;
        let (status, download_url, message) = match tick {
            Tick::Progress(_) => (ProgressStatus::Progress, None, None),
            Tick::Done => (
                ProgressStatus::Done,
                Some(download_url(download_base, job)),
                None,
            ),
            Tick::Failed(_) => (ProgressStatus::Error, None, Some(FAILED_MESSAGE.to_string())),
            Tick::TimedOut => (
                ProgressStatus::Error,
                None,
                Some(TIMED_OUT_MESSAGE.to_string()),
            ),
        };

        ProgressEvent {
            percent: self.last_percent,
            status,
            stats: job.stats,
            download_url,
            message,
        }
    }

    /// Turn the monitor into a stream of progress events
    ///
    /// The first event is emitted immediately, then one per poll interval.
    /// The stream ends after the first terminal event. Dropping the stream
    /// stops polling but leaves the compressor running.
    pub fn into_events(self, download_base: String) -> impl Stream<Item = ProgressEvent> + Send {
        futures::stream::unfold(
            (self, download_base, true, false),
            |(mut monitor, base, first, finished)| async move {
                if finished {
                    return None;
                }
                if !first {
                    tokio::time::sleep(monitor.poll_interval).await;
                }

                let (event, finished) = match monitor.tick().await {
                    Ok(tick) => (monitor.event(tick, &base), tick.is_terminal()),
                    Err(e) => {
                        warn!(job = %monitor.job().id, error = %e, "failed to poll archive job");
                        (monitor.event(Tick::Failed(None), &base), true)
                    }
                };
                Some((event, (monitor, base, false, finished)))
            },
        )
    }

    /// Block until the job finishes, for callers that do not stream progress
    pub async fn wait(mut self) -> Result<ArchiveJob> {
        loop {
            match self.tick().await? {
                Tick::Progress(_) => tokio::time::sleep(self.poll_interval).await,
                Tick::Done => return Ok(self.handle.job),
                Tick::Failed(exit_code) => {
                    return Err(Error::CompressionFailed {
                        job: self.handle.job.id,
                        exit_code,
                    });
                }
                Tick::TimedOut => {
                    return Err(Error::TimedOut {
                        job: self.handle.job.id,
                        waited_secs: self.timeout.as_secs(),
                    });
                }
            }
        }
    }
}

/// Handoff URL for a finished job
pub fn download_url(base: &str, job: &ArchiveJob) -> String {
    format!(
        "{}/{}?name={}",
        base.trim_end_matches('/'),
        job.id,
        urlencoding::encode(&job.display_name)
    )
}
