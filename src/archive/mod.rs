//! Archive build pipeline
//!
//! A request flows through the stages in this order:
//!
//! 1. [`janitor::sweep`] drops expired scratch files
//! 2. the [`DirectoryScanner`] lists the target directory
//! 3. [`resolver::resolve_selection`] intersects the selection with the scan
//! 4. [`QuotaGuard`] admits or rejects the resolved set
//! 5. [`JobStore::create`] allocates the job's paths
//! 6. [`Compressor::launch`] starts `zip` in the background
//!
//! From there a [`JobMonitor`] observes the job and [`Artifact`] hands the
//! result off exactly once. Stages 2 to 4 have no side effects, so rejected
//! requests leave nothing behind.

pub mod handoff;
pub mod janitor;
pub mod launcher;
pub mod monitor;
pub mod quota;
pub mod resolver;
pub mod store;

pub use handoff::Artifact;
pub use launcher::Compressor;
pub use monitor::{JobHandle, JobMonitor, Tick, compute_percent};
pub use quota::{FreeSpaceProbe, QuotaGuard, SystemFreeSpace};
pub use resolver::resolve_selection;
pub use store::JobStore;

use crate::config::{ArchiveConfig, Config};
use crate::error::{Error, Result};
use crate::scanner::{DirectoryScanner, FsScanner};
use crate::types::{ArchiveRequest, ResolvedFileSet};
use crate::utils::sanitize_base_name;
use chrono::{DateTime, Local};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Instant;
use tracing::{info, warn};

/// Base name used for archives of the served root itself
const ROOT_BASE_NAME: &str = "home";

/// Entry point of the archive pipeline
pub struct ArchiveService {
    /// Canonical served root
    root: PathBuf,
    config: ArchiveConfig,
    scanner: Arc<dyn DirectoryScanner>,
    quota: QuotaGuard,
    store: JobStore,
    compressor: Option<Compressor>,
}

impl ArchiveService {
    /// Build the service with the filesystem scanner and the system disk probe
    pub fn new(config: &Config) -> Result<Self> {
        let scanner = FsScanner::new(&config.listing, config.archive.directory_sizes)?;
        Self::with_parts(config, Arc::new(scanner), Arc::new(SystemFreeSpace))
    }

    /// Build the service with injected collaborators
    ///
    /// Validates `config` and resolves the served root once. A compressor
    /// that cannot be resolved is not fatal here: listing still works and
    /// every archive request fails with [`Error::LaunchFailed`].
    pub fn with_parts(
        config: &Config,
        scanner: Arc<dyn DirectoryScanner>,
        probe: Arc<dyn FreeSpaceProbe>,
    ) -> Result<Self> {
        config.validate()?;

        let root = std::fs::canonicalize(&config.listing.root_dir).map_err(|e| {
            Error::DirectoryNotAccessible(format!("{}: {}", config.listing.root_dir.display(), e))
        })?;

        let archive = config.archive.clone();
        let compressor = match Compressor::from_config(&archive.compressor) {
            Ok(compressor) => Some(compressor),
            Err(e) => {
                warn!(error = %e, "archive downloads are unavailable");
                None
            }
        };

        Ok(Self {
            root,
            quota: QuotaGuard::new(archive.max_archive_size, archive.scratch_dir.clone(), probe),
            store: JobStore::new(archive.scratch_dir.clone(), archive.artifact_prefix.clone()),
            config: archive,
            scanner,
            compressor,
        })
    }

    /// The directory scanner
    pub fn scanner(&self) -> &dyn DirectoryScanner {
        self.scanner.as_ref()
    }

    /// The job store
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Archive settings in effect
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// True if a compressor binary was found
    pub fn compressor_available(&self) -> bool {
        self.compressor.is_some()
    }

    /// Map a client path (relative to the served root) to a physical directory
    ///
    /// Rejects parent, root and prefix components outright, then rejects any
    /// directory that canonicalizes outside the root (symlink escape).
    pub async fn locate_directory(&self, relative: &str) -> Result<PathBuf> {
        let mut clean = PathBuf::new();
        for component in Path::new(relative.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::InvalidPath(format!(
                        "{:?} escapes the served directory",
                        relative
                    )));
                }
            }
        }

        let root = &self.root;
        let target = match tokio::fs::canonicalize(root.join(&clean)).await {
            Ok(target) => target,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("directory {:?}", relative)));
            }
            Err(e) => {
                return Err(Error::DirectoryNotAccessible(format!("{:?}: {}", relative, e)));
            }
        };

        if !target.starts_with(root) {
            return Err(Error::InvalidPath(format!(
                "{:?} escapes the served directory",
                relative
            )));
        }
        if !target.is_dir() {
            return Err(Error::InvalidPath(format!("{:?} is not a directory", relative)));
        }

        Ok(target)
    }

    /// Run the pipeline up to a launched job
    ///
    /// `dir` must come from [`Self::locate_directory`].
    pub async fn start(&self, dir: &Path, request: &ArchiveRequest) -> Result<JobHandle> {
        self.sweep().await;

        let scan = self.scanner.list_directory(dir).await?;
        let set = resolve_selection(request, &scan)?;
        self.quota.check(&set)?;

        let compressor = self.compressor.as_ref().ok_or_else(|| {
            Error::LaunchFailed("zip binary not configured and not found in PATH".to_string())
        })?;

        let display_name = self.display_name(dir, &set, Local::now());
        let job = self.store.create(display_name, &set).await?;
        let cancel = compressor.launch(&job, dir, &set)?;

        info!(
            job = %job.id,
            display_name = %job.display_name,
            folders = set.stats.total_folders,
            files = set.stats.total_files,
            "archive requested"
        );

        Ok(JobHandle {
            job,
            cancel,
            started: Instant::now(),
        })
    }

    /// Monitor for a launched job
    pub fn monitor(&self, handle: JobHandle) -> JobMonitor {
        JobMonitor::new(
            self.store.clone(),
            handle,
            self.config.poll_interval,
            self.config.progress_timeout,
        )
    }

    /// Claim a finished artifact for download
    pub async fn handoff(&self, token: &str, requested_name: Option<&str>) -> Result<Artifact> {
        Artifact::open(&self.store, token, requested_name).await
    }

    /// Remove expired scratch files now
    pub async fn sweep(&self) -> usize {
        janitor::sweep(&self.store, self.config.retention, SystemTime::now()).await
    }

    /// `<base>_download_<YYYYmmdd-HHMMSS>.zip`
    ///
    /// The base is the sole selected entry's name, or the directory's name
    /// when several entries are selected.
    fn display_name(&self, dir: &Path, set: &ResolvedFileSet, now: DateTime<Local>) -> String {
        let base = match set.entries.as_slice() {
            [only] => only.name.clone(),
            _ => self.directory_base_name(dir),
        };
        format!(
            "{}_download_{}.zip",
            sanitize_base_name(&base),
            now.format("%Y%m%d-%H%M%S")
        )
    }

    fn directory_base_name(&self, dir: &Path) -> String {
        if dir == self.root {
            return ROOT_BASE_NAME.to_string();
        }
        dir.file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .unwrap_or_else(|| ROOT_BASE_NAME.to_string())
    }
}

impl std::fmt::Debug for ArchiveService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveService")
            .field("root", &self.root)
            .field("store", &self.store)
            .field("quota", &self.quota)
            .field("compressor", &self.compressor)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::quota::tests::FixedFreeSpace;
    use crate::config::DirectorySizeMode;
    use crate::types::DirectoryEntry;
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        root: PathBuf,
        scratch: PathBuf,
        service: ArchiveService,
    }

    fn fixture(max_archive_size: u64, free_space: u64) -> Fixture {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let scratch = temp.path().join("scratch");
        std::fs::create_dir_all(root.join("docs/sub")).unwrap();
        std::fs::write(root.join("docs/a.txt"), vec![0u8; 100]).unwrap();

        let mut config = Config::default();
        config.listing.root_dir = root.clone();
        config.archive.scratch_dir = scratch.clone();
        config.archive.max_archive_size = max_archive_size;
        config.archive.compressor.zip_path = Some(temp.path().join("no-such-zip"));

        let scanner = FsScanner::new(&config.listing, DirectorySizeMode::Recursive).unwrap();
        let service = ArchiveService::with_parts(
            &config,
            Arc::new(scanner),
            Arc::new(FixedFreeSpace(free_space)),
        )
        .unwrap();
        Fixture {
            _temp: temp,
            root,
            scratch,
            service,
        }
    }

    fn scratch_is_empty(path: &Path) -> bool {
        std::fs::read_dir(path)
            .map(|mut d| d.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn locate_directory_accepts_nested_relative_paths() {
        let f = fixture(1024, u64::MAX);
        let dir = f.service.locate_directory("docs/sub").await.unwrap();
        assert_eq!(dir, std::fs::canonicalize(f.root.join("docs/sub")).unwrap());

        let root = f.service.locate_directory("").await.unwrap();
        assert_eq!(root, std::fs::canonicalize(&f.root).unwrap());
        assert_eq!(f.service.locate_directory("/docs").await.unwrap(), dir.parent().unwrap());
    }

    #[tokio::test]
    async fn locate_directory_rejects_traversal() {
        let f = fixture(1024, u64::MAX);
        for bad in ["..", "docs/../..", "docs/../../etc"] {
            assert!(
                matches!(f.service.locate_directory(bad).await, Err(Error::InvalidPath(_))),
                "{bad:?} accepted"
            );
        }
        assert!(matches!(
            f.service.locate_directory("docs/a.txt").await,
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            f.service.locate_directory("missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn locate_directory_rejects_symlink_escape() {
        let f = fixture(1024, u64::MAX);
        let outside = f.root.parent().unwrap().join("outside");
        std::fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, f.root.join("escape")).unwrap();

        assert!(matches!(
            f.service.locate_directory("escape").await,
            Err(Error::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn quota_rejection_happens_before_any_job_exists() {
        let f = fixture(50, u64::MAX);
        let dir = f.service.locate_directory("docs").await.unwrap();

        let result = f.service.start(&dir, &ArchiveRequest::all()).await;
        assert!(matches!(result, Err(Error::QuotaExceeded { .. })));
        assert!(scratch_is_empty(&f.scratch));
    }

    #[tokio::test]
    async fn empty_selection_is_rejected_before_launch() {
        let f = fixture(1024, u64::MAX);
        let dir = f.service.locate_directory("docs").await.unwrap();

        let result = f
            .service
            .start(&dir, &ArchiveRequest::subset(["../../etc/passwd"]))
            .await;
        assert!(matches!(result, Err(Error::InvalidSelection(_))));
        assert!(scratch_is_empty(&f.scratch));
    }

    #[tokio::test]
    async fn launch_failure_leaves_no_files() {
        let f = fixture(1024, u64::MAX);
        let dir = f.service.locate_directory("docs").await.unwrap();

        let result = f.service.start(&dir, &ArchiveRequest::all()).await;
        assert!(matches!(result, Err(Error::LaunchFailed(_))));
        assert!(scratch_is_empty(&f.scratch));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.listing.root_dir = temp.path().to_path_buf();
        config.archive.scratch_dir = temp.path().join("scratch");
        config.archive.artifact_prefix = String::new();

        // An empty prefix would let the janitor claim every file in scratch
        match ArchiveService::new(&config) {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("archive.artifact_prefix"));
            }
            other => panic!("expected a config error, got {other:?}"),
        }

        config.archive.artifact_prefix = "../x".to_string();
        assert!(matches!(
            ArchiveService::new(&config),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn missing_root_is_rejected_at_construction() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.listing.root_dir = temp.path().join("gone");
        config.archive.scratch_dir = temp.path().join("scratch");

        assert!(matches!(
            ArchiveService::new(&config),
            Err(Error::DirectoryNotAccessible(_))
        ));
    }

    #[test]
    fn display_name_uses_sole_entry_or_directory_name() {
        let f = fixture(1024, u64::MAX);
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let docs = std::fs::canonicalize(f.root.join("docs")).unwrap();

        let one = ResolvedFileSet::from_entries(vec![DirectoryEntry::file("my report.pdf", 1)]);
        assert_eq!(
            f.service.display_name(&docs, &one, now),
            "my_report_pdf_download_20240309-140507.zip"
        );

        let two = ResolvedFileSet::from_entries(vec![
            DirectoryEntry::file("a.txt", 1),
            DirectoryEntry::directory("sub", 0),
        ]);
        assert_eq!(
            f.service.display_name(&docs, &two, now),
            "docs_download_20240309-140507.zip"
        );

        let root = std::fs::canonicalize(&f.root).unwrap();
        assert_eq!(
            f.service.display_name(&root, &two, now),
            "home_download_20240309-140507.zip"
        );
    }
}
