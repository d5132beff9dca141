//! Served trees, fake compressors and disk probes

use dirindex::archive::FreeSpaceProbe;
use dirindex::{ArchiveService, Config, DirectorySizeMode, FsScanner};
use rand::RngCore;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Fake compressor body that writes a small archive-like file and succeeds
pub const WORKING_ZIP: &str = r"printf 'PK\003\004fake'";

/// Fake compressor body that writes a partial archive and never finishes
pub const STALLED_ZIP: &str = "printf 'PK'\nexec sleep 30";

/// Size of the incompressible input used to keep a real `zip` busy
pub const BIG_FILE_LEN: usize = 96 << 20;

/// Write `len` random (incompressible) bytes to `path`
pub fn write_random_file(path: &Path, len: usize) {
    let mut file = std::fs::File::create(path).expect("Failed to create input file");
    let mut chunk = vec![0u8; 1 << 20];
    let mut rng = rand::thread_rng();
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(chunk.len());
        rng.fill_bytes(&mut chunk[..n]);
        file.write_all(&chunk[..n]).unwrap();
        remaining -= n;
    }
}

/// Free-space probe reporting a fixed number of bytes
pub struct FixedFreeSpace(pub u64);

impl FreeSpaceProbe for FixedFreeSpace {
    fn available_space(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.0)
    }
}

/// A served root with `a.txt` (100 bytes), `sub/b.txt` (20 bytes) and
/// `sub/deeper/c.txt` (5 bytes), plus an empty scratch directory
pub struct TestTree {
    pub temp: TempDir,
    pub config: Config,
}

impl TestTree {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().join("root");
        std::fs::create_dir_all(root.join("sub/deeper")).unwrap();
        std::fs::write(root.join("a.txt"), vec![b'a'; 100]).unwrap();
        std::fs::write(root.join("sub/b.txt"), vec![b'b'; 20]).unwrap();
        std::fs::write(root.join("sub/deeper/c.txt"), vec![b'c'; 5]).unwrap();

        let mut config = Config::default();
        config.listing.root_dir = root;
        config.archive.scratch_dir = temp.path().join("scratch");
        config.archive.poll_interval = Duration::from_millis(20);
        config.archive.progress_timeout = Duration::from_secs(20);
        config.archive.compressor.zip_path = Some(temp.path().join("no-such-zip"));

        Self { temp, config }
    }

    pub fn root(&self) -> &Path {
        &self.config.listing.root_dir
    }

    pub fn scratch(&self) -> PathBuf {
        self.config.archive.scratch_dir.clone()
    }

    /// Use whatever `zip` is on PATH
    pub fn with_system_zip(mut self) -> Self {
        self.config.archive.compressor.zip_path = None;
        self.config.archive.compressor.search_path = true;
        self
    }

    /// Install a shell script as the compressor
    #[cfg(unix)]
    pub fn with_fake_zip(mut self, body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let path = self.temp.path().join("fake-zip");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        self.config.archive.compressor.zip_path = Some(path);
        self
    }

    /// Service over this tree with a fixed amount of scratch space
    pub fn service_with_free_space(&self, free_space: u64) -> ArchiveService {
        let scanner = FsScanner::new(&self.config.listing, DirectorySizeMode::Recursive).unwrap();
        ArchiveService::with_parts(
            &self.config,
            Arc::new(scanner),
            Arc::new(FixedFreeSpace(free_space)),
        )
        .expect("Failed to build archive service")
    }

    pub fn service(&self) -> ArchiveService {
        self.service_with_free_space(u64::MAX)
    }
}
