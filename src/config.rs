//! Configuration types for dirindex

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Directory listing configuration (what the scanner shows)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Served root directory; every request path is resolved below it (default: ".")
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Shell-style patterns of names to hide, matched case-insensitively
    /// (Apache `IndexIgnore` semantics)
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Show entries matched by `ignore_patterns` anyway (default: false)
    #[serde(default)]
    pub show_hidden: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            ignore_patterns: default_ignore_patterns(),
            show_hidden: false,
        }
    }
}

/// How directory entries are weighed for quota purposes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectorySizeMode {
    /// Walk each directory and sum its files (default)
    #[default]
    Recursive,
    /// Count directories as zero bytes (cheap, undercounts quotas)
    Zero,
}

/// External compressor invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompressorConfig {
    /// Path to the zip executable (auto-detected if None)
    #[serde(default)]
    pub zip_path: Option<PathBuf>,

    /// Whether to search PATH for zip if `zip_path` is not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Compression level 0-9; low levels favour speed on the interactive path (default: 1)
    #[serde(default = "default_compression_level")]
    pub level: u8,

    /// Recurse into selected directories (default: true)
    #[serde(default = "default_true")]
    pub recursive: bool,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            zip_path: None,
            search_path: true,
            level: default_compression_level(),
            recursive: true,
        }
    }
}

/// Archive pipeline configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Maximum aggregate input size of one archive in bytes (default: 20 GiB)
    #[serde(default = "default_max_archive_size")]
    pub max_archive_size: u64,

    /// Scratch directory for artifacts and markers (default: OS temp dir)
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Filename prefix reserved for this subsystem inside `scratch_dir` (default: "dirindex_")
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,

    /// Age after which leftover artifacts are deleted (default: 24 hours)
    #[serde(default = "default_retention", with = "duration_serde")]
    pub retention: Duration,

    /// Progress poll cadence (default: 300 ms)
    #[serde(default = "default_poll_interval", with = "duration_millis_serde")]
    pub poll_interval: Duration,

    /// Safety timeout for a single job, measured from its start (default: 5 minutes)
    #[serde(default = "default_progress_timeout", with = "duration_serde")]
    pub progress_timeout: Duration,

    /// How directories are weighed for quota checks
    #[serde(default)]
    pub directory_sizes: DirectorySizeMode,

    /// External compressor settings
    #[serde(default)]
    pub compressor: CompressorConfig,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_archive_size: default_max_archive_size(),
            scratch_dir: default_scratch_dir(),
            artifact_prefix: default_artifact_prefix(),
            retention: default_retention(),
            poll_interval: default_poll_interval(),
            progress_timeout: default_progress_timeout(),
            directory_sizes: DirectorySizeMode::default(),
            compressor: CompressorConfig::default(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Optional API key required in the `X-Api-Key` header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// External access configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Main configuration for dirindex
///
/// Every field has a default, so `{}` deserializes to a working configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory listing settings
    #[serde(default)]
    pub listing: ListingConfig,

    /// Archive pipeline settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// API server settings
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let archive = &self.archive;

        if archive.compressor.level > 9 {
            return Err(config_error(
                format!(
                    "compression level must be 0-9, got {}",
                    archive.compressor.level
                ),
                "archive.compressor.level",
            ));
        }

        if archive.artifact_prefix.is_empty()
            || archive
                .artifact_prefix
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        {
            return Err(config_error(
                "artifact prefix must be non-empty and contain only [A-Za-z0-9_-]",
                "archive.artifact_prefix",
            ));
        }

        if archive.poll_interval.is_zero() {
            return Err(config_error(
                "poll interval must be greater than zero",
                "archive.poll_interval",
            ));
        }

        if archive.max_archive_size == 0 {
            return Err(config_error(
                "maximum archive size must be greater than zero",
                "archive.max_archive_size",
            ));
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

// Default value functions
fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        ".htaccess".into(),
        ".git".into(),
        ".DS_Store".into(),
        "index.php".into(),
        "*.log".into(),
        "node_modules".into(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_compression_level() -> u8 {
    1
}

fn default_max_archive_size() -> u64 {
    20 * 1024 * 1024 * 1024 // 20 GB
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_artifact_prefix() -> String {
    "dirindex_".to_string()
}

fn default_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(300)
}

fn default_progress_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
