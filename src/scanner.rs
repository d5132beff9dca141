//! Authoritative directory scans
//!
//! The archive pipeline never trusts client-supplied names: it authorizes
//! them against a [`DirectoryScanner`] listing of the current directory.
//! [`FsScanner`] is the filesystem-backed implementation, applying
//! Apache-style ignore patterns and optionally weighing directories by
//! their recursive size.

use crate::config::{DirectorySizeMode, ListingConfig};
use crate::error::{Error, Result};
use crate::types::DirectoryEntry;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::path::Path;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Source of truth for what a directory contains
#[async_trait]
pub trait DirectoryScanner: Send + Sync {
    /// List one directory level, already filtered by visibility rules
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirectoryEntry>>;
}

/// Case-insensitive shell-glob matcher for ignore patterns
#[derive(Clone, Debug)]
pub struct IgnoreMatcher {
    patterns: Vec<Regex>,
}

impl IgnoreMatcher {
    /// Compile a list of shell-style patterns (`*`, `?`, `[...]`)
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(&glob_to_regex(pattern))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Config {
                        message: format!("invalid ignore pattern {:?}: {}", pattern, e),
                        key: Some("listing.ignore_patterns".to_string()),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// True if `name` matches any pattern
    pub fn is_ignored(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }
}

/// Translate a shell glob into an anchored regex
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');

    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                // Character class: copy through to the closing bracket
                match chars[i + 1..].iter().position(|&c| c == ']') {
                    Some(offset) if offset > 0 => {
                        let class = &chars[i + 1..i + 1 + offset];
                        out.push('[');
                        for (j, &c) in class.iter().enumerate() {
                            match c {
                                '!' if j == 0 => out.push('^'),
                                '\\' | '[' | '&' | '~' => {
                                    out.push('\\');
                                    out.push(c);
                                }
                                _ => out.push(c),
                            }
                        }
                        out.push(']');
                        i += offset + 1;
                    }
                    _ => out.push_str(r"\["),
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

/// Filesystem-backed scanner
#[derive(Clone, Debug)]
pub struct FsScanner {
    ignore: IgnoreMatcher,
    show_hidden: bool,
    directory_sizes: DirectorySizeMode,
}

impl FsScanner {
    /// Build a scanner from listing settings
    pub fn new(listing: &ListingConfig, directory_sizes: DirectorySizeMode) -> Result<Self> {
        Ok(Self {
            ignore: IgnoreMatcher::new(&listing.ignore_patterns)?,
            show_hidden: listing.show_hidden,
            directory_sizes,
        })
    }
}

#[async_trait]
impl DirectoryScanner for FsScanner {
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirectoryEntry>> {
        use tokio::fs;

        let mut dir = fs::read_dir(path).await.map_err(|e| {
            Error::DirectoryNotAccessible(format!("{}: {}", path.display(), e))
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = ?entry.path(), "skipping entry with non-UTF-8 name");
                continue;
            };

            if !self.show_hidden && self.ignore.is_ignored(&name) {
                continue;
            }

            let entry_path = entry.path();
            let is_link = entry
                .file_type()
                .await
                .map(|ft| ft.is_symlink())
                .unwrap_or(false);

            // Follow symlinks; a failing target means the link is broken
            let metadata = match fs::metadata(&entry_path).await {
                Ok(m) => m,
                Err(e) => {
                    if !is_link {
                        debug!(path = ?entry_path, error = %e, "entry vanished during scan");
                    }
                    entries.push(DirectoryEntry {
                        name,
                        size_bytes: 0,
                        is_directory: false,
                        exists: false,
                    });
                    continue;
                }
            };

            let size_bytes = if metadata.is_dir() {
                match self.directory_sizes {
                    DirectorySizeMode::Zero => 0,
                    DirectorySizeMode::Recursive => {
                        let dir_path = entry_path.clone();
                        spawn_blocking(move || recursive_size(&dir_path))
                            .await
                            .map_err(|e| Error::Io(std::io::Error::other(e)))?
                    }
                }
            } else {
                metadata.len()
            };

            entries.push(DirectoryEntry {
                name,
                size_bytes,
                is_directory: metadata.is_dir(),
                exists: true,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(path = ?path, count = entries.len(), "scanned directory");
        Ok(entries)
    }
}

/// Sum of file sizes below `path`, not following symlinks
fn recursive_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .fold(0u64, |acc, m| acc.saturating_add(m.len()))
}
