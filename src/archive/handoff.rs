//! Exactly-once artifact delivery
//!
//! A finished artifact is claimed by renaming it (see [`JobStore::claim`]),
//! streamed to one client, and deleted when the stream is dropped, whether
//! the transfer completed or not.

use crate::archive::store::JobStore;
use crate::error::Result;
use crate::utils::sanitize_file_name;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

const FALLBACK_NAME: &str = "archive.zip";

/// Deletes a claimed artifact when dropped
#[derive(Debug)]
pub struct ClaimGuard {
    path: PathBuf,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "removed served artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "failed to remove served artifact"),
        }
    }
}

/// A claimed artifact ready to be sent
#[derive(Debug)]
pub struct Artifact {
    file: File,
    /// Size in bytes
    pub len: u64,
    /// Sanitized attachment filename
    pub file_name: String,
    guard: ClaimGuard,
}

impl Artifact {
    /// Claim and open the artifact for `token`
    ///
    /// `requested_name` is the display name the client asks for; it is
    /// sanitized and forced to a `.zip` extension.
    pub async fn open(store: &JobStore, token: &str, requested_name: Option<&str>) -> Result<Self> {
        let claimed = store.claim(token).await?;
        let guard = ClaimGuard {
            path: claimed.clone(),
        };

        // On error the guard removes the claimed file
        let file = File::open(&claimed).await?;
        let len = file.metadata().await?.len();
        let file_name = attachment_name(requested_name);

        info!(job = %token, bytes = len, file_name = %file_name, "handing off archive");
        Ok(Self {
            file,
            len,
            file_name,
            guard,
        })
    }

    /// Stream the artifact's bytes; the file is deleted once the stream is dropped
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
        let guard = self.guard;
        ReaderStream::new(self.file).map(move |chunk| {
            let _claim = &guard;
            chunk
        })
    }
}

/// Sanitized download filename with a `.zip` extension
pub fn attachment_name(requested: Option<&str>) -> String {
    let name = requested
        .map(sanitize_file_name)
        .filter(|n| !n.trim_matches('_').is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    if name.to_ascii_lowercase().ends_with(".zip") {
        name
    } else {
        format!("{}.zip", name)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{DirectoryEntry, ResolvedFileSet};
    use tempfile::TempDir;

    async fn finished_job(store: &JobStore, contents: &[u8]) -> String {
        let set = ResolvedFileSet::from_entries(vec![DirectoryEntry::file("a.txt", 1)]);
        let job = store.create("x.zip".into(), &set).await.unwrap();
        std::fs::write(&job.artifact_path, contents).unwrap();
        job.id
    }

    async fn read_all(artifact: Artifact) -> Vec<u8> {
        let mut stream = Box::pin(artifact.into_stream());
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[test]
    fn attachment_name_is_sanitized_with_zip_extension() {
        assert_eq!(attachment_name(Some("docs_download.zip")), "docs_download.zip");
        assert_eq!(attachment_name(Some("a\"b\r\n.zip")), "a_b__.zip");
        assert_eq!(attachment_name(Some("report")), "report.zip");
        assert_eq!(attachment_name(Some("../../x.zip")), "_._.._x.zip");
        assert_eq!(attachment_name(Some("")), "archive.zip");
        assert_eq!(attachment_name(None), "archive.zip");
    }

    #[tokio::test]
    async fn artifact_is_served_once_then_deleted() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path(), "dirindex_");
        let token = finished_job(&store, b"PK\x03\x04 archive").await;

        let artifact = Artifact::open(&store, &token, Some("x.zip")).await.unwrap();
        assert_eq!(artifact.len, 12);
        assert_eq!(read_all(artifact).await, b"PK\x03\x04 archive");

        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        assert!(matches!(
            Artifact::open(&store, &token, None).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn dropping_unread_artifact_still_deletes_it() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path(), "dirindex_");
        let token = finished_job(&store, b"PK").await;

        let artifact = Artifact::open(&store, &token, None).await.unwrap();
        let stream = artifact.into_stream();
        drop(stream);

        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn tokens_with_separators_are_rejected() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path(), "dirindex_");

        for token in ["../etc/passwd", "a/b", "..\\x", "secret"] {
            assert!(matches!(
                Artifact::open(&store, token, None).await,
                Err(Error::InvalidPath(_))
            ));
        }
    }
}
