//! Helpers for inspecting archives and the scratch directory

use dirindex::archive::Artifact;
use futures::StreamExt;
use std::io::Cursor;
use std::path::Path;

/// Drain a claimed artifact into memory, dropping its claim afterwards
pub async fn read_artifact(artifact: Artifact) -> Vec<u8> {
    let mut stream = Box::pin(artifact.into_stream());
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.expect("Failed to read artifact chunk"));
    }
    body
}

/// Names of the entries inside a zip archive, sorted
pub fn zip_entry_names(bytes: Vec<u8>) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("Not a valid zip archive");
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

/// File names currently in `dir`, sorted (empty if it does not exist)
pub fn scratch_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
