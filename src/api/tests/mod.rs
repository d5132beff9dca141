use super::*;
use crate::archive::quota::tests::FixedFreeSpace;
use crate::config::DirectorySizeMode;
use crate::scanner::FsScanner;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

mod system;

/// A served root with `a.txt` (100 bytes) and `sub/b.txt` (20 bytes)
struct TestServer {
    temp: TempDir,
    config: Config,
}

impl TestServer {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("a.txt"), vec![b'a'; 100]).unwrap();
        std::fs::write(root.join("sub/b.txt"), vec![b'b'; 20]).unwrap();

        let mut config = Config::default();
        config.listing.root_dir = root;
        config.archive.scratch_dir = temp.path().join("scratch");
        config.archive.poll_interval = Duration::from_millis(20);
        config.archive.progress_timeout = Duration::from_secs(10);
        config.archive.compressor.zip_path = Some(temp.path().join("no-such-zip"));
        config.server.api.swagger_ui = false;

        Self { temp, config }
    }

    fn root(&self) -> &Path {
        &self.config.listing.root_dir
    }

    fn scratch(&self) -> PathBuf {
        self.config.archive.scratch_dir.clone()
    }

    /// Install a shell script as the compressor
    #[cfg(unix)]
    fn with_fake_zip(mut self, body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let path = self.temp.path().join("fake-zip");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        self.config.archive.compressor.zip_path = Some(path);
        self
    }

    /// Fake compressor that writes a small archive-like file and succeeds
    #[cfg(unix)]
    fn with_working_zip(self) -> Self {
        self.with_fake_zip(r"printf 'PK\003\004fake'")
    }

    fn router_with_free_space(&self, free_space: u64) -> Router {
        let scanner = FsScanner::new(&self.config.listing, DirectorySizeMode::Recursive).unwrap();
        let service = ArchiveService::with_parts(
            &self.config,
            Arc::new(scanner),
            Arc::new(FixedFreeSpace(free_space)),
        )
        .unwrap();
        create_router(Arc::new(service), Arc::new(self.config.clone()))
    }

    fn router(&self) -> Router {
        self.router_with_free_space(u64::MAX)
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch())
            .map(|mut d| d.next().is_none())
            .unwrap_or(true)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn server_starts_and_stops_on_shutdown_signal() {
    let server = TestServer::new();
    let mut config = server.config.clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let service = Arc::new(ArchiveService::new(&config).unwrap());

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(serve_with_shutdown(service, Arc::new(config), async {
        rx.await.ok();
    }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn cors_headers_are_added_when_enabled() {
    let mut server = TestServer::new();
    server.config.server.api.cors_enabled = true;
    server.config.server.api.cors_origins = vec!["*".to_string()];

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn api_key_guards_every_route() {
    let mut server = TestServer::new();
    server.config.server.api.api_key = Some("secret".to_string());
    let app = server.router();

    let response = app.clone().oneshot(get("/api/v1/list")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/list")
        .header("X-Api-Key", "secret")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let token = "0123456789abcdef0123456789abcdef";
    let response = app
        .oneshot(get(&format!("/api/v1/download/{token}?api_key=secret")))
        .await
        .unwrap();
    // Authorized, but there is no such archive
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let server = TestServer::new();
    let response = server.router().oneshot(get("/downloads")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
