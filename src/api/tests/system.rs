use super::*;

#[tokio::test]
async fn health_reports_version_and_compressor_availability() {
    let server = TestServer::new();
    let response = server.router().oneshot(get("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    // An explicit zip_path is trusted until launch
    assert_eq!(json["archives_available"], true);
    assert_eq!(
        json["max_archive_size"],
        server.config.archive.max_archive_size
    );
    assert_eq!(json["api_key_required"], false);
}

#[tokio::test]
async fn openapi_endpoint_serves_the_spec() {
    let server = TestServer::new();
    let response = server
        .router()
        .oneshot(get("/api/v1/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["openapi"].as_str().unwrap().starts_with("3."));
    assert!(json["paths"]["/api/v1/archive"]["post"].is_object());
    assert!(json["paths"]["/api/v1/download/{token}"]["get"].is_object());
}

#[tokio::test]
async fn swagger_ui_is_only_mounted_when_enabled() {
    let mut server = TestServer::new();
    let response = server
        .router()
        .oneshot(get("/swagger-ui/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.config.server.api.swagger_ui = true;
    let response = server
        .router()
        .oneshot(get("/swagger-ui"))
        .await
        .unwrap();
    // Either the page itself or a redirect to the trailing-slash path
    assert_ne!(response.status(), StatusCode::NOT_FOUND);
}
