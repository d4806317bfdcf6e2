use axum::http::StatusCode;
use duespool::api::{self, AppState};
use duespool::config::Config;
use duespool::db::init_db;
use duespool::{MockDirectory, MockProcessor, Repository};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        processor_api_url: "http://example.invalid".to_string(),
        processor_api_key: "sk_test".to_string(),
        webhook_secret: "whsec_test".to_string(),
        webhook_tolerance_secs: 300,
        checkout_return_url: "http://example.invalid/done".to_string(),
        directory_api_url: "http://example.invalid".to_string(),
        http_retry_max: Duration::from_secs(0),
    };

    let directory = Arc::new(MockDirectory::new().with_admin("g1", "admin"));
    let processor = Arc::new(MockProcessor::new());
    let state = AppState::new(repo, config, directory, processor);

    (api::create_router(state), temp_dir)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    actor: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header("X-Actor-Id", actor);
    }
    let request = builder.body(axum::body::Body::empty()).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _temp) = setup_test_app().await;

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint_checks_database() {
    let (app, _temp) = setup_test_app().await;

    let (status, json) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ready");
}

#[tokio::test]
async fn test_missing_actor_is_unauthorized() {
    let (app, _temp) = setup_test_app().await;
    let uri = format!("/v1/events/{}", duespool::EventId::generate());

    let (status, json) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_malformed_event_id_is_bad_request() {
    let (app, _temp) = setup_test_app().await;

    let (status, _) = send(&app, "GET", "/v1/events/not-a-uuid", Some("admin")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let (app, _temp) = setup_test_app().await;
    let uri = format!("/v1/events/{}/payouts", duespool::EventId::generate());

    let (status, json) = send(&app, "GET", &uri, Some("admin")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("event"));
}
