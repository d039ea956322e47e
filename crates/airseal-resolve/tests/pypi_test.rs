use std::time::Duration;

use airseal_resolve::{IndexError, PackageIndex, PypiIndex};
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

/// Serve `router` on a loopback port and return its base URL.
async fn spawn_index(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn project(Path(name): Path<String>) -> Response {
    match name.as_str() {
        "numpy" => Json(json!({
            "info": { "name": "numpy", "version": "2.1.3" },
            "releases": {}
        }))
        .into_response(),
        "pyyaml" => Json(json!({
            "info": { "name": "PyYAML", "version": "6.0.2" }
        }))
        .into_response(),
        "noversion" => Json(json!({
            "info": { "name": "noversion", "version": "" }
        }))
        .into_response(),
        "broken" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "flaky" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::NOT_FOUND.into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn index(timeout: Duration) -> PypiIndex {
    let base = spawn_index(Router::new().route("/pypi/{name}/json", get(project))).await;
    PypiIndex::new(&base, timeout).unwrap()
}

#[tokio::test]
async fn found_package_returns_name_and_version() {
    let index = index(Duration::from_secs(5)).await;

    let info = index.lookup("numpy").await.unwrap();

    assert_eq!(info.name, "numpy");
    assert_eq!(info.version.as_deref(), Some("2.1.3"));
}

#[tokio::test]
async fn canonical_name_comes_from_index() {
    let index = index(Duration::from_secs(5)).await;

    let info = index.lookup("pyyaml").await.unwrap();

    assert_eq!(info.name, "PyYAML");
}

#[tokio::test]
async fn empty_version_is_none() {
    let index = index(Duration::from_secs(5)).await;

    let info = index.lookup("noversion").await.unwrap();

    assert_eq!(info.version, None);
}

#[tokio::test]
async fn missing_package_is_not_found() {
    let index = index(Duration::from_secs(5)).await;

    let err = index.lookup("totallyfakepkg123").await.unwrap_err();

    assert!(matches!(err, IndexError::NotFound { ref name } if name == "totallyfakepkg123"));
}

#[tokio::test]
async fn server_error_is_failed() {
    let index = index(Duration::from_secs(5)).await;

    let err = index.lookup("flaky").await.unwrap_err();

    match err {
        IndexError::Failed { detail, .. } => assert!(detail.contains("500"), "got: {detail}"),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_failed() {
    let index = index(Duration::from_secs(5)).await;

    let err = index.lookup("broken").await.unwrap_err();

    assert!(matches!(err, IndexError::Failed { .. }), "got: {err:?}");
}

#[tokio::test]
async fn slow_index_times_out() {
    let index = index(Duration::from_millis(200)).await;

    let err = index.lookup("slow").await.unwrap_err();

    assert!(matches!(err, IndexError::Timeout { .. }), "got: {err:?}");
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let base = spawn_index(Router::new().route("/pypi/{name}/json", get(project))).await;
    let index = PypiIndex::new(&format!("{base}/"), Duration::from_secs(5)).unwrap();

    let info = index.lookup("numpy").await.unwrap();

    assert_eq!(info.name, "numpy");
}

#[tokio::test]
async fn unreachable_index_is_failed() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let index = PypiIndex::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    let err = index.lookup("numpy").await.unwrap_err();

    assert!(matches!(err, IndexError::Failed { .. }), "got: {err:?}");
}
