use crate::gateway_tests::helpers::{
    CLUSTER_TOKEN, FixedProvider, authed, body_json, closed_port, empty, gateway_with,
    proxy_gateway,
};

use gateway_core::supervisor::ProcessState;

use axum::http::StatusCode;
use tower::ServiceExt;

/// **VALUE**: Verifies `/start` spawns once and later calls only refresh the kubeconfig.
///
/// **WHY THIS MATTERS**: Every tab of the host app calls `/start` on mount; only the first may
/// spawn, and every caller's credentials must land in the kubeconfig.
///
/// **BUG THIS CATCHES**: Would catch a second spawn on the fixed port, or the wrong message
/// telling the UI to wait for a boot that never happens.
#[cfg(unix)]
#[tokio::test]
async fn given_fake_binary_when_start_called_twice_then_spawns_once() {
    use crate::gateway_tests::helpers::fake_server_binary;

    // GIVEN
    let bin_dir = tempfile::TempDir::new().expect("temp dir");
    let binary = fake_server_binary(bin_dir.path());
    let gateway = gateway_with(
        closed_port().await,
        Some(&binary.display().to_string()),
        FixedProvider::ok(),
    );

    // WHEN
    let first = gateway
        .router()
        .oneshot(empty(authed("POST", "/start")))
        .await
        .expect("request");
    let first_status = first.status();
    let first_body = body_json(first).await;

    let second = gateway
        .router()
        .oneshot(empty(authed("POST", "/start")))
        .await
        .expect("request");
    let second_status = second.status();
    let second_body = body_json(second).await;

    // THEN
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(first_body["message"], "Headlamp Server started");
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(second_body["message"], "Headlamp Server kubeconfig refreshed");

    let supervisor = gateway.state.supervisor();
    assert_eq!(supervisor.spawn_count(), 1);
    assert_eq!(supervisor.state(), ProcessState::Running);

    let kubeconfig = std::fs::read_to_string(gateway.kubeconfig_path()).expect("kubeconfig");
    assert!(kubeconfig.contains(CLUSTER_TOKEN));

    let health = gateway
        .router()
        .oneshot(empty(axum::http::Request::builder().uri("/health")))
        .await
        .expect("request");
    assert_eq!(body_json(health).await["running"], true);

    supervisor.shutdown().await;
}

/// **VALUE**: Verifies a spawn failure is a 500 with a generic message and a retryable state.
///
/// **BUG THIS CATCHES**: Would catch internal paths or OS errors leaking into the response body.
#[tokio::test]
async fn given_missing_binary_when_start_called_then_500_spawn_failure() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(authed("POST", "/start")))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Error starting Headlamp Server");
    assert_eq!(body["error"], "spawn_failure");
    assert_eq!(gateway.state.supervisor().state(), ProcessState::Failed);
}

/// **VALUE**: Verifies a credential lookup failure aborts `/start` before anything is written.
///
/// **BUG THIS CATCHES**: Would catch the supervisor being called with an empty bundle.
#[tokio::test]
async fn given_provider_failure_when_start_called_then_500_credential_failure() {
    // GIVEN
    let gateway = gateway_with(closed_port().await, None, FixedProvider::failing());

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(authed("POST", "/start")))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "credential_failure");
    assert!(!gateway.kubeconfig_path().exists());
    assert_eq!(gateway.state.supervisor().spawn_count(), 0);
}

/// **VALUE**: Verifies `/refreshKubeconfig` rewrites the file without starting anything.
///
/// **BUG THIS CATCHES**: Would catch refresh being routed through `start`, which would spawn the
/// server as a side effect.
#[tokio::test]
async fn given_not_started_when_refresh_called_then_file_written_without_spawn() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(authed("POST", "/refreshKubeconfig")))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "status": "ok" })
    );
    let kubeconfig = std::fs::read_to_string(gateway.kubeconfig_path()).expect("kubeconfig");
    assert!(kubeconfig.contains("server: https://main.example.com:6443"));
    assert_eq!(gateway.state.supervisor().spawn_count(), 0);
}

/// **VALUE**: Verifies a refresh failure returns the documented 500 message.
///
/// **BUG THIS CATCHES**: Would catch a provider error being reported as success.
#[tokio::test]
async fn given_provider_failure_when_refresh_called_then_500() {
    // GIVEN
    let gateway = gateway_with(closed_port().await, None, FixedProvider::failing());

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(authed("POST", "/refreshKubeconfig")))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["message"],
        "Error refreshing kubeconfig"
    );
}

/// **VALUE**: Verifies `/fetchKubeconfig` returns the document without writing it.
///
/// **BUG THIS CATCHES**: Would catch fetch replacing the running server's kubeconfig with the
/// caller's.
#[tokio::test]
async fn given_authenticated_when_fetch_called_then_document_returned_not_written() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(authed("POST", "/fetchKubeconfig")))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let document = body["kubeconfig"].as_str().expect("kubeconfig string");
    assert!(document.contains("apiVersion: v1"));
    assert!(document.contains(CLUSTER_TOKEN));
    assert!(!gateway.kubeconfig_path().exists());
}
