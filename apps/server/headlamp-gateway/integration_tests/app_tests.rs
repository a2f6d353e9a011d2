use headlamp_gateway::app::{App, load_config};

use gateway_core::config::GatewayConfig;
use gateway_core::credentials::{
    CredentialProvider, EnvCredentialProvider, StaticTokenValidator, TokenValidator,
};
use gateway_core::error::CoreError;
use gateway_core::supervisor::ProcessState;

use std::sync::Arc;

use serde_json::Value;
use serial_test::serial;
use tempfile::TempDir;

const TOKEN: &str = "app-test-token";

async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    listener.local_addr().expect("local addr").port()
}

async fn test_config(dir: &TempDir) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.listen_port = 0;
    config.embedded.port = closed_port().await;
    config.embedded.binary_path = dir.path().join("missing-binary").display().to_string();
    config.embedded.kubeconfig_path = dir.path().join("kubeconfig.yaml");
    config.embedded.plugins_dir = dir.path().join("plugins");
    config
}

async fn start_app(config: GatewayConfig) -> App {
    let validator: Arc<dyn TokenValidator> =
        Arc::new(StaticTokenValidator::new().with_token("user:default/app", TOKEN));
    let provider: Arc<dyn CredentialProvider> =
        Arc::new(EnvCredentialProvider::new(config.clusters.clone()));

    App::start_with(config, validator, provider)
        .await
        .expect("Failed to start app")
}

/// **VALUE**: Verifies the assembled binary serves health and enforces auth over real TCP.
///
/// **WHY THIS MATTERS**: This is the wiring the binary runs; unit tests of each piece would
/// not notice the validator or supervisor being wired to the wrong slot.
///
/// **BUG THIS CATCHES**: Would catch `/health` requiring a token, `/start` being open to anonymous
/// callers, or shutdown hanging on the listener.
#[tokio::test]
async fn given_started_app_when_called_over_tcp_then_health_open_and_start_guarded() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let app = start_app(test_config(&dir).await).await;
    let client = reqwest::Client::new();

    // WHEN
    let health = client
        .get(format!("{}/health", app.base_url()))
        .send()
        .await
        .expect("health request");
    let health_status = health.status();
    let health_body: Value = health.json().await.expect("health json");

    let anonymous = client
        .post(format!("{}/start", app.base_url()))
        .send()
        .await
        .expect("start request");

    // THEN
    assert_eq!(health_status, 200);
    assert_eq!(health_body["status"], "ok");
    assert_eq!(health_body["running"], false);
    assert_eq!(health_body["state"], "not_started");
    assert_eq!(anonymous.status(), 401);
    assert_eq!(app.supervisor().spawn_count(), 0);

    app.shutdown().await.expect("Failed to shut down");
}

/// **VALUE**: Verifies an authenticated `/start` with no clusters fails cleanly and leaves the
/// supervisor retryable.
///
/// **BUG THIS CATCHES**: Would catch an empty environment crashing the binary instead of
/// answering 500.
#[tokio::test]
async fn given_no_clusters_when_start_called_then_500_and_not_started() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let app = start_app(test_config(&dir).await).await;

    // WHEN
    let response = reqwest::Client::new()
        .post(format!("{}/start", app.base_url()))
        .bearer_auth(TOKEN)
        .send()
        .await
        .expect("start request");

    // THEN
    assert_eq!(response.status(), 500);
    assert_eq!(app.supervisor().state(), ProcessState::NotStarted);
    assert!(!dir.path().join("kubeconfig.yaml").exists());

    app.shutdown().await.expect("Failed to shut down");
}

/// **VALUE**: Verifies the binary path env override is applied on top of the file.
///
/// **BUG THIS CATCHES**: Would catch `load_config` skipping `apply_env_overrides`.
#[test]
#[serial]
fn given_binary_override_when_loading_then_env_wins() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("gateway.json"),
        r#"{"embedded":{"binary_path":"/opt/from-file"}}"#,
    )
    .expect("write config");
    unsafe { std::env::set_var("HEADLAMP_BINARY_PATH", "/opt/from-env") };

    // WHEN
    let result = load_config(dir.path());
    unsafe { std::env::remove_var("HEADLAMP_BINARY_PATH") };

    // THEN
    let config = result.expect("config");
    assert_eq!(config.embedded.binary_path, "/opt/from-env");
}

/// **VALUE**: Verifies a corrupt config file stops startup instead of silently using defaults.
///
/// **BUG THIS CATCHES**: Would catch a typo in `gateway.json` quietly exposing the default port.
#[test]
#[serial]
fn given_corrupt_config_when_loading_then_config_error() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("gateway.json"), "{ not json").expect("write config");

    // WHEN
    let result = load_config(dir.path());

    // THEN
    assert!(matches!(result, Err(CoreError::Config(_))));
}
