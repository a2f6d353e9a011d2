//! Test helpers for gateway integration tests.
//!
//! - A gateway config pointed at an arbitrary upstream port
//! - A fixed token validator and credential provider
//! - A shell script standing in for the embedded server binary

use gateway_core::config::GatewayConfig;
use gateway_core::credentials::{
    CallerCredentials, ClusterCredential, CredentialBundle, CredentialProvider,
    StaticTokenValidator, TokenValidator,
};
use gateway_core::error::CredentialError;
use gateway_core::gateway::{GatewayState, build_router};
use gateway_core::materialize::ConfigMaterializer;
use gateway_core::supervisor::{LaunchSpec, ProcessSupervisor};

use common::RedactedToken;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use tempfile::TempDir;

pub const TEST_TOKEN: &str = "test-gateway-token";
pub const TEST_PRINCIPAL: &str = "user:default/tester";
pub const CLUSTER_TOKEN: &str = "cluster-token-abc";

/// Provider returning one fixed cluster, or failing every lookup.
pub struct FixedProvider {
    fail: bool,
}

impl FixedProvider {
    pub fn ok() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl CredentialProvider for FixedProvider {
    async fn identity_token(&self) -> Result<RedactedToken, CredentialError> {
        Ok(RedactedToken::new("identity-token"))
    }

    async fn credential_bundle(
        &self,
        _caller: &CallerCredentials,
    ) -> Result<CredentialBundle, CredentialError> {
        if self.fail {
            return Err(CredentialError::lookup("provider offline"));
        }

        Ok(CredentialBundle::new().with_cluster(
            "main",
            ClusterCredential::new(
                "https://main.example.com:6443",
                RedactedToken::new(CLUSTER_TOKEN),
            ),
        ))
    }
}

/// Everything one gateway under test needs, kept alive together.
pub struct TestGateway {
    pub dir: TempDir,
    pub config: GatewayConfig,
    pub state: GatewayState,
}

impl TestGateway {
    pub fn router(&self) -> Router {
        build_router(&self.config, self.state.clone()).expect("Failed to build router")
    }

    pub fn kubeconfig_path(&self) -> PathBuf {
        self.config.embedded.kubeconfig_path.clone()
    }
}

/// Config for a gateway on an ephemeral port proxying to `upstream_port`.
pub fn test_config(dir: &Path, upstream_port: u16, binary: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.listen_address = "127.0.0.1".to_string();
    config.server.listen_port = 0;
    config.server.frame_ancestors = vec!["http://localhost:3000".to_string()];
    config.embedded.port = upstream_port;
    config.embedded.binary_path = binary.to_string();
    config.embedded.kubeconfig_path = dir.join("kubeconfig.yaml");
    config.embedded.plugins_dir = dir.join("plugins");
    config
}

pub fn gateway_with(
    upstream_port: u16,
    binary: Option<&str>,
    provider: FixedProvider,
) -> TestGateway {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let binary = binary.unwrap_or("/nonexistent/headlamp-server").to_string();
    let config = test_config(dir.path(), upstream_port, &binary);

    let supervisor = Arc::new(ProcessSupervisor::new(
        LaunchSpec::from_config(&config.embedded),
        ConfigMaterializer::new(&config.embedded.kubeconfig_path),
    ));
    let validator: Arc<dyn TokenValidator> =
        Arc::new(StaticTokenValidator::new().with_token(TEST_PRINCIPAL, TEST_TOKEN));
    let provider: Arc<dyn CredentialProvider> = Arc::new(provider);

    let state = GatewayState::new(&config, supervisor, validator, provider)
        .expect("Failed to build gateway state");

    TestGateway { dir, config, state }
}

/// Gateway whose upstream is `upstream_port` and whose binary is never spawned.
pub fn proxy_gateway(upstream_port: u16) -> TestGateway {
    gateway_with(upstream_port, None, FixedProvider::ok())
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

pub fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TEST_TOKEN}"))
}

pub fn empty(builder: axum::http::request::Builder) -> Request<Body> {
    builder.body(Body::empty()).expect("Failed to build request")
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

/// Shell script standing in for the embedded server; stays up until killed.
#[cfg(unix)]
pub fn fake_server_binary(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-headlamp-server");
    std::fs::write(
        &path,
        "#!/bin/sh\necho \"fake headlamp on $*\"\nexec sleep 30\n",
    )
    .expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path
}
