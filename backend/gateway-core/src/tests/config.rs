use crate::config::{ClusterConfig, GatewayConfig, PathRewrite};
use crate::error::config::ConfigError;
use crate::{DEFAULT_GATEWAY_PORT, DEFAULT_TOKEN_HEADER, EMBEDDED_BINARY, EMBEDDED_SERVER_PORT};

use serial_test::serial;
use tempfile::TempDir;

fn cluster(name: &str) -> ClusterConfig {
    ClusterConfig {
        name: name.to_string(),
        server: format!("https://{name}.example.com:6443"),
        token_env: format!("TOKEN_{}", name.to_uppercase()),
        certificate_authority_data: None,
        insecure_skip_tls_verify: false,
    }
}

/// **VALUE**: Verifies the default config is valid and points at the embedded server defaults.
///
/// **WHY THIS MATTERS**: A fresh install has no gateway.json. If defaults fail validation the
/// binary refuses to start on first run.
///
/// **BUG THIS CATCHES**: Would catch a default port collision or a renamed default constant.
#[test]
fn given_default_config_when_validated_then_passes_with_expected_values() {
    // GIVEN: The default config
    let config = GatewayConfig::default();

    // WHEN: Validating
    let result = config.validate();

    // THEN: Valid, with the documented defaults
    assert!(result.is_ok(), "Defaults should validate: {result:?}");
    assert_eq!(config.server.listen_port, DEFAULT_GATEWAY_PORT);
    assert_eq!(config.embedded.port, EMBEDDED_SERVER_PORT);
    assert_eq!(config.embedded.binary_path, EMBEDDED_BINARY);
    assert_eq!(config.proxy.token_header, DEFAULT_TOKEN_HEADER);
    assert_eq!(config.proxy.path_rewrite, PathRewrite::PassThrough);
    assert!(config.proxy.static_paths.contains(&"/assets/".to_string()));
}

/// **VALUE**: Verifies a missing config file yields defaults instead of an error.
///
/// **BUG THIS CATCHES**: Would catch `load` treating NotFound as a read failure.
#[test]
fn given_empty_dir_when_load_called_then_returns_defaults() {
    // GIVEN: A directory with no gateway.json
    let dir = TempDir::new().expect("temp dir");

    // WHEN: Loading
    let config = GatewayConfig::load(dir.path()).expect("load should succeed");

    // THEN: Defaults
    assert_eq!(config.server.listen_port, DEFAULT_GATEWAY_PORT);
    assert!(config.clusters.is_empty());
}

/// **VALUE**: Verifies a corrupt config file is reported, not silently replaced with defaults.
///
/// **WHY THIS MATTERS**: Silently ignoring a broken file would start the gateway with no
/// clusters and confuse the operator.
///
/// **BUG THIS CATCHES**: Would catch `load` swallowing JSON errors.
#[test]
fn given_corrupt_file_when_load_called_then_returns_parse_error() {
    // GIVEN: A gateway.json that is not JSON
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("gateway.json"), "{ not json").expect("write");

    // WHEN: Loading
    let result = GatewayConfig::load(dir.path());

    // THEN: Parse error
    assert!(
        matches!(result, Err(ConfigError::ParseError { .. })),
        "Expected ParseError, got {result:?}"
    );
}

/// **VALUE**: Verifies a partial file only overrides the fields it names.
///
/// **BUG THIS CATCHES**: Would catch a missing `#[serde(default)]` on a section.
#[test]
fn given_partial_file_when_load_called_then_fills_remaining_defaults() {
    // GIVEN: A file that only sets the embedded port and a prefix rewrite
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("gateway.json"),
        r#"{
            "embedded": { "port": 5000 },
            "proxy": { "path_rewrite": { "mode": "prefix", "prefix": "/api/headlamp" } }
        }"#,
    )
    .expect("write");

    // WHEN: Loading
    let config = GatewayConfig::load(dir.path()).expect("load should succeed");

    // THEN: Named fields overridden, the rest defaulted
    assert_eq!(config.embedded.port, 5000);
    assert_eq!(config.embedded.binary_path, EMBEDDED_BINARY);
    assert_eq!(
        config.proxy.path_rewrite,
        PathRewrite::Prefix("/api/headlamp".to_string())
    );
    assert_eq!(config.proxy.token_header, DEFAULT_TOKEN_HEADER);
    assert_eq!(config.server.listen_port, DEFAULT_GATEWAY_PORT);
}

/// **VALUE**: Verifies saved clusters survive a reload and no temp files are left behind.
///
/// **BUG THIS CATCHES**: Would catch the atomic save leaving `.tmp` files or writing to the
/// wrong file name.
#[test]
fn given_config_with_clusters_when_saved_then_reload_sees_them() {
    // GIVEN: A config with two clusters
    let dir = TempDir::new().expect("temp dir");
    let mut config = GatewayConfig::default();
    config.clusters = vec![cluster("alpha"), cluster("beta")];

    // WHEN: Saving and loading again
    config.save(dir.path()).expect("save should succeed");
    let loaded = GatewayConfig::load(dir.path()).expect("load should succeed");

    // THEN: Clusters preserved, only gateway.json in the dir
    assert_eq!(loaded.clusters, config.clusters);
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec!["gateway.json".to_string()]);
}

/// **VALUE**: Verifies the embedded server cannot be configured onto the gateway's own port.
///
/// **WHY THIS MATTERS**: The proxy would forward to itself and loop.
///
/// **BUG THIS CATCHES**: Would catch the collision check being removed.
#[test]
fn given_colliding_ports_when_validated_then_rejected() {
    // GIVEN: Embedded port equal to the listen port
    let mut config = GatewayConfig::default();
    config.embedded.port = config.server.listen_port;

    // WHEN / THEN: Validation fails
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// **VALUE**: Verifies cluster entries are checked for duplicates, URL scheme and token env.
///
/// **BUG THIS CATCHES**: Would catch a duplicate cluster silently overwriting another in the
/// kubeconfig, or a non-HTTP server URL reaching the embedded server.
#[test]
fn given_invalid_clusters_when_validated_then_each_is_rejected() {
    // GIVEN: Three broken cluster lists
    let mut duplicate = GatewayConfig::default();
    duplicate.clusters = vec![cluster("alpha"), cluster("alpha")];

    let mut bad_scheme = GatewayConfig::default();
    let mut c = cluster("alpha");
    c.server = "ftp://alpha".to_string();
    bad_scheme.clusters = vec![c];

    let mut no_env = GatewayConfig::default();
    let mut c = cluster("alpha");
    c.token_env = "  ".to_string();
    no_env.clusters = vec![c];

    // WHEN / THEN: Each fails validation
    for (label, config) in [
        ("duplicate", duplicate),
        ("bad scheme", bad_scheme),
        ("no env", no_env),
    ] {
        assert!(
            matches!(config.validate(), Err(ConfigError::ValidationError { .. })),
            "{label} should be rejected"
        );
    }
}

/// **VALUE**: Verifies an invalid token header name is caught at load time, not at first request.
///
/// **BUG THIS CATCHES**: Would catch header validation being dropped, which would otherwise fail
/// when building the router.
#[test]
fn given_invalid_token_header_when_validated_then_rejected() {
    // GIVEN: A header name with a space
    let mut config = GatewayConfig::default();
    config.proxy.token_header = "bad header".to_string();

    // WHEN / THEN: Validation fails
    assert!(config.validate().is_err());
}

/// **VALUE**: Verifies the prefix rewrite prepends once and leaves already-prefixed paths alone.
///
/// **WHY THIS MATTERS**: The embedded server serves under its base path; a double prefix breaks
/// every asset URL the UI builds itself.
///
/// **BUG THIS CATCHES**: Would catch `/api/headlamp/api/headlamp/...` paths or a prefix that
/// also matches `/api/headlampX`.
#[test]
fn given_prefix_rewrite_when_applied_then_prefixes_once() {
    // GIVEN: Both rewrite modes
    let pass = PathRewrite::PassThrough;
    let prefix = PathRewrite::Prefix("/api/headlamp".to_string());

    // WHEN / THEN
    assert_eq!(pass.apply("/clusters"), "/clusters");
    assert_eq!(prefix.apply("/clusters"), "/api/headlamp/clusters");
    assert_eq!(prefix.apply("/api/headlamp/clusters"), "/api/headlamp/clusters");
    assert_eq!(prefix.apply("/api/headlamp"), "/api/headlamp");
    assert_eq!(prefix.apply("/api/headlampX"), "/api/headlamp/api/headlampX");
}

/// **VALUE**: Verifies `HEADLAMP_BINARY_PATH` overrides the configured binary.
///
/// **BUG THIS CATCHES**: Would catch the override being read before load or ignored.
#[test]
#[serial]
fn given_binary_env_when_overrides_applied_then_binary_replaced() {
    // GIVEN: The env var set
    // SAFETY: serialised with the other env-mutating tests
    unsafe { std::env::set_var("HEADLAMP_BINARY_PATH", "/opt/headlamp/headlamp-server") };
    let mut config = GatewayConfig::default();

    // WHEN: Applying overrides
    config.apply_env_overrides();
    unsafe { std::env::remove_var("HEADLAMP_BINARY_PATH") };

    // THEN: Binary replaced
    assert_eq!(config.embedded.binary_path, "/opt/headlamp/headlamp-server");
}
