use crate::credentials::{ClusterCredential, CredentialBundle};
use crate::error::MaterializeError;
use crate::materialize::{ConfigMaterializer, Kubeconfig};

use common::RedactedToken;

use tempfile::TempDir;

fn two_cluster_bundle() -> CredentialBundle {
    let mut staging = ClusterCredential::new("https://staging:6443", RedactedToken::new("tok-stg"));
    staging.insecure_skip_tls_verify = true;

    let mut prod = ClusterCredential::new("https://prod:6443", RedactedToken::new("tok-prod"));
    prod.certificate_authority_data = Some("UFJPRC1DQQ==".to_string());

    CredentialBundle::new()
        .with_cluster("staging", staging)
        .with_cluster("prod", prod)
}

fn temp_entries(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// **VALUE**: Verifies the rendered document has one cluster, user and context per bundle entry.
///
/// **WHY THIS MATTERS**: The embedded server resolves contexts by name; a context pointing at a
/// missing user authenticates as anonymous.
///
/// **BUG THIS CATCHES**: Would catch mismatched names between the three lists, or a current
/// context that is not one of the clusters.
#[test]
fn given_two_clusters_when_rendered_then_entries_are_consistent() {
    // GIVEN
    let bundle = two_cluster_bundle();

    // WHEN
    let doc = Kubeconfig::from_bundle(&bundle).expect("render");

    // THEN: Sorted by name, first is the current context
    assert_eq!(doc.api_version, "v1");
    assert_eq!(doc.kind, "Config");
    assert_eq!(doc.current_context, "prod");

    let cluster_names: Vec<_> = doc.clusters.iter().map(|c| c.name.as_str()).collect();
    let user_names: Vec<_> = doc.users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(cluster_names, vec!["prod", "staging"]);
    assert_eq!(user_names, cluster_names);

    for context in &doc.contexts {
        assert_eq!(context.context.cluster, context.name);
        assert_eq!(context.context.user, context.name);
    }
}

/// **VALUE**: Verifies kubeconfig field names follow the kubeconfig schema.
///
/// **BUG THIS CATCHES**: Would catch snake_case keys like `current_context`, which kubectl
/// silently ignores, or `insecure-skip-tls-verify: false` noise on every cluster.
#[test]
fn given_bundle_when_rendered_to_yaml_then_uses_kubeconfig_keys() {
    // GIVEN
    let materializer = ConfigMaterializer::new("/unused/kubeconfig");

    // WHEN
    let yaml = materializer.render(&two_cluster_bundle()).expect("render");

    // THEN
    assert!(yaml.contains("apiVersion: v1"));
    assert!(yaml.contains("current-context: prod"));
    assert!(yaml.contains("certificate-authority-data: UFJPRC1DQQ=="));
    assert!(yaml.contains("insecure-skip-tls-verify: true"));
    assert_eq!(yaml.matches("insecure-skip-tls-verify").count(), 1);
    assert!(yaml.contains("token: tok-prod"));

    let parsed = Kubeconfig::from_yaml(&yaml).expect("parse back");
    assert_eq!(parsed.users.len(), 2);
}

/// **VALUE**: Verifies an empty bundle is rejected and nothing is written.
///
/// **WHY THIS MATTERS**: An empty kubeconfig would leave the embedded server with no clusters
/// and no error anywhere.
///
/// **BUG THIS CATCHES**: Would catch the write happening before the emptiness check.
#[test]
fn given_empty_bundle_when_materialized_then_error_and_no_file() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("kubeconfig");
    let materializer = ConfigMaterializer::new(&path);

    // WHEN
    let result = materializer.materialize(&CredentialBundle::new());

    // THEN
    assert!(matches!(result, Err(MaterializeError::EmptyBundle { .. })));
    assert!(!path.exists());
    assert!(temp_entries(&dir).is_empty());
}

/// **VALUE**: Verifies materializing twice replaces the file and leaves no temp files behind.
///
/// **WHY THIS MATTERS**: Refresh runs on a timer for the lifetime of the app; leaked temp files
/// would accumulate, each holding live tokens.
///
/// **BUG THIS CATCHES**: Would catch an append instead of a replace, or a temp file that is never
/// persisted.
#[test]
fn given_existing_file_when_materialized_again_then_replaced_without_leftovers() {
    // GIVEN: A nested path that does not exist yet
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("nested").join("kubeconfig");
    let materializer = ConfigMaterializer::new(&path);

    // WHEN: Writing two different bundles
    materializer
        .materialize(&two_cluster_bundle())
        .expect("first write");
    let rotated = CredentialBundle::new().with_cluster(
        "prod",
        ClusterCredential::new("https://prod:6443", RedactedToken::new("tok-rotated")),
    );
    let written = materializer.materialize(&rotated).expect("second write");

    // THEN: Only the second document remains
    assert_eq!(written, path);
    let contents = std::fs::read_to_string(&path).expect("read");
    assert!(contents.contains("tok-rotated"));
    assert!(!contents.contains("tok-stg"));

    let nested: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(nested, vec!["kubeconfig".to_string()]);
}

/// **VALUE**: Verifies the kubeconfig user entry never prints its token.
///
/// **BUG THIS CATCHES**: Would catch a derived Debug on `UserEntry` leaking tokens when the
/// document is logged.
#[test]
fn given_rendered_document_when_debug_formatted_then_token_hidden() {
    // GIVEN
    let doc = Kubeconfig::from_bundle(&two_cluster_bundle()).expect("render");

    // WHEN
    let debug = format!("{doc:?}");

    // THEN
    assert!(!debug.contains("tok-prod"));
    assert!(!debug.contains("tok-stg"));
    assert!(debug.contains("[REDACTED]"));
}
