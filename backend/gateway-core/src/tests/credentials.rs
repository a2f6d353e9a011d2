use crate::config::ClusterConfig;
use crate::credentials::{
    CallerCredentials, ClusterCredential, CredentialBundle, CredentialProvider,
    EnvCredentialProvider, StaticTokenValidator, TokenValidator,
};
use crate::error::{AuthFailure, CredentialError};

use common::RedactedToken;

use serial_test::serial;

fn caller() -> CallerCredentials {
    CallerCredentials {
        principal: "user:default/alice".to_string(),
        token: RedactedToken::new("caller-token"),
    }
}

fn cluster(name: &str, env: &str) -> ClusterConfig {
    ClusterConfig {
        name: name.to_string(),
        server: format!("https://{name}.example.com"),
        token_env: env.to_string(),
        certificate_authority_data: Some("Q0EtREFUQQ==".to_string()),
        insecure_skip_tls_verify: false,
    }
}

/// **VALUE**: Verifies the token list format assigns principals and skips empty entries.
///
/// **WHY THIS MATTERS**: The principal is logged and handed to the credential provider; a
/// misparse would attribute requests to the wrong user.
///
/// **BUG THIS CATCHES**: Would catch `alice=` being accepted as an empty token, which would let an
/// empty bearer value authenticate.
#[tokio::test]
async fn given_token_list_when_parsed_then_principals_assigned() {
    // GIVEN: A mixed list
    let validator = StaticTokenValidator::parse(" user:default/alice=tok-a , tok-guest,bob=, ,");

    // WHEN: Validating each token
    let alice = validator.validate("tok-a").await.expect("alice accepted");
    let guest = validator.validate("tok-guest").await.expect("guest accepted");

    // THEN: Two entries with the right principals
    assert_eq!(validator.len(), 2);
    assert_eq!(alice.principal, "user:default/alice");
    assert_eq!(alice.token.expose(), "tok-a");
    assert_eq!(guest.principal, "user:default/guest");
}

/// **VALUE**: Verifies unknown, empty and prefix-matching tokens are rejected as invalid.
///
/// **BUG THIS CATCHES**: Would catch a comparison that only checks a common prefix or treats
/// length mismatch as a match.
#[tokio::test]
async fn given_unknown_tokens_when_validated_then_rejected() {
    // GIVEN: A validator with one token
    let validator = StaticTokenValidator::new().with_token("svc", "secret-token");

    // WHEN / THEN: Near misses are rejected
    for candidate in ["", "secret", "secret-token-2", "SECRET-TOKEN"] {
        let err = validator
            .validate(candidate)
            .await
            .expect_err("near miss must be rejected");
        assert_eq!(err.reason, AuthFailure::InvalidToken, "candidate {candidate:?}");
    }
}

/// **VALUE**: Verifies an empty validator rejects everything.
///
/// **BUG THIS CATCHES**: Would catch the unset-env case falling back to "allow all".
#[tokio::test]
async fn given_empty_validator_when_validated_then_rejected() {
    // GIVEN: No tokens
    let validator = StaticTokenValidator::new();

    // WHEN
    let result = validator.validate("anything").await;

    // THEN
    assert!(validator.is_empty());
    assert!(result.is_err());
}

/// **VALUE**: Verifies the env provider builds one bundle entry per configured cluster.
///
/// **WHY THIS MATTERS**: This is the bundle `/start` materializes; a missing cluster means the
/// embedded server cannot see it.
///
/// **BUG THIS CATCHES**: Would catch the provider dropping CA data or caching tokens between calls.
#[tokio::test]
#[serial]
async fn given_cluster_env_vars_when_bundle_requested_then_fresh_tokens_returned() {
    // GIVEN: Two clusters with tokens in the environment
    // SAFETY: serialised with the other env-mutating tests
    unsafe {
        std::env::set_var("HLGW_TEST_TOKEN_A", "token-a-1");
        std::env::set_var("HLGW_TEST_TOKEN_B", " token-b ");
    }
    let provider = EnvCredentialProvider::new(vec![
        cluster("alpha", "HLGW_TEST_TOKEN_A"),
        cluster("beta", "HLGW_TEST_TOKEN_B"),
    ]);

    // WHEN: Requesting a bundle, rotating one token, requesting again
    let first = provider.credential_bundle(&caller()).await.expect("bundle");
    unsafe { std::env::set_var("HLGW_TEST_TOKEN_A", "token-a-2") };
    let second = provider.credential_bundle(&caller()).await.expect("bundle");
    unsafe {
        std::env::remove_var("HLGW_TEST_TOKEN_A");
        std::env::remove_var("HLGW_TEST_TOKEN_B");
    }

    // THEN: Both clusters present, values trimmed, rotation picked up
    assert_eq!(first.len(), 2);
    let alpha = first.get("alpha").expect("alpha present");
    assert_eq!(alpha.token.expose(), "token-a-1");
    assert_eq!(alpha.server, "https://alpha.example.com");
    assert_eq!(alpha.certificate_authority_data.as_deref(), Some("Q0EtREFUQQ=="));
    assert_eq!(first.get("beta").map(|c| c.token.expose()), Some("token-b"));
    assert_eq!(
        second.get("alpha").map(|c| c.token.expose()),
        Some("token-a-2")
    );
}

/// **VALUE**: Verifies a missing or empty cluster token fails the whole bundle.
///
/// **WHY THIS MATTERS**: A kubeconfig with an empty token makes the embedded server fall back to
/// anonymous access, which is worse than failing `/start`.
///
/// **BUG THIS CATCHES**: Would catch empty env values being accepted.
#[tokio::test]
#[serial]
async fn given_missing_cluster_token_when_bundle_requested_then_missing_error() {
    // GIVEN: One cluster with an empty token, one unset
    unsafe {
        std::env::set_var("HLGW_TEST_EMPTY", "   ");
        std::env::remove_var("HLGW_TEST_UNSET");
    }
    let empty = EnvCredentialProvider::new(vec![cluster("alpha", "HLGW_TEST_EMPTY")]);
    let unset = EnvCredentialProvider::new(vec![cluster("beta", "HLGW_TEST_UNSET")]);

    // WHEN
    let empty_result = empty.credential_bundle(&caller()).await;
    let unset_result = unset.credential_bundle(&caller()).await;
    unsafe { std::env::remove_var("HLGW_TEST_EMPTY") };

    // THEN: Both report the cluster as missing
    assert!(matches!(
        empty_result,
        Err(CredentialError::Missing { ref subject, .. }) if subject == "alpha"
    ));
    assert!(matches!(
        unset_result,
        Err(CredentialError::Missing { ref subject, .. }) if subject == "beta"
    ));
}

/// **VALUE**: Verifies a provider with no clusters reports a lookup error.
///
/// **BUG THIS CATCHES**: Would catch an empty bundle reaching the materializer.
#[tokio::test]
async fn given_no_clusters_when_bundle_requested_then_lookup_error() {
    // GIVEN
    let provider = EnvCredentialProvider::new(Vec::new());

    // WHEN
    let result = provider.credential_bundle(&caller()).await;

    // THEN
    assert!(matches!(result, Err(CredentialError::Lookup { .. })));
}

/// **VALUE**: Verifies the identity token is read from the configured variable.
///
/// **BUG THIS CATCHES**: Would catch `with_identity_env` being ignored.
#[tokio::test]
#[serial]
async fn given_identity_env_when_token_requested_then_read_from_it() {
    // GIVEN
    unsafe { std::env::set_var("HLGW_TEST_IDENTITY", "id-token") };
    let provider = EnvCredentialProvider::new(Vec::new()).with_identity_env("HLGW_TEST_IDENTITY");

    // WHEN
    let token = provider.identity_token().await;
    unsafe { std::env::remove_var("HLGW_TEST_IDENTITY") };

    // THEN
    assert_eq!(token.expect("identity token").expose(), "id-token");
}

/// **VALUE**: Verifies no token value appears in Debug output of credentials.
///
/// **WHY THIS MATTERS**: Bundles and caller credentials are logged with `{:?}` in several places.
///
/// **BUG THIS CATCHES**: Would catch a derived Debug on a type holding a plain `String` token.
#[test]
fn given_bundle_with_token_when_debug_formatted_then_token_hidden() {
    // GIVEN
    let bundle = CredentialBundle::new().with_cluster(
        "alpha",
        ClusterCredential::new("https://alpha", RedactedToken::new("super-secret-value")),
    );

    // WHEN
    let bundle_debug = format!("{bundle:?}");
    let caller_debug = format!("{:?}", caller());

    // THEN
    assert!(!bundle_debug.contains("super-secret-value"));
    assert!(!caller_debug.contains("caller-token"));
    assert!(bundle_debug.contains("alpha"));
}

/// **VALUE**: Verifies the bundle orders clusters by name so the current context is stable.
///
/// **BUG THIS CATCHES**: Would catch insertion-order iteration making the chosen context depend
/// on config order.
#[test]
fn given_clusters_inserted_out_of_order_when_first_requested_then_sorted_first() {
    // GIVEN
    let bundle = CredentialBundle::new()
        .with_cluster("zeta", ClusterCredential::new("https://z", RedactedToken::new("z")))
        .with_cluster("alpha", ClusterCredential::new("https://a", RedactedToken::new("a")));

    // WHEN / THEN
    assert_eq!(bundle.first_cluster(), Some("alpha"));
    let names: Vec<_> = bundle.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}
