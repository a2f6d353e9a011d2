use crate::RedactedToken;

/// **VALUE**: Verifies tokens never appear in Debug or Display output.
///
/// **WHY THIS MATTERS**: Credential bundles are passed through code that logs liberally.
/// A single `{:?}` on a bundle must not leak a cluster bearer token.
///
/// **BUG THIS CATCHES**: Would catch a derived `Debug` replacing the manual impl.
#[test]
fn given_token_when_formatted_then_value_is_hidden() {
    // GIVEN: A token with a recognisable value
    let token = RedactedToken::new("super-secret-bearer");

    // WHEN: Formatting it both ways
    let debug = format!("{token:?}");
    let display = format!("{token}");

    // THEN: Neither contains the value
    assert!(!debug.contains("super-secret-bearer"));
    assert!(!display.contains("super-secret-bearer"));
    assert!(debug.contains("REDACTED"));
}

/// **VALUE**: Verifies serde serialization refuses to emit the token.
///
/// **WHY THIS MATTERS**: JSON error bodies and health payloads are built with serde; a
/// token sneaking into a response struct must fail loudly instead of being sent.
#[test]
fn given_token_when_serialized_then_returns_error() {
    // GIVEN: A token
    let token = RedactedToken::new("abc123");

    // WHEN: Serializing to JSON
    let result = serde_json::to_string(&token);

    // THEN: Serialization fails
    assert!(result.is_err(), "Serialization must fail");
}

#[test]
fn given_token_when_exposed_then_returns_original_value() {
    let token = RedactedToken::from(String::from("abc123"));

    assert_eq!(token.expose(), "abc123");
    assert_eq!(token.len(), 6);
    assert!(!token.is_empty());
}
