use crate::HttpStatusCode;

/// **VALUE**: Verifies which upstream statuses are considered transient.
///
/// **WHY THIS MATTERS**: The readiness poller keeps waiting on 502/503/504 while the
/// embedded server boots, but gives up immediately on 401/404.
#[test]
fn given_status_codes_when_checked_then_categorised_correctly() {
    // GIVEN / WHEN / THEN
    assert!(HttpStatusCode(502).is_retryable());
    assert!(HttpStatusCode(503).is_retryable());
    assert!(HttpStatusCode(429).is_retryable());
    assert!(!HttpStatusCode(401).is_retryable());
    assert!(!HttpStatusCode(500).is_retryable());

    assert!(HttpStatusCode(404).is_client_error());
    assert!(HttpStatusCode(500).is_server_error());
    assert!(!HttpStatusCode(200).is_client_error());
}
