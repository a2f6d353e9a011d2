// Unit tests for error module

use crate::error::GatewayAppError;

use gateway_core::error::{CoreError, GatewayError};

/// **VALUE**: Verifies library errors keep their message when flattened for the binary.
///
/// **WHY THIS MATTERS**: The binary prints this error and exits; a lost message leaves the
/// operator guessing why startup failed.
///
/// **BUG THIS CATCHES**: Would catch the `From<CoreError>` impl formatting only the variant name.
#[test]
fn given_core_error_when_converted_then_message_kept() {
    // GIVEN
    let core = CoreError::from(GatewayError::serve("listener died"));

    // WHEN
    let err = GatewayAppError::from(core);

    // THEN
    match &err {
        GatewayAppError::Core { message, .. } => assert!(message.contains("listener died")),
        other => panic!("Expected Core variant, got {other:?}"),
    }
    assert!(err.to_string().starts_with("Core Error:"));
}

/// **VALUE**: Verifies the location points at the caller, not at the constructor.
///
/// **BUG THIS CATCHES**: Would catch `#[track_caller]` being dropped from `GatewayAppError::app`.
#[test]
fn given_app_error_when_created_then_location_is_call_site() {
    // GIVEN / WHEN
    let err = GatewayAppError::app("no config dir");

    // THEN
    let rendered = err.to_string();
    assert!(rendered.contains("no config dir"));
    assert!(rendered.contains("tests/error.rs"), "got: {rendered}");
}
