use gateway_core::error::GatewayClientError;
use gateway_core::gateway_client::GatewayClient;
use gateway_core::handshake::ConfigSource;

use common::RedactedToken;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "client-token";

fn client_for(server: &MockServer) -> GatewayClient {
    GatewayClient::new(&server.uri())
        .expect("Failed to build client")
        .with_token(RedactedToken::new(TOKEN))
}

/// **VALUE**: Verifies every authenticated call sends the bearer token and parses its response.
///
/// **WHY THIS MATTERS**: These are the only calls the client makes to bring Headlamp up; a
/// missing header means permanent 401s.
///
/// **BUG THIS CATCHES**: Would catch the token being applied to only some calls, or a response
/// field rename going unnoticed.
#[tokio::test]
async fn given_gateway_when_routes_called_then_bearer_sent_and_bodies_parsed() {
    // GIVEN
    let server = MockServer::start().await;
    let bearer = format!("Bearer {TOKEN}");

    Mock::given(method("POST"))
        .and(path("/start"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Headlamp Server started" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refreshKubeconfig"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fetchKubeconfig"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "kubeconfig": "apiVersion: v1\n" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    // WHEN
    let message = client.start().await.expect("start");
    client.refresh_kubeconfig().await.expect("refresh");
    let kubeconfig = client.fetch_kubeconfig().await.expect("fetch");

    // THEN
    assert_eq!(message, "Headlamp Server started");
    assert_eq!(kubeconfig, "apiVersion: v1\n");
}

/// **VALUE**: Verifies health parses the supervisor state.
///
/// **BUG THIS CATCHES**: Would catch `state` being parsed as anything but the snake_case string.
#[tokio::test]
async fn given_health_endpoint_when_polled_then_status_parsed() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({ "status": "ok", "running": true, "state": "running" }),
        ))
        .mount(&server)
        .await;

    // WHEN
    let health = GatewayClient::new(&server.uri())
        .expect("client")
        .health()
        .await
        .expect("health");

    // THEN
    assert_eq!(health.status, "ok");
    assert!(health.running);
    assert_eq!(health.state, "running");
}

/// **VALUE**: Verifies a gateway error status surfaces as a status error with the body.
///
/// **BUG THIS CATCHES**: Would catch a 500 JSON body being parsed as a success response.
#[tokio::test]
async fn given_gateway_500_when_start_called_then_status_error() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            json!({ "message": "Error starting Headlamp Server", "error": "spawn_failure" }),
        ))
        .mount(&server)
        .await;

    // WHEN
    let result = client_for(&server).start().await;

    // THEN
    match result {
        Err(err @ GatewayClientError::Status { .. }) => {
            assert_eq!(err.status_code(), Some(500));
            assert!(err.to_string().contains("Error starting Headlamp Server"));
        }
        other => panic!("Expected status error, got {other:?}"),
    }
}

/// **VALUE**: Verifies a rotated token replaces the old one on the next call.
///
/// **BUG THIS CATCHES**: Would catch the client capturing the token at construction time only.
#[tokio::test]
async fn given_token_rotated_when_called_then_new_token_sent() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fetchKubeconfig"))
        .and(header("authorization", "Bearer rotated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "kubeconfig": "k" })))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    // WHEN
    client.set_token(RedactedToken::new("rotated"));
    let result = client.kubeconfig().await;

    // THEN
    assert_eq!(result.expect("kubeconfig"), "k");
}

/// **VALUE**: Verifies readiness polling keeps trying until the surface answers.
///
/// **WHY THIS MATTERS**: The embedded server needs a few seconds to boot after `/start`; loading
/// the surface early shows a broken page.
///
/// **BUG THIS CATCHES**: Would catch the poll giving up on the first 503.
#[tokio::test]
async fn given_surface_boots_slowly_when_waiting_then_ready_after_retries() {
    // GIVEN: Two 503s, then 200
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let client = GatewayClient::new(&server.uri()).expect("client");

    // WHEN
    let result = client.wait_until_ready(Duration::from_secs(20)).await;

    // THEN
    assert!(result.is_ok(), "Expected ready, got {result:?}");
    let received = server.received_requests().await.expect("recording on");
    assert!(received.len() >= 3);
}

/// **VALUE**: Verifies readiness polling gives up with `NotReady` when the surface never answers.
///
/// **BUG THIS CATCHES**: Would catch an unbounded poll hanging the host forever.
#[tokio::test]
async fn given_surface_never_ready_when_waiting_then_not_ready() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let client = GatewayClient::new(&server.uri()).expect("client");

    // WHEN
    let result = client.wait_until_ready(Duration::from_secs(1)).await;

    // THEN
    assert!(matches!(result, Err(GatewayClientError::NotReady { .. })));
}

/// **VALUE**: Verifies the surface URL carries the host page's query parameters.
///
/// **BUG THIS CATCHES**: Would catch deep links (`?cluster=...`) being lost when the surface loads.
#[test]
fn given_host_query_when_surface_url_built_then_params_appended() {
    // GIVEN
    let client = GatewayClient::new("http://127.0.0.1:7008").expect("client");

    // WHEN
    let url = client.surface_url([("cluster", "main"), ("to", "/c/main/pods")]);
    let bare = client.surface_url(std::iter::empty());

    // THEN
    assert_eq!(
        url.as_str(),
        "http://127.0.0.1:7008/?cluster=main&to=%2Fc%2Fmain%2Fpods"
    );
    assert_eq!(bare.as_str(), "http://127.0.0.1:7008/");
}
