use crate::gateway_tests::helpers::{
    TEST_TOKEN, authed, body_json, closed_port, empty, proxy_gateway,
};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// **VALUE**: Verifies requests without a token are rejected before reaching the upstream.
///
/// **WHY THIS MATTERS**: The embedded server trusts its kubeconfig; anyone who reaches it gets
/// the signed-in user's cluster access.
///
/// **BUG THIS CATCHES**: Would catch the fallback proxy being mounted outside the auth layer.
#[tokio::test]
async fn given_no_token_when_api_requested_then_401_and_upstream_untouched() {
    // GIVEN: An upstream that records every request
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(
            Request::builder().uri("/clusters/main/api/v1/namespaces"),
        ))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "missing authentication token");
}

/// **VALUE**: Verifies wrong tokens and non-bearer schemes are rejected.
///
/// **BUG THIS CATCHES**: Would catch `Basic` credentials or a wrong custom-header token being
/// treated as valid.
#[tokio::test]
async fn given_bad_credentials_when_requested_then_401() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);

    let cases = [
        ("authorization", "Bearer not-the-token".to_string()),
        ("authorization", format!("Basic {TEST_TOKEN}")),
        ("authorization", "Bearer ".to_string()),
        ("x-headlamp-token", "not-the-token".to_string()),
    ];

    for (header, value) in cases {
        // WHEN
        let response = gateway
            .router()
            .oneshot(empty(
                Request::builder()
                    .method("POST")
                    .uri("/fetchKubeconfig")
                    .header(header, value.clone()),
            ))
            .await
            .expect("request");

        // THEN
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{header}: {value} should be rejected"
        );
    }
}

/// **VALUE**: Verifies the custom token header authenticates like a bearer token.
///
/// **WHY THIS MATTERS**: The embedded UI cannot set `Authorization` on its own requests (it
/// uses that header for cluster tokens), so it sends the gateway token in the custom header.
///
/// **BUG THIS CATCHES**: Would catch the custom header name being compared case-sensitively or
/// ignored.
#[tokio::test]
async fn given_custom_header_token_when_requested_then_authenticated() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(
            Request::builder()
                .method("POST")
                .uri("/fetchKubeconfig")
                .header("X-Headlamp-Token", TEST_TOKEN),
        ))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(
        body["kubeconfig"]
            .as_str()
            .is_some_and(|k| k.contains("current-context: main"))
    );
}

/// **VALUE**: Verifies static assets are served without a token.
///
/// **BUG THIS CATCHES**: Would catch the UI shell failing to load because the browser has no
/// token yet on first paint.
#[tokio::test]
async fn given_static_path_when_requested_without_token_then_proxied() {
    // GIVEN
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/assets/index.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
        .expect(1)
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(Request::builder().uri("/assets/index.js")))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
}

/// **VALUE**: Verifies `/health` is public and reports the supervisor state.
///
/// **BUG THIS CATCHES**: Would catch health requiring auth or reporting `running: true` before
/// anything was started.
#[tokio::test]
async fn given_fresh_gateway_when_health_requested_then_ok_not_running() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(Request::builder().uri("/health")))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "status": "ok", "running": false, "state": "not_started" })
    );
}

/// **VALUE**: Verifies CORS preflight is answered without credentials and echoes the origin.
///
/// **WHY THIS MATTERS**: Browsers never attach credentials to a preflight; if it hits the auth
/// layer every cross-origin call from the host page fails.
///
/// **BUG THIS CATCHES**: Would catch the CORS layer being placed inside the auth middleware, or
/// the custom token header missing from the allowed headers.
#[tokio::test]
async fn given_preflight_when_sent_without_token_then_cors_allows_origin() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);

    // WHEN
    let response = gateway
        .router()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/start")
                .header("origin", "http://localhost:3000")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "x-headlamp-token")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request");

    // THEN
    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "http://localhost:3000"
    );
    assert_eq!(headers["access-control-allow-credentials"], "true");
    let allowed = headers["access-control-allow-headers"]
        .to_str()
        .expect("ascii")
        .to_ascii_lowercase();
    assert!(allowed.contains("x-headlamp-token"));
}

/// **VALUE**: Verifies the frame policy is set on every response, including rejections.
///
/// **BUG THIS CATCHES**: Would catch the CSP layer only wrapping successful proxy responses.
#[tokio::test]
async fn given_any_response_when_returned_then_frame_policy_set() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);

    // WHEN
    let health = gateway
        .router()
        .oneshot(empty(Request::builder().uri("/health")))
        .await
        .expect("request");
    let rejected = gateway
        .router()
        .oneshot(empty(Request::builder().uri("/api/secret")))
        .await
        .expect("request");

    // THEN
    for response in [health, rejected] {
        assert_eq!(
            response.headers()["content-security-policy"],
            "frame-ancestors 'self' http://localhost:3000"
        );
    }
}

/// **VALUE**: Verifies an authenticated request to a dead upstream gets a JSON 502.
///
/// **BUG THIS CATCHES**: Would catch upstream connect errors surfacing as 500 or a panic, which
/// hides "server not started yet" from the UI.
#[tokio::test]
async fn given_upstream_down_when_proxied_then_502_json() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(authed("GET", "/clusters/main/version")))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "proxy_failure");
    assert_eq!(body["message"], "Headlamp Server unreachable");
}

/// **VALUE**: Verifies dot-segment paths that start under a public prefix are refused before
/// authentication and never reach the upstream.
///
/// **WHY THIS MATTERS**: The allow-list matches the raw path, but the upstream URL parser
/// resolves `..`; `/assets/../clusters/...` would otherwise reach the Kubernetes API with no
/// token at all.
///
/// **BUG THIS CATCHES**: Would catch the allow-list being consulted before dot segments are
/// rejected, or only the literal `..` spelling being caught.
#[tokio::test]
async fn given_dot_segments_under_public_prefix_when_requested_then_400_and_upstream_untouched() {
    // GIVEN: An upstream that must never be called
    let upstream = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    let paths = [
        "/assets/../clusters/main/api/v1/secrets",
        "/assets/%2e%2e/clusters/main/api/v1/secrets",
        "/assets/%2E%2e/clusters/main/api/v1/secrets",
        "/static/.%2E/clusters/main/api/v1/secrets",
        "/assets/./../wsMultiplexer",
    ];

    for uri in paths {
        // WHEN: No token at all
        let response = gateway
            .router()
            .oneshot(empty(Request::builder().uri(uri)))
            .await
            .expect("request");

        // THEN
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body_json(response).await["error"], "bad_request", "{uri}");
    }
}

/// **VALUE**: Verifies a dot-segment path is refused even with a valid token.
///
/// **BUG THIS CATCHES**: Would catch the check living inside the public-path branch only.
#[tokio::test]
async fn given_valid_token_and_dot_segments_when_requested_then_400() {
    // GIVEN
    let upstream = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(authed("GET", "/clusters/main/../other/version")))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// **VALUE**: Verifies a non-bearer `Authorization` header does not hide a valid custom token.
///
/// **WHY THIS MATTERS**: A proxy in front of the host may inject `Authorization: Basic ...`;
/// the UI's own token travels in the custom header.
///
/// **BUG THIS CATCHES**: Would catch any `Authorization` header short-circuiting to 401.
#[tokio::test]
async fn given_basic_authorization_and_custom_token_when_requested_then_authenticated() {
    // GIVEN
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(empty(
            Request::builder()
                .uri("/config")
                .header("authorization", "Basic dXNlcjpwYXNz")
                .header("x-headlamp-token", TEST_TOKEN),
        ))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
}
