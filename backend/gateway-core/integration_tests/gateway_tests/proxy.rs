use crate::gateway_tests::helpers::{TEST_TOKEN, authed, body_text, proxy_gateway};

use axum::body::Body;
use axum::http::StatusCode;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// **VALUE**: Verifies the proxied request carries path, query, body and end-to-end headers,
/// but not the gateway credentials.
///
/// **WHY THIS MATTERS**: Headlamp builds Kubernetes API calls from the path and query; the
/// gateway token must stay at the gateway.
///
/// **BUG THIS CATCHES**: Would catch a dropped query string, an empty POST body, or the
/// caller's `Authorization` leaking upstream.
#[tokio::test]
async fn given_authenticated_post_when_proxied_then_upstream_sees_clean_request() {
    // GIVEN
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/clusters/main/api/v1/namespaces"))
        .and(query_param("dryRun", "All"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(
            authed("POST", "/clusters/main/api/v1/namespaces?dryRun=All")
                .header("content-type", "application/json")
                .header("content-length", "21")
                .header("x-request-id", "req-42")
                .body(Body::from(r#"{"metadata":{"n":1}}"#.to_string() + " "))
                .expect("request"),
        )
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_text(response).await, "created");

    let received = upstream.received_requests().await.expect("recording on");
    assert_eq!(received.len(), 1);
    let request = &received[0];
    assert_eq!(request.body, br#"{"metadata":{"n":1}} "#.to_vec());
    assert_eq!(request.headers["x-request-id"], "req-42");
    assert_eq!(request.headers["x-forwarded-proto"], "http");
    assert!(request.headers.get("authorization").is_none());
    assert!(request.headers.get("x-headlamp-token").is_none());
}

/// **VALUE**: Verifies the custom token header is stripped too.
///
/// **BUG THIS CATCHES**: Would catch only `Authorization` being removed.
#[tokio::test]
async fn given_custom_header_auth_when_proxied_then_header_not_forwarded() {
    // GIVEN
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(
            axum::http::Request::builder()
                .uri("/config")
                .header("x-headlamp-token", TEST_TOKEN)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    let received = upstream.received_requests().await.expect("recording on");
    assert!(received[0].headers.get("x-headlamp-token").is_none());
}

/// **VALUE**: Verifies upstream `X-Frame-Options` is dropped and the gateway frame policy wins.
///
/// **WHY THIS MATTERS**: Headlamp sends `X-Frame-Options: DENY`, which would stop the host app
/// from embedding it at all.
///
/// **BUG THIS CATCHES**: Would catch upstream anti-framing headers passing through.
#[tokio::test]
async fn given_upstream_forbids_framing_when_proxied_then_header_replaced() {
    // GIVEN
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-frame-options", "DENY")
                .insert_header("content-security-policy", "frame-ancestors 'none'")
                .insert_header("x-upstream", "kept")
                .set_body_string("<html></html>"),
        )
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(
            axum::http::Request::builder()
                .uri("/")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers.get("x-frame-options").is_none());
    assert_eq!(headers["x-upstream"], "kept");
    assert_eq!(
        headers["content-security-policy"],
        "frame-ancestors 'self' http://localhost:3000"
    );
}

/// **VALUE**: Verifies upstream redirects are returned to the caller, not followed.
///
/// **BUG THIS CATCHES**: Would catch the proxy client following redirects, which would resolve
/// relative `Location` headers against the internal upstream address.
#[tokio::test]
async fn given_upstream_redirect_when_proxied_then_passed_through() {
    // GIVEN
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(authed("GET", "/old").body(Body::empty()).expect("request"))
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/new");
}

/// **VALUE**: Verifies upstream error statuses are relayed unchanged.
///
/// **BUG THIS CATCHES**: Would catch a 404 from Headlamp being turned into a gateway error.
#[tokio::test]
async fn given_upstream_404_when_proxied_then_relayed() {
    // GIVEN
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such cluster"))
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(
            authed("GET", "/clusters/ghost/version")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request");

    // THEN
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "no such cluster");
}

/// **VALUE**: Verifies the upstream's own policy directives survive while its frame policy is
/// replaced.
///
/// **WHY THIS MATTERS**: Headlamp ships `script-src` and `default-src` restrictions; dropping
/// them to allow framing would weaken the embedded UI against injected scripts.
///
/// **BUG THIS CATCHES**: Would catch the whole upstream `Content-Security-Policy` being
/// overwritten instead of merged.
#[tokio::test]
async fn given_upstream_policy_when_proxied_then_directives_kept_and_frame_policy_merged() {
    // GIVEN
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header(
            "content-security-policy",
            "default-src 'self'; Frame-Ancestors 'none'; script-src 'self' 'unsafe-eval'",
        ))
        .mount(&upstream)
        .await;
    let gateway = proxy_gateway(upstream.address().port());

    // WHEN
    let response = gateway
        .router()
        .oneshot(
            axum::http::Request::builder()
                .uri("/")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request");

    // THEN
    let headers = response.headers();
    assert_eq!(headers.get_all("content-security-policy").iter().count(), 1);
    assert_eq!(
        headers["content-security-policy"],
        "default-src 'self'; script-src 'self' 'unsafe-eval'; frame-ancestors 'self' http://localhost:3000"
    );
}
