use crate::error::{GatewayError, ProxyError};

use axum::body::Body;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_SECURITY_POLICY, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, Response};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// CORS for the host page: origin echoed, credentials allowed, token header allowed.
pub fn cors_layer(token_header: &HeaderName) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            token_header.clone(),
        ])
}

/// `frame-ancestors 'self' <origins...>`
pub fn frame_ancestors(origins: &[String]) -> Result<HeaderValue, GatewayError> {
    let mut policy = String::from("frame-ancestors 'self'");
    for origin in origins {
        policy.push(' ');
        policy.push_str(origin);
    }

    HeaderValue::from_str(&policy).map_err(|e| {
        GatewayError::from(ProxyError::request(format!(
            "Invalid frame ancestors '{policy}': {e}"
        )))
    })
}

const FRAME_ANCESTORS_DIRECTIVE: &str = "frame-ancestors";

/// Combine the upstream policy with the gateway frame policy.
///
/// Every upstream directive except `frame-ancestors` is kept; `frame_policy`
/// is appended. Without a usable upstream policy the result is `frame_policy`.
pub fn merge_frame_policy<'a>(
    upstream: impl IntoIterator<Item = &'a HeaderValue>,
    frame_policy: &HeaderValue,
) -> HeaderValue {
    let mut directives: Vec<&str> = Vec::new();

    for value in upstream {
        let Ok(policy) = value.to_str() else {
            continue;
        };
        directives.extend(
            policy
                .split(';')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .filter(|d| {
                    let name = d.split_ascii_whitespace().next().unwrap_or_default();
                    !name.eq_ignore_ascii_case(FRAME_ANCESTORS_DIRECTIVE)
                }),
        );
    }

    let Ok(frame) = frame_policy.to_str() else {
        return frame_policy.clone();
    };
    directives.push(frame);

    HeaderValue::from_str(&directives.join("; ")).unwrap_or_else(|_| frame_policy.clone())
}

/// Sets the frame policy on every response, merged into any upstream policy.
pub fn frame_policy_layer(
    frame_policy: HeaderValue,
) -> SetResponseHeaderLayer<impl Fn(&Response<Body>) -> Option<HeaderValue> + Clone> {
    SetResponseHeaderLayer::overriding(CONTENT_SECURITY_POLICY, move |response: &Response<Body>| {
        Some(merge_frame_policy(
            response.headers().get_all(CONTENT_SECURITY_POLICY),
            &frame_policy,
        ))
    })
}
