//! WebSocket bridging between the caller and the embedded server.
//!
//! The upstream socket is opened before the caller's upgrade is accepted, so
//! an unreachable embedded server is reported as a normal 502 instead of an
//! immediately closed socket. After the upgrade, frames are copied in both
//! directions until either side closes.

use crate::error::ProxyError;
use crate::gateway::proxy::UpstreamProxy;

use axum::body::Body;
use axum::extract::ws::{CloseFrame as AxumCloseFrame, Message as AxumMessage, WebSocket};
use axum::extract::{FromRequestParts, Request, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::{SEC_WEBSOCKET_PROTOCOL, UPGRADE};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as TungsteniteError;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as UpstreamCloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Connect upstream, then accept the caller's upgrade and bridge the two.
pub async fn proxy_websocket(
    proxy: &UpstreamProxy,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let (mut parts, _body) = request.into_parts();
    let url = proxy.ws_url(&parts.uri);
    let requested_protocols = parts.headers.get(SEC_WEBSOCKET_PROTOCOL).cloned();

    let upgrade = WebSocketUpgrade::from_request_parts(&mut parts, &())
        .await
        .map_err(|e| ProxyError::websocket(format!("Invalid upgrade request: {e}")))?;

    let mut upstream_request = url
        .as_str()
        .into_client_request()
        .map_err(|e| ProxyError::websocket(format!("Invalid upstream URL {url}: {e}")))?;

    if let Some(protocols) = requested_protocols {
        upstream_request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, protocols);
    }

    let (upstream, response) = connect_async(upstream_request)
        .await
        .map_err(|e| connect_error(proxy.ws_base(), e))?;

    let selected_protocol = response
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let upgrade = match selected_protocol {
        Some(protocol) => upgrade.protocols([protocol]),
        None => upgrade,
    };

    let label = parts.uri.path().to_string();
    info!("WebSocket bridge opened for {label}");

    Ok(upgrade.on_upgrade(move |socket| bridge(socket, upstream, label)))
}

#[track_caller]
fn connect_error(upstream: &str, error: TungsteniteError) -> ProxyError {
    match error {
        TungsteniteError::Io(e) => ProxyError::unreachable(upstream, e.to_string()),
        TungsteniteError::Http(response) => ProxyError::upstream(
            upstream,
            format!("Upgrade rejected with HTTP {}", response.status()),
        ),
        other => ProxyError::upstream(upstream, other.to_string()),
    }
}

async fn bridge(client: WebSocket, upstream: UpstreamSocket, label: String) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(message) = client_rx.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    debug!("{label}: client socket error: {e}");
                    break;
                }
            };

            let closing = matches!(message, AxumMessage::Close(_));
            if let Err(e) = upstream_tx.send(to_upstream(message)).await {
                debug!("{label}: upstream send failed: {e}");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = upstream_tx.close().await;
    };

    let upstream_to_client = async {
        while let Some(message) = upstream_rx.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    warn!("{label}: upstream socket error: {e}");
                    break;
                }
            };

            let Some(message) = to_client(message) else {
                continue;
            };

            let closing = matches!(message, AxumMessage::Close(_));
            if let Err(e) = client_tx.send(message).await {
                debug!("{label}: client send failed: {e}");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = client_tx.close().await;
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }

    info!("WebSocket bridge closed for {label}");
}

fn to_upstream(message: AxumMessage) -> UpstreamMessage {
    match message {
        AxumMessage::Text(text) => UpstreamMessage::Text(text.as_str().to_owned().into()),
        AxumMessage::Binary(data) => UpstreamMessage::Binary(data),
        AxumMessage::Ping(data) => UpstreamMessage::Ping(data),
        AxumMessage::Pong(data) => UpstreamMessage::Pong(data),
        AxumMessage::Close(frame) => UpstreamMessage::Close(frame.map(|f| UpstreamCloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
    }
}

/// Raw frames have no client-side equivalent and are dropped.
fn to_client(message: UpstreamMessage) -> Option<AxumMessage> {
    match message {
        UpstreamMessage::Text(text) => Some(AxumMessage::Text(text.as_str().to_owned().into())),
        UpstreamMessage::Binary(data) => Some(AxumMessage::Binary(data)),
        UpstreamMessage::Ping(data) => Some(AxumMessage::Ping(data)),
        UpstreamMessage::Pong(data) => Some(AxumMessage::Pong(data)),
        UpstreamMessage::Close(frame) => Some(AxumMessage::Close(frame.map(|f| AxumCloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        }))),
        UpstreamMessage::Frame(_) => None,
    }
}
