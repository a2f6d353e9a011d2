use crate::gateway_tests::helpers::{TEST_TOKEN, closed_port, proxy_gateway};

use gateway_core::gateway::start_gateway;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, connect_async};

const SUBPROTOCOL: &str = "base64.channel.k8s.io";
const WAIT: Duration = Duration::from_secs(5);

/// Upstream echo server. Echoes text and binary frames, accepts the first
/// requested subprotocol, and records whether an `authorization` header arrived.
async fn start_echo_upstream() -> (u16, tokio::sync::mpsc::UnboundedReceiver<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind upstream");
    let port = listener.local_addr().expect("local addr").port();
    let (auth_tx, auth_rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let auth_tx = auth_tx.clone();
            tokio::spawn(async move {
                let callback = |request: &Request, mut response: Response| {
                    let _ = auth_tx.send(request.headers().contains_key("authorization"));
                    if let Some(protocol) = request.headers().get("sec-websocket-protocol") {
                        response
                            .headers_mut()
                            .insert("sec-websocket-protocol", protocol.clone());
                    }
                    Ok::<Response, ErrorResponse>(response)
                };

                let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
                    return;
                };

                while let Some(Ok(message)) = ws.next().await {
                    match message {
                        Message::Text(_) | Message::Binary(_) => {
                            if ws.send(message).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            });
        }
    });

    (port, auth_rx)
}

/// **VALUE**: Verifies WebSocket frames are bridged both ways with the subprotocol negotiated.
///
/// **WHY THIS MATTERS**: Headlamp streams pod logs, exec sessions and resource watches over
/// WebSockets with the Kubernetes channel subprotocols; without the bridge the UI shows stale data.
///
/// **BUG THIS CATCHES**: Would catch upgrades going through the plain HTTP proxy, a lost
/// subprotocol, frames dropped in either direction, or the gateway token reaching the upstream.
#[tokio::test]
async fn given_upstream_echo_when_client_sends_frames_then_echoed_through_gateway() {
    // GIVEN: An echo upstream and a running gateway in front of it
    let (upstream_port, mut auth_seen) = start_echo_upstream().await;
    let gateway = proxy_gateway(upstream_port);
    let handle = start_gateway(&gateway.config, gateway.state.clone())
        .await
        .expect("Failed to start gateway");

    let mut request = format!("ws://{}/wsMultiplexer", handle.local_addr())
        .into_client_request()
        .expect("client request");
    request.headers_mut().insert(
        "authorization",
        format!("Bearer {TEST_TOKEN}").parse().expect("header"),
    );
    request
        .headers_mut()
        .insert("sec-websocket-protocol", SUBPROTOCOL.parse().expect("header"));

    // WHEN
    let (mut ws, response) = timeout(WAIT, connect_async(request))
        .await
        .expect("connect timed out")
        .expect("Failed to connect through gateway");

    ws.send(Message::Text("hello".into())).await.expect("send text");
    let echoed_text = timeout(WAIT, ws.next())
        .await
        .expect("echo timed out")
        .expect("stream ended")
        .expect("read error");

    ws.send(Message::Binary(vec![1u8, 2, 3].into()))
        .await
        .expect("send binary");
    let echoed_binary = timeout(WAIT, ws.next())
        .await
        .expect("echo timed out")
        .expect("stream ended")
        .expect("read error");

    // THEN
    assert_eq!(
        response.headers()["sec-websocket-protocol"],
        SUBPROTOCOL
    );
    assert_eq!(echoed_text, Message::Text("hello".into()));
    assert_eq!(echoed_binary, Message::Binary(vec![1u8, 2, 3].into()));
    assert_eq!(auth_seen.recv().await, Some(false));

    let _ = ws.close(None).await;
    handle.shutdown().await.expect("Failed to shut down gateway");
}

/// **VALUE**: Verifies an upgrade without a token is refused before any upstream connection.
///
/// **BUG THIS CATCHES**: Would catch the upgrade path bypassing the auth middleware.
#[tokio::test]
async fn given_no_token_when_upgrading_then_401() {
    // GIVEN
    let (upstream_port, mut auth_seen) = start_echo_upstream().await;
    let gateway = proxy_gateway(upstream_port);
    let handle = start_gateway(&gateway.config, gateway.state.clone())
        .await
        .expect("Failed to start gateway");

    // WHEN
    let result = connect_async(format!("ws://{}/wsMultiplexer", handle.local_addr())).await;

    // THEN
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 401),
        Err(e) => panic!("Expected HTTP 401, got {e}"),
        Ok(_) => panic!("Expected HTTP 401, got an open socket"),
    }
    assert!(auth_seen.try_recv().is_err(), "upstream must not be contacted");

    handle.shutdown().await.expect("Failed to shut down gateway");
}

/// **VALUE**: Verifies an upgrade to a dead upstream is refused with 502.
///
/// **BUG THIS CATCHES**: Would catch the gateway accepting the upgrade and then closing the
/// socket, which the UI retries in a tight loop.
#[tokio::test]
async fn given_upstream_down_when_upgrading_then_502() {
    // GIVEN
    let gateway = proxy_gateway(closed_port().await);
    let handle = start_gateway(&gateway.config, gateway.state.clone())
        .await
        .expect("Failed to start gateway");

    let mut request = format!("ws://{}/wsMultiplexer", handle.local_addr())
        .into_client_request()
        .expect("client request");
    request.headers_mut().insert(
        "authorization",
        format!("Bearer {TEST_TOKEN}").parse().expect("header"),
    );

    // WHEN
    let result = connect_async(request).await;

    // THEN
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 502),
        Err(e) => panic!("Expected HTTP 502, got {e}"),
        Ok(_) => panic!("Expected HTTP 502, got an open socket"),
    }

    handle.shutdown().await.expect("Failed to shut down gateway");
}
