// SDB - Solidity Debugger Bridge
// Copyright (C) 2024 SDB Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::time::Duration;

use futures::{SinkExt, Stream, StreamExt};
use sdb_bridge::{
    Bridge, BridgeConfig, BridgeError, EngineEvent, EventOutcome, Transport, TransportError,
    WsClientTransport, WsServerTransport,
};
use sdb_common::{codec, Content, Envelope};
use serde_json::json;
use tokio::{net::TcpListener, time::timeout};
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message};
use tracing::info;

async fn next_envelope<S>(stream: &mut S) -> Envelope
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("socket timed out")
            .expect("socket closed")
            .unwrap();
        match message {
            Message::Text(text) => return codec::decode(text.as_bytes()).unwrap(),
            Message::Binary(bytes) => return codec::decode(&bytes).unwrap(),
            _ => continue,
        }
    }
}

fn text(envelope: &Envelope) -> Message {
    Message::Text(String::from_utf8(codec::encode(envelope).unwrap()).unwrap().into())
}

#[tokio::test]
async fn test_listen_mode_round_trip() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let server = WsServerTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    assert_eq!(server.describe(), format!("ws listen {addr}"));

    let bridge = Bridge::new(BridgeConfig::default());
    let attaching = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.attach_with(Box::new(server), || {}).await })
    };
    let (mut socket, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    attaching.await.unwrap().unwrap();
    assert!(bridge.is_connected());

    let request = Envelope::request(
        "request",
        Content::from_value(json!({ "type": "sendDeclarations", "address": "bb", "declarations": [1] })),
    );
    socket.send(text(&request)).await.unwrap();
    let reply = next_envelope(&mut socket).await;
    assert_eq!(reply.id, request.id);
    assert_eq!(reply.content.to_value().unwrap(), json!({ "message": "ok" }));

    let paused = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.on_engine_event(EngineEvent::BeforeBlock(Content::object())).await })
    };
    let event = next_envelope(&mut socket).await;
    assert_eq!(event.trigger_type, "beforeBlock");
    socket.send(text(&Envelope::response(event.id.clone(), Content::object()))).await.unwrap();
    let outcome = timeout(Duration::from_secs(5), paused).await.unwrap().unwrap().unwrap();
    assert!(matches!(outcome, EventOutcome::Resumed(_)));

    // closing the socket ends the session and fails what is still paused
    let paused = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.on_engine_event(EngineEvent::AfterBlock(Content::object())).await })
    };
    next_envelope(&mut socket).await;
    socket.close(None).await.unwrap();
    let result = timeout(Duration::from_secs(5), paused).await.unwrap().unwrap();
    assert!(matches!(result, Err(BridgeError::SessionClosed)));
    assert!(!bridge.is_connected());
}

#[tokio::test]
async fn test_dial_mode_round_trip() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let debugger = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        let event = next_envelope(&mut socket).await;
        let mut content = Content::object();
        content.set("fastStep", false);
        socket.send(text(&Envelope::response(event.id.clone(), content))).await.unwrap();
        // hand the socket back so the session outlives this task
        (socket, event)
    });

    let bridge = Bridge::new(BridgeConfig::default());
    bridge.attach_with(Box::new(WsClientTransport::new(url)), || {}).await.unwrap();
    let outcome = bridge.on_engine_event(EngineEvent::BeforeTx(Content::object())).await.unwrap();

    let (mut socket, event) = debugger.await.unwrap();
    assert_eq!(outcome.response().unwrap().id, event.id);
    assert!(bridge.is_connected());
    assert!(!bridge.fast_step());

    bridge.disconnect();
    assert!(!bridge.is_connected());
    socket.close(None).await.ok();
}

#[tokio::test]
async fn test_attach_times_out_without_debugger() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let server = WsServerTransport::bind("127.0.0.1:0").await.unwrap();
    let bridge = Bridge::new(BridgeConfig::default().with_connect_timeout(Duration::from_millis(50)));

    let err = bridge.attach_with(Box::new(server), || panic!("not ready")).await.unwrap_err();
    assert!(matches!(err, BridgeError::Transport(TransportError::Timeout(_))));
    assert!(!bridge.is_connected());
}

#[tokio::test]
async fn test_dial_failure_is_transport_error() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    // grab a free port, then release it so nothing listens there
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let bridge = Bridge::new(BridgeConfig::default().with_connect_timeout(Duration::from_secs(5)));

    let err = bridge
        .attach_with(Box::new(WsClientTransport::new(format!("ws://127.0.0.1:{port}"))), || {})
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Transport(TransportError::Handshake { .. })));
}
