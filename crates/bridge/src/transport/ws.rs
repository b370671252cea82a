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

//! WebSocket backends.

use std::net::SocketAddr;

use futures::{future::BoxFuture, FutureExt, SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    sync::mpsc,
};
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::{Connection, FrameSender, Transport, TransportEvent};
use crate::TransportError;

/// Listens on `host:port` and accepts exactly one debugger.
#[derive(Debug)]
pub struct WsServerTransport {
    endpoint: String,
    listener: Option<TcpListener>,
}

impl WsServerTransport {
    /// Binds lazily when connected.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), listener: None }
    }

    /// Binds right away, e.g. on port 0 to learn the chosen port before connecting.
    pub async fn bind(endpoint: &str) -> Result<Self, TransportError> {
        let listener = bind(endpoint).await?;
        let endpoint = listener.local_addr().map(|a| a.to_string()).unwrap_or_else(|_| endpoint.into());
        Ok(Self { endpoint, listener: Some(listener) })
    }

    /// Bound address, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

async fn bind(endpoint: &str) -> Result<TcpListener, TransportError> {
    TcpListener::bind(endpoint)
        .await
        .map_err(|source| TransportError::Bind { addr: endpoint.to_string(), source })
}

impl Transport for WsServerTransport {
    fn describe(&self) -> String {
        format!("ws listen {}", self.endpoint)
    }

    fn connect(self: Box<Self>) -> BoxFuture<'static, Result<Connection, TransportError>> {
        async move {
            let listener = match self.listener {
                Some(listener) => listener,
                None => bind(&self.endpoint).await?,
            };
            info!("Waiting for debugger on {}", self.endpoint);

            let (stream, peer) = listener.accept().await.map_err(TransportError::Accept)?;
            // one peer only; stop listening
            drop(listener);

            let ws = accept_async(stream).await.map_err(|e| TransportError::Handshake {
                endpoint: peer.to_string(),
                source: Box::new(e),
            })?;
            info!("Debugger connected from {peer}");
            Ok(spawn_pumps(ws, peer.to_string()))
        }
        .boxed()
    }
}

/// Dials a debugger listening at a `ws://` URL.
#[derive(Debug, Clone)]
pub struct WsClientTransport {
    url: String,
}

impl WsClientTransport {
    /// Transport for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Transport for WsClientTransport {
    fn describe(&self) -> String {
        format!("ws dial {}", self.url)
    }

    fn connect(self: Box<Self>) -> BoxFuture<'static, Result<Connection, TransportError>> {
        async move {
            let (ws, _) = connect_async(self.url.as_str()).await.map_err(|e| {
                TransportError::Handshake { endpoint: self.url.clone(), source: Box::new(e) }
            })?;
            info!("Connected to debugger at {}", self.url);
            Ok(spawn_pumps(ws, self.url))
        }
        .boxed()
    }
}

/// Moves frames between the socket and the connection channels on two tasks.
fn spawn_pumps<S>(ws: WebSocketStream<S>, peer: String) -> Connection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    let writer_peer = peer.clone();
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let message = match String::from_utf8(frame) {
                Ok(text) => Message::Text(text.into()),
                Err(e) => Message::Binary(e.into_bytes().into()),
            };
            if let Err(e) = sink.send(message).await {
                error!("Failed to send frame to {writer_peer}: {e}");
                break;
            }
        }
        // sender dropped: the session is over
        let _ = sink.close().await;
        debug!("Writer for {writer_peer} finished");
    });

    tokio::spawn(async move {
        let reason = loop {
            let frame = match stream.next().await {
                Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                Some(Ok(Message::Binary(bytes))) => bytes.to_vec(),
                Some(Ok(Message::Close(frame))) => break frame.map(|f| f.reason.as_str().to_owned()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket error from {peer}: {e}");
                    break Some(e.to_string());
                }
                None => break None,
            };
            if in_tx.send(TransportEvent::Frame(frame)).is_err() {
                break None;
            }
        };
        let _ = in_tx.send(TransportEvent::Closed { reason });
        debug!("Reader for {peer} finished");
    });

    Connection { sender: FrameSender::new(out_tx), events: in_rx }
}
