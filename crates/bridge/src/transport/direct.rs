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

//! In-process transport.
//!
//! Used when the debugger lives in the same process as the engine, and by the
//! test suite to script a debugger.

use futures::{future::BoxFuture, FutureExt};
use sdb_common::{codec, Envelope};
use tokio::sync::mpsc;
use tracing::warn;

use super::{Connection, FrameSender, Transport, TransportEvent};
use crate::{BridgeError, TransportError};

/// Bridge end of an in-process link.
#[derive(Debug)]
pub struct DirectTransport {
    to_peer: mpsc::UnboundedSender<Vec<u8>>,
    from_peer: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Debugger end of an in-process link.
#[derive(Debug)]
pub struct DirectPeer {
    to_bridge: mpsc::UnboundedSender<TransportEvent>,
    from_bridge: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Creates a connected transport/peer pair.
pub fn pair() -> (DirectTransport, DirectPeer) {
    let (to_peer, from_bridge) = mpsc::unbounded_channel();
    let (to_bridge, from_peer) = mpsc::unbounded_channel();
    (DirectTransport { to_peer, from_peer }, DirectPeer { to_bridge, from_bridge })
}

impl Transport for DirectTransport {
    fn describe(&self) -> String {
        "direct".to_string()
    }

    fn connect(self: Box<Self>) -> BoxFuture<'static, Result<Connection, TransportError>> {
        let Self { to_peer, from_peer } = *self;
        async move { Ok(Connection { sender: FrameSender::new(to_peer), events: from_peer }) }
            .boxed()
    }
}

impl DirectPeer {
    /// Encodes and delivers `envelope` to the bridge.
    pub fn send(&self, envelope: &Envelope) -> Result<(), BridgeError> {
        self.send_raw(codec::encode(envelope)?)
    }

    /// Delivers raw bytes, malformed or not.
    pub fn send_raw(&self, frame: Vec<u8>) -> Result<(), BridgeError> {
        self.to_bridge
            .send(TransportEvent::Frame(frame))
            .map_err(|_| TransportError::SendFailed.into())
    }

    /// Next envelope from the bridge, or `None` once the bridge closed the link.
    ///
    /// Frames that fail to decode are logged and skipped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let frame = self.from_bridge.recv().await?;
            match codec::decode(&frame) {
                Ok(envelope) => return Some(envelope),
                Err(e) => warn!("Peer dropped malformed frame: {e}"),
            }
        }
    }

    /// Next envelope if one is already queued.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        while let Ok(frame) = self.from_bridge.try_recv() {
            if let Ok(envelope) = codec::decode(&frame) {
                return Some(envelope);
            }
        }
        None
    }

    /// Completes once the bridge has stopped reading this link.
    pub async fn closed(&self) {
        self.to_bridge.closed().await
    }

    /// Hangs up, as a debugger closing its socket would.
    pub fn close(&self, reason: Option<String>) {
        let _ = self.to_bridge.send(TransportEvent::Closed { reason });
    }
}
