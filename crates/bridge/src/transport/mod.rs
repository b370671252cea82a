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

//! Transports carrying frames between the bridge and its single debugger peer.
//!
//! A [`Transport`] is consumed by connecting it. The resulting [`Connection`] is a
//! pair of channels: frames pushed into [`FrameSender`] go to the peer, frames and
//! the final close notification from the peer arrive as [`TransportEvent`]s.
//! Dropping the sender closes the link.

mod direct;
mod ws;

pub use direct::{pair, DirectPeer, DirectTransport};
pub use ws::{WsClientTransport, WsServerTransport};

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::TransportError;

/// A way of reaching exactly one debugger.
pub trait Transport: Send {
    /// Human readable endpoint, used in logs.
    fn describe(&self) -> String;

    /// Establishes the link. Deadlines are enforced by the caller.
    fn connect(self: Box<Self>) -> BoxFuture<'static, Result<Connection, TransportError>>;
}

/// Something that happened on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete frame from the peer
    Frame(Vec<u8>),
    /// The link is gone; nothing follows
    Closed {
        /// Close reason, if the peer or the error gave one
        reason: Option<String>,
    },
}

/// Outbound half of a connection.
#[derive(Debug, Clone)]
pub struct FrameSender(mpsc::UnboundedSender<Vec<u8>>);

impl FrameSender {
    /// Wraps the channel feeding a transport's writer.
    pub fn new(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self(tx)
    }

    /// Queues a frame for the peer.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.0.send(frame).map_err(|_| TransportError::SendFailed)
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// An established link.
#[derive(Debug)]
pub struct Connection {
    /// Frames to the peer
    pub sender: FrameSender,
    /// Frames and close notification from the peer
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}
