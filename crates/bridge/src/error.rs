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

//! Error taxonomy of the bridge.
//!
//! Only [`TransportError`] ends a session. Codec failures drop a single frame,
//! a missing debugger is answered with a canned response rather than an error, and
//! engine-side problems are reported back to the debugger inside a reply.

use std::time::Duration;

use sdb_common::{CodecError, RequestId};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures of the physical link to the debugger. Fatal to the session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Accepting the inbound connection failed
    #[error("failed to accept debugger connection: {0}")]
    Accept(#[source] std::io::Error),

    /// WebSocket handshake or dial failed
    #[error("websocket handshake with {endpoint} failed: {source}")]
    Handshake {
        /// Remote endpoint or URL
        endpoint: String,
        /// Underlying protocol error
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// The peer did not show up within the configured deadline
    #[error("debugger connection not established within {0:?}")]
    Timeout(Duration),

    /// A frame could not be handed to the transport
    #[error("transport closed while sending")]
    SendFailed,

    /// `attach` was called while a debugger is already connected
    #[error("a debugger is already attached")]
    AlreadyConnected,
}

/// Errors surfaced by bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Link failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame could not be encoded or decoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The session ended while an engine event was waiting for its response
    #[error("debugger session closed before the request was answered")]
    SessionClosed,

    /// The continuation for a paused event was dropped without being resumed
    #[error("paused event was released without a resume")]
    ContinuationDropped,

    /// A request id was registered twice
    #[error("request id {0} is already pending")]
    DuplicateRequest(RequestId),
}
