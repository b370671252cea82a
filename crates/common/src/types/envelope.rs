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

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Content;

/// Trigger tags carried in an envelope's `triggerType`.
pub mod triggers {
    /// Single-instruction step event.
    pub const STEP: &str = "step";
    /// A contract is being created.
    pub const NEW_CONTRACT: &str = "newContract";
    /// A block is about to be processed.
    pub const BEFORE_BLOCK: &str = "beforeBlock";
    /// A block finished processing.
    pub const AFTER_BLOCK: &str = "afterBlock";
    /// A transaction is about to run.
    pub const BEFORE_TX: &str = "beforeTx";
    /// A transaction finished running.
    pub const AFTER_TX: &str = "afterTx";
    /// The engine raised an exception.
    pub const EXCEPTION: &str = "exception";
    /// Compiler output handed to the debugger.
    pub const LINK_COMPILER_OUTPUT: &str = "linkCompilerOutput";
    /// Contract name to deployed address mapping handed to the debugger.
    pub const LINK_CONTRACT_ADDRESS: &str = "linkContractAddress";
    /// Liveness check sent to the debugger.
    pub const PING: &str = "ping";
    /// Any response envelope.
    pub const RESPONSE: &str = "response";
}

/// Opaque, unique envelope identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// A fresh random (UUID v4, 122 random bits) identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Direction of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Expects exactly zero or one response with the same id.
    Request,
    /// Answers the request with the same id.
    Response,
}

/// The wire-level message wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Correlation identifier.
    pub id: RequestId,
    /// Request or response.
    pub message_type: MessageType,
    /// What caused this message, see [`triggers`].
    pub trigger_type: String,
    /// Structured payload; may contain back-references.
    pub content: Content,
}

impl Envelope {
    /// A new request with a random id.
    pub fn request(trigger_type: impl Into<String>, content: Content) -> Self {
        Self {
            id: RequestId::random(),
            message_type: MessageType::Request,
            trigger_type: trigger_type.into(),
            content,
        }
    }

    /// A response answering the request `id`.
    pub fn response(id: RequestId, content: Content) -> Self {
        Self {
            id,
            message_type: MessageType::Response,
            trigger_type: triggers::RESPONSE.to_string(),
            content,
        }
    }

    /// Whether this is a request.
    pub fn is_request(&self) -> bool {
        self.message_type == MessageType::Request
    }
}

/// Canned `{status, data}` answer returned synchronously when no debugger is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CannedResponse {
    /// Always `"error"` for canned answers.
    pub status: String,
    /// Short machine-readable reason.
    pub data: String,
}

impl CannedResponse {
    /// `{status: "error", data: "disconnected"}`
    pub fn disconnected() -> Self {
        Self { status: "error".to_string(), data: "disconnected".to_string() }
    }

    /// Whether this is the disconnected answer.
    pub fn is_disconnected(&self) -> bool {
        self.status == "error" && self.data == "disconnected"
    }
}
