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

//! One debugger session.

use std::collections::HashSet;

use sdb_common::{codec, AddressKey, Content, Envelope, RequestId};
use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    correlation::{Continuation, CorrelationTable, Resolution, Resumer},
    state::DebuggerState,
    transport::FrameSender,
    BridgeError,
};

/// State scoped to one connected debugger. Dropping it closes the link and stops
/// the reader task.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) generation: u64,
    pub(crate) peer: String,
    pub(crate) state: DebuggerState,
    pub(crate) pending: CorrelationTable,
    sender: FrameSender,
    _shutdown: oneshot::Sender<()>,
}

impl Session {
    /// Creates a session. The returned receiver completes once the session is gone.
    pub(crate) fn new(
        generation: u64,
        peer: String,
        sender: FrameSender,
        runtime_addresses: HashSet<AddressKey>,
    ) -> (Self, oneshot::Receiver<()>) {
        let state = DebuggerState { runtime_addresses, ..Default::default() };
        let (shutdown, ended) = oneshot::channel();
        let session = Self {
            generation,
            peer,
            state,
            pending: CorrelationTable::new(),
            sender,
            _shutdown: shutdown,
        };
        (session, ended)
    }

    pub(crate) fn send(&self, envelope: &Envelope) -> Result<(), BridgeError> {
        self.sender.send(codec::encode(envelope)?)?;
        Ok(())
    }

    /// Sends a request and registers the continuation that its response resumes.
    pub(crate) fn forward(
        &mut self,
        trigger: &str,
        content: Content,
    ) -> Result<oneshot::Receiver<Resolution>, BridgeError> {
        let envelope = Envelope::request(trigger, content);
        let (resumer, rx) = Resumer::channel();
        self.pending.register(envelope.id.clone(), Continuation::Resume(resumer))?;
        if let Err(e) = self.send(&envelope) {
            self.pending.drop(&envelope.id);
            return Err(e);
        }
        debug!("Forwarded {trigger} as {}", envelope.id);
        Ok(rx)
    }

    /// Answers a debugger request and retires its id.
    pub(crate) fn reply(&mut self, id: RequestId, content: Content) -> Result<(), BridgeError> {
        self.pending.drop(&id);
        self.send(&Envelope::response(id, content))
    }

    /// Applies a `fastStep` flag carried by content that releases a paused event.
    pub(crate) fn apply_fast_step(&mut self, content: &Content) {
        let Some(fast_step) = content.root().get("fastStep").and_then(|v| v.as_bool()) else {
            return;
        };
        if fast_step != self.state.fast_step {
            debug!("Fast step {}", if fast_step { "on" } else { "off" });
        }
        self.state.fast_step = fast_step;
    }

    /// Fails every paused event. Returns how many there were.
    pub(crate) fn teardown(mut self) -> usize {
        self.pending.fail_all(|| BridgeError::SessionClosed)
    }
}
