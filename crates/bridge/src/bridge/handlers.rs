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

//! Handlers for debugger-originated requests.
//!
//! Handlers run with the session locked and only touch in-memory state. Work that
//! calls into the engine is returned as a [`Followup`] and carried out by the
//! bridge after the lock is released.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use sdb_common::{Breakpoint, BreakpointScope, Envelope, RequestId};
use tracing::{debug, warn};

use super::session::Session;
use crate::{
    commands::{error_reply, reply, DebuggerCommand, DUPLICATE_ID, NO_ENGINE, OK},
    config::BreakpointScopeMode,
    correlation::Continuation,
    host::{CodeInjection, EvmHost},
    state::RunUntilCursor,
    BridgeError,
};

/// Engine work left over from a handler.
pub(super) enum Followup {
    Inject { host: Arc<dyn EvmHost>, injection: CodeInjection, reply_to: RequestId },
    ReadStorage { host: Arc<dyn EvmHost>, address: Address, slot: U256, reply_to: RequestId },
}

pub(super) struct Dispatch<'a> {
    pub(super) session: &'a mut Session,
    pub(super) host: Option<Arc<dyn EvmHost>>,
    pub(super) scope_mode: BreakpointScopeMode,
}

impl Dispatch<'_> {
    /// Handles one request. Every request is answered exactly once, `runUntilPc`
    /// only when its target is reached.
    pub(super) fn handle(self, request: Envelope) -> Result<Option<Followup>, BridgeError> {
        let id = request.id.clone();
        if let Err(e) = self.session.pending.register(id.clone(), Continuation::AwaitingReply) {
            // the pending entry keeps belonging to the earlier request
            warn!("Rejecting debugger request: {e}");
            self.session.send(&Envelope::response(id, error_reply(DUPLICATE_ID)))?;
            return Ok(None);
        }

        let command = match DebuggerCommand::parse(&request.content) {
            Ok(command) => command,
            Err(e) => {
                warn!("Malformed debugger request {id}: {e}");
                self.session.reply(id, error_reply(e))?;
                return Ok(None);
            }
        };
        debug!("Debugger request {id}: {}", command.name());

        let session = self.session;
        match command {
            DebuggerCommand::InjectNewCode { step_id } => {
                let Some(host) = self.host else {
                    session.reply(id, reply(NO_ENGINE))?;
                    return Ok(None);
                };
                let resumer = step_id.as_ref().and_then(|step| match session.pending.take(step) {
                    Some(Continuation::Resume(resumer)) => Some(resumer),
                    Some(Continuation::AwaitingReply) => {
                        // not a paused step; leave it alone
                        session.pending.reassign(step.clone(), Continuation::AwaitingReply);
                        None
                    }
                    None => None,
                });
                let injection = CodeInjection::new(step_id, request.content, resumer);
                return Ok(Some(Followup::Inject { host, injection, reply_to: id }));
            }
            DebuggerCommand::GetStorage { address, position } => {
                let Some(host) = self.host else {
                    session.reply(id, reply(NO_ENGINE))?;
                    return Ok(None);
                };
                let Some(account) = address.to_address() else {
                    session.reply(id, error_reply(format!("invalid address `{address}`")))?;
                    return Ok(None);
                };
                return Ok(Some(Followup::ReadStorage {
                    host,
                    address: account,
                    slot: position.0,
                    reply_to: id,
                }));
            }
            DebuggerCommand::SendBreakpoint { id: bp_id, address, pc, enabled, runtime } => {
                if enabled {
                    let Some(pc) = pc else {
                        session.reply(id, error_reply("missing field `pc`"))?;
                        return Ok(None);
                    };
                    let scope = match self.scope_mode {
                        BreakpointScopeMode::Scoped => runtime.map(BreakpointScope::from_runtime_flag),
                        BreakpointScopeMode::ScopeInsensitive => None,
                    };
                    session.state.breakpoints.enable(Breakpoint { id: bp_id, address, pc, scope });
                } else {
                    session.state.breakpoints.disable(&bp_id);
                }
            }
            DebuggerCommand::SendDeclarations { address, declarations } => {
                session.state.declarations.replace(address, declarations);
            }
            DebuggerCommand::SendJumpDestinations { address, jump_destinations } => {
                session.state.jump_destinations.replace(address, jump_destinations);
            }
            DebuggerCommand::RunUntilPc { step_id, pc } => {
                let cursor = RunUntilCursor { request_id: id, target_pc: pc };
                if let Some(previous) = session.state.run_until.replace(cursor) {
                    session.reply(previous.request_id, error_reply("superseded by a newer runUntilPc"))?;
                }
                // release the paused step; the engine now runs until `pc`
                if !session.pending.contains(&step_id) {
                    debug!("runUntilPc named step {step_id}, which is not paused");
                    return Ok(None);
                }
                session.apply_fast_step(&request.content);
                session.pending.resolve(Envelope::response(step_id, request.content));
                return Ok(None);
            }
            DebuggerCommand::Ping | DebuggerCommand::Unknown => {}
        }

        session.reply(id, reply(OK))?;
        Ok(None)
    }
}
