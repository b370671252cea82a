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

//! Step decision policy.
//!
//! [`evaluate`] decides whether a single-instruction event must pause the engine
//! and be forwarded to the debugger. It only reads [`DebuggerState`]; all
//! resulting mutations (clearing the run-until cursor, re-homing continuations)
//! are carried out by the bridge.

use std::fmt::{self, Display};

use sdb_common::RequestId;
use serde::{Deserialize, Serialize};

use crate::{config::BreakpointScopeMode, host::StepEvent, state::DebuggerState};

/// Why a forwarded step woke the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecialEvent {
    /// Call-type instruction whose callstack and parameters the debugger tracks
    SpecialEvent,
    /// Entry into a function body
    FnJumpDestination,
    /// Any other jump, conditional jump or jump target
    Jump,
    /// Variable declaration site
    Declaration,
    /// Live breakpoint
    Breakpoint,
}

impl SpecialEvent {
    /// Tag name as sent in `specialEvents`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpecialEvent => "specialEvent",
            Self::FnJumpDestination => "fnJumpDestination",
            Self::Jump => "jump",
            Self::Declaration => "declaration",
            Self::Breakpoint => "breakpoint",
        }
    }
}

impl Display for SpecialEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the policy for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the engine proceed.
    Skip,
    /// Forward the step and block until the debugger answers.
    Forward {
        /// Reasons, in evaluation order. Empty in single-step mode.
        special_events: Vec<SpecialEvent>,
    },
    /// The pending run-until target was reached.
    RunUntilHit {
        /// Id of the `runUntilPc` request to answer.
        request_id: RequestId,
    },
}

impl Decision {
    /// Whether the engine will be paused.
    pub fn blocks(&self) -> bool {
        !matches!(self, Self::Skip)
    }
}

/// Call-type instructions that change the callstack in ways the debugger follows.
fn is_special_call(opcode: &str) -> bool {
    opcode == "DELEGATECALL"
}

fn is_jump(opcode: &str) -> bool {
    matches!(opcode, "JUMP" | "JUMPI" | "JUMPDEST")
}

/// Evaluates the policy for `step`.
///
/// Rules are applied in order: gas-estimation suppression, the run-until cursor,
/// tag accumulation, single-step mode. The first rule that decides wins; tags are
/// accumulated independently of each other.
pub fn evaluate(
    step: &StepEvent,
    state: &DebuggerState,
    skip_gas_estimation: bool,
    scope_mode: BreakpointScopeMode,
) -> Decision {
    if skip_gas_estimation && step.estimating_gas {
        return Decision::Skip;
    }

    if let Some(cursor) = &state.run_until {
        return if step.pc == cursor.target_pc {
            Decision::RunUntilHit { request_id: cursor.request_id.clone() }
        } else {
            Decision::Skip
        };
    }

    let opcode = step.opcode.as_str();
    let mut special_events = Vec::new();
    if is_special_call(opcode) {
        special_events.push(SpecialEvent::SpecialEvent);
    }
    if state.jump_destinations.contains(&step.address, step.pc) {
        special_events.push(SpecialEvent::FnJumpDestination);
    } else if is_jump(opcode) {
        special_events.push(SpecialEvent::Jump);
    }
    if state.declarations.contains(&step.address, step.pc) {
        special_events.push(SpecialEvent::Declaration);
    }
    if breakpoint_hit(step, state, scope_mode) {
        special_events.push(SpecialEvent::Breakpoint);
    }

    if !special_events.is_empty() || !state.fast_step {
        Decision::Forward { special_events }
    } else {
        Decision::Skip
    }
}

fn breakpoint_hit(step: &StepEvent, state: &DebuggerState, scope_mode: BreakpointScopeMode) -> bool {
    match scope_mode {
        BreakpointScopeMode::Scoped => {
            state.breakpoints.hits(&step.address, step.pc, state.is_runtime(&step.address))
        }
        BreakpointScopeMode::ScopeInsensitive => {
            state.breakpoints.iter().any(|bp| bp.is_at(&step.address, step.pc))
        }
    }
}
