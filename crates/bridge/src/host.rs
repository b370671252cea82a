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

//! Engine-facing interface.
//!
//! The execution engine reports [`EngineEvent`]s to the bridge and awaits the
//! returned future; that await is the pause. Storage reads and code hot-swaps
//! requested by the debugger go back to the engine through [`EvmHost`].

use alloy_primitives::{Address, Bytes, U256};
use futures::future::BoxFuture;
use sdb_common::{triggers, AddressKey, CannedResponse, Content, Envelope, RequestId};
use serde_json::{json, Value};

use crate::{correlation::Resumer, policy::SpecialEvent};

/// A single-instruction event.
#[derive(Debug, Clone)]
pub struct StepEvent {
    /// Program counter
    pub pc: u64,
    /// Executing contract
    pub address: AddressKey,
    /// Mnemonic, e.g. `JUMPDEST`
    pub opcode: String,
    /// Whether the engine is running a gas estimation
    pub estimating_gas: bool,
    /// Remaining engine context (stack, memory, call frame...), forwarded as is
    pub context: Content,
}

impl StepEvent {
    /// Step with an empty context, not under gas estimation.
    pub fn new(address: impl Into<AddressKey>, pc: u64, opcode: impl Into<String>) -> Self {
        Self {
            pc,
            address: address.into(),
            opcode: opcode.into(),
            estimating_gas: false,
            context: Content::object(),
        }
    }

    /// Sets the engine context forwarded with the step.
    pub fn with_context(mut self, context: Content) -> Self {
        self.context = context;
        self
    }

    /// Marks the step as raised during gas estimation.
    pub fn with_estimating_gas(mut self, estimating_gas: bool) -> Self {
        self.estimating_gas = estimating_gas;
        self
    }

    /// Wire content of the step: the engine context with `pc`, `address`,
    /// `opcode.name` and `specialEvents` set on top.
    pub fn into_content(self, special_events: &[SpecialEvent]) -> Content {
        let mut content = self.context;
        content.set("pc", self.pc);
        content.set("address", self.address.as_str());
        content.set("opcode", json!({ "name": self.opcode }));
        content.set(
            "specialEvents",
            Value::Array(special_events.iter().map(|tag| tag.as_str().into()).collect()),
        );
        content
    }
}

/// Events raised by the execution engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// An instruction is about to execute
    Step(StepEvent),
    /// Contract code was created
    NewContract {
        /// Address the code lives at
        address: AddressKey,
        /// Creation code
        code: Bytes,
    },
    /// A block is about to be processed
    BeforeBlock(Content),
    /// A block was processed
    AfterBlock(Content),
    /// A transaction is about to run
    BeforeTx(Content),
    /// A transaction finished
    AfterTx(Content),
    /// Execution raised an exception
    Exception(Content),
}

impl EngineEvent {
    /// `triggerType` the event is sent under.
    pub fn trigger(&self) -> &'static str {
        match self {
            Self::Step(_) => triggers::STEP,
            Self::NewContract { .. } => triggers::NEW_CONTRACT,
            Self::BeforeBlock(_) => triggers::BEFORE_BLOCK,
            Self::AfterBlock(_) => triggers::AFTER_BLOCK,
            Self::BeforeTx(_) => triggers::BEFORE_TX,
            Self::AfterTx(_) => triggers::AFTER_TX,
            Self::Exception(_) => triggers::EXCEPTION,
        }
    }

    /// Wire content of a non-step event.
    pub(crate) fn into_content(self) -> Content {
        match self {
            Self::Step(step) => step.into_content(&[]),
            Self::NewContract { address, code } => {
                let mut content = Content::object();
                content.set("address", address.as_str());
                content.set("code", hex::encode(&code));
                content
            }
            Self::BeforeBlock(content)
            | Self::AfterBlock(content)
            | Self::BeforeTx(content)
            | Self::AfterTx(content)
            | Self::Exception(content) => content,
        }
    }
}

/// What the engine gets back from [`Bridge::on_engine_event`](crate::Bridge::on_engine_event).
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Not forwarded; the engine continues right away.
    Skipped,
    /// Forwarded and answered by the debugger.
    Resumed(Envelope),
    /// No debugger attached.
    Disconnected(CannedResponse),
}

impl EventOutcome {
    /// The debugger's response, if there was one.
    pub fn response(&self) -> Option<&Envelope> {
        match self {
            Self::Resumed(envelope) => Some(envelope),
            _ => None,
        }
    }
}

/// New code for a running contract, handed to the engine by the debugger.
///
/// When the debugger named a paused step (`stepId`), its continuation travels
/// with the request and the engine resumes the step once the code is swapped in.
/// Dropping the request without resuming fails the paused step.
#[derive(Debug)]
pub struct CodeInjection {
    /// The paused step this injection belongs to
    pub step_id: Option<RequestId>,
    /// The `injectNewCode` request content
    pub content: Content,
    resumer: Option<Resumer>,
}

impl CodeInjection {
    pub(crate) fn new(step_id: Option<RequestId>, content: Content, resumer: Option<Resumer>) -> Self {
        Self { step_id, content, resumer }
    }

    /// Whether a paused step is waiting on this injection.
    pub fn has_paused_step(&self) -> bool {
        self.resumer.is_some()
    }

    /// Resumes the paused step, if any, with an empty response.
    pub fn resume(mut self) -> bool {
        let Some(resumer) = self.resumer.take() else { return false };
        let id = self.step_id.take().unwrap_or_else(RequestId::random);
        resumer.resume(Envelope::response(id, Content::object()));
        true
    }
}

/// Engine services the debugger can request through the bridge.
pub trait EvmHost: Send + Sync {
    /// Reads storage slot `slot` of `address`.
    fn get_contract_storage(&self, address: Address, slot: U256) -> BoxFuture<'static, eyre::Result<U256>>;

    /// Hot-swaps code. Returning an error fails the paused step, if any.
    fn inject_code(&self, injection: CodeInjection) -> eyre::Result<()>;
}
