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

//! The bridge engine.
//!
//! [`Bridge`] owns at most one debugger [`Session`]. The execution engine reports
//! events through [`Bridge::on_engine_event`] and awaits the result; frames from
//! the debugger arrive through [`Bridge::on_peer_message`], normally driven by the
//! reader task spawned on attach.
//!
//! All session state sits behind one `parking_lot` mutex that is never held across
//! an await point.

mod handlers;
mod session;

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, RwLock};
use sdb_common::{codec, triggers, AddressKey, CannedResponse, Content, Envelope, MessageType, RequestId};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use self::{
    handlers::{Dispatch, Followup},
    session::Session,
};
use crate::{
    commands::{error_reply, reply, CODE_INJECTED, STORAGE_ERROR, STORAGE_RETRIEVED},
    config::{BridgeConfig, TransportConfig},
    correlation::{Continuation, Resolution, Resumer},
    host::{EngineEvent, EvmHost, EventOutcome},
    policy::{self, Decision},
    state::DebuggerState,
    transport::{Transport, TransportEvent},
    BridgeError, TransportError,
};

/// Bridge between an execution engine and one debugger.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

struct Inner {
    config: BridgeConfig,
    skip_gas_estimation: AtomicBool,
    generation: AtomicU64,
    shared: Mutex<Shared>,
    host: RwLock<Option<Arc<dyn EvmHost>>>,
}

#[derive(Default)]
struct Shared {
    session: Option<Session>,
    /// Engine-reported runtime code, kept from construction until a session ends
    finalized: HashSet<AddressKey>,
}

impl Shared {
    /// Forwards on the live session, tearing it down if the link is gone.
    fn forward(
        &mut self,
        trigger: &str,
        content: Content,
    ) -> Result<oneshot::Receiver<Resolution>, BridgeError> {
        let Some(session) = self.session.as_mut() else {
            return Err(BridgeError::SessionClosed);
        };
        let result = session.forward(trigger, content);
        if matches!(result, Err(BridgeError::Transport(_))) {
            self.close_on_error();
        }
        result
    }

    fn close_on_error(&mut self) {
        if let Some(session) = self.session.take() {
            self.finalized.clear();
            let peer = session.peer.clone();
            let failed = session.teardown();
            error!("Lost debugger {peer}; failed {failed} paused event(s)");
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.inner.config)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Creates a bridge with no debugger attached.
    pub fn new(config: BridgeConfig) -> Self {
        let skip_gas_estimation = AtomicBool::new(config.skip_gas_estimation);
        Self {
            inner: Arc::new(Inner {
                config,
                skip_gas_estimation,
                generation: AtomicU64::new(0),
                shared: Mutex::new(Shared::default()),
                host: RwLock::new(None),
            }),
        }
    }

    /// Configuration the bridge was created with.
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Connects the debugger described by `transport`.
    ///
    /// `on_ready` runs exactly once, after the session is live.
    pub async fn attach(
        &self,
        transport: &TransportConfig,
        on_ready: impl FnOnce(),
    ) -> Result<(), BridgeError> {
        self.attach_with(transport.build(), on_ready).await
    }

    /// Connects over an already constructed transport.
    pub async fn attach_with(
        &self,
        transport: Box<dyn Transport>,
        on_ready: impl FnOnce(),
    ) -> Result<(), BridgeError> {
        if self.is_connected() {
            return Err(TransportError::AlreadyConnected.into());
        }

        let peer = transport.describe();
        let deadline = self.inner.config.connect_timeout;
        debug!("Attaching debugger ({peer}), deadline {deadline:?}");
        let connection = match tokio::time::timeout(deadline, transport.connect()).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                error!("Failed to attach debugger ({peer}): {e}");
                return Err(e.into());
            }
            Err(_) => {
                error!("Debugger ({peer}) did not connect within {deadline:?}");
                return Err(TransportError::Timeout(deadline).into());
            }
        };

        let (generation, ended) = {
            let mut shared = self.inner.shared.lock();
            if shared.session.is_some() {
                return Err(TransportError::AlreadyConnected.into());
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let runtime_addresses = shared.finalized.clone();
            let (session, ended) =
                Session::new(generation, peer.clone(), connection.sender, runtime_addresses);
            shared.session = Some(session);
            (generation, ended)
        };

        tokio::spawn(self.clone().pump(generation, connection.events, ended));
        info!("Debugger attached ({peer})");
        on_ready();
        Ok(())
    }

    /// Feeds frames from the transport until it closes or the session is dropped,
    /// then ends the session.
    async fn pump(
        self,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut ended: oneshot::Receiver<()>,
    ) {
        let reason = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(TransportEvent::Frame(frame)) => self.receive(generation, &frame),
                    Some(TransportEvent::Closed { reason }) => break reason,
                    None => break None,
                },
                _ = &mut ended => {
                    debug!("Reader for session {generation} stopped");
                    return;
                }
            }
        };
        self.end_session(Some(generation), reason.as_deref());
    }

    /// Registers the engine services used by `getStorage` and `injectNewCode`.
    pub fn attach_evm(&self, host: Arc<dyn EvmHost>) {
        *self.inner.host.write() = Some(host);
    }

    fn host(&self) -> Option<Arc<dyn EvmHost>> {
        self.inner.host.read().clone()
    }

    /// Whether a debugger is attached.
    pub fn is_connected(&self) -> bool {
        self.inner.shared.lock().session.is_some()
    }

    /// Current fast-step mode. `true` when no debugger is attached.
    pub fn fast_step(&self) -> bool {
        self.inner.shared.lock().session.as_ref().is_none_or(|s| s.state.fast_step)
    }

    /// Snapshot of the debugger state, if a debugger is attached.
    pub fn state(&self) -> Option<DebuggerState> {
        self.inner.shared.lock().session.as_ref().map(|s| s.state.clone())
    }

    /// Number of requests awaiting an answer in either direction.
    pub fn pending_requests(&self) -> usize {
        self.inner.shared.lock().session.as_ref().map_or(0, |s| s.pending.len())
    }

    /// Turns skipping of gas-estimation steps on or off.
    pub fn set_skip_gas_estimation(&self, skip: bool) {
        self.inner.skip_gas_estimation.store(skip, Ordering::Relaxed);
    }

    /// Whether gas-estimation steps are skipped.
    pub fn skip_gas_estimation(&self) -> bool {
        self.inner.skip_gas_estimation.load(Ordering::Relaxed)
    }

    /// Reports an engine event and waits until the debugger lets the engine go on.
    ///
    /// Returns immediately with [`EventOutcome::Skipped`] when the step policy lets
    /// the event through, and with [`EventOutcome::Disconnected`] when no debugger is
    /// attached. A session ending while the event is paused yields
    /// [`BridgeError::SessionClosed`].
    pub async fn on_engine_event(&self, event: EngineEvent) -> Result<EventOutcome, BridgeError> {
        let rx = {
            let mut shared = self.inner.shared.lock();
            let Some(session) = shared.session.as_mut() else {
                return Ok(EventOutcome::Disconnected(CannedResponse::disconnected()));
            };

            match event {
                EngineEvent::Step(step) => {
                    let decision = policy::evaluate(
                        &step,
                        &session.state,
                        self.skip_gas_estimation(),
                        self.inner.config.breakpoint_scope,
                    );
                    match decision {
                        Decision::Skip => return Ok(EventOutcome::Skipped),
                        Decision::Forward { special_events } => {
                            let content = step.into_content(&special_events);
                            shared.forward(triggers::STEP, content)?
                        }
                        Decision::RunUntilHit { request_id } => {
                            session.state.run_until = None;
                            let content = step.into_content(&[]);
                            match self.run_until_hit(session, request_id, content) {
                                Ok(rx) => rx,
                                Err(e) => {
                                    shared.close_on_error();
                                    return Err(e);
                                }
                            }
                        }
                    }
                }
                event => {
                    let trigger = event.trigger();
                    shared.forward(trigger, event.into_content())?
                }
            }
        };

        match rx.await {
            Ok(Ok(envelope)) => Ok(EventOutcome::Resumed(envelope)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BridgeError::ContinuationDropped),
        }
    }

    /// Answers the pending `runUntilPc` with the step that reached its target, then
    /// parks this step under the same id so the debugger's next answer resumes it.
    fn run_until_hit(
        &self,
        session: &mut Session,
        request_id: RequestId,
        content: Content,
    ) -> Result<oneshot::Receiver<Resolution>, BridgeError> {
        info!("Run-until target reached, answering {request_id}");
        session.send(&Envelope::response(request_id.clone(), content))?;
        let (resumer, rx) = Resumer::channel();
        session.pending.reassign(request_id, Continuation::Resume(resumer));
        Ok(rx)
    }

    /// Handles one frame from the debugger.
    ///
    /// Malformed frames are dropped. Responses resolve the paused event they
    /// answer; requests are dispatched to their handler.
    pub fn on_peer_message(&self, frame: &[u8]) {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.receive(generation, frame);
    }

    fn receive(&self, generation: u64, frame: &[u8]) {
        let envelope = match codec::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed frame from debugger: {e}");
                return;
            }
        };

        let followup = {
            let mut shared = self.inner.shared.lock();
            let Some(session) = shared.session.as_mut().filter(|s| s.generation == generation)
            else {
                debug!("Dropping frame {} for a closed session", envelope.id);
                return;
            };

            let result = match envelope.message_type {
                MessageType::Response => {
                    Self::on_response(session, envelope);
                    Ok(None)
                }
                MessageType::Request => Dispatch {
                    session,
                    host: self.host(),
                    scope_mode: self.inner.config.breakpoint_scope,
                }
                .handle(envelope),
            };
            match result {
                Ok(followup) => followup,
                Err(e) => {
                    warn!("Failed to answer debugger: {e}");
                    if matches!(e, BridgeError::Transport(_)) {
                        shared.close_on_error();
                    }
                    None
                }
            }
        };

        if let Some(followup) = followup {
            self.run_followup(generation, followup);
        }
    }

    /// Resolves a paused event. A `fastStep` field in the response updates the
    /// fast-step mode first.
    fn on_response(session: &mut Session, envelope: Envelope) {
        if !session.pending.contains(&envelope.id) {
            warn!("Ignoring response to unknown request {}", envelope.id);
            return;
        }
        session.apply_fast_step(&envelope.content);
        session.pending.resolve(envelope);
    }

    fn run_followup(&self, generation: u64, followup: Followup) {
        match followup {
            Followup::Inject { host, injection, reply_to } => {
                let content = match host.inject_code(injection) {
                    Ok(()) => reply(CODE_INJECTED),
                    Err(e) => {
                        warn!("Code injection failed: {e}");
                        error_reply(e)
                    }
                };
                self.reply(generation, reply_to, content);
            }
            Followup::ReadStorage { host, address, slot, reply_to } => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    self.reply(generation, reply_to, error_reply("no async runtime"));
                    return;
                };
                let read = host.get_contract_storage(address, slot);
                let bridge = self.clone();
                runtime.spawn(async move {
                    let mut content = Content::object();
                    match read.await {
                        Ok(value) => {
                            content.set("message", STORAGE_RETRIEVED);
                            content.set("value", format!("{value:#x}"));
                        }
                        Err(e) => {
                            warn!("Storage read of {address} slot {slot} failed: {e}");
                            content.set("message", STORAGE_ERROR);
                            content.set("value", Value::Null);
                        }
                    }
                    bridge.reply(generation, reply_to, content);
                });
            }
        }
    }

    /// Answers a request on the session it arrived on, if that session is still live.
    fn reply(&self, generation: u64, id: RequestId, content: Content) {
        let mut shared = self.inner.shared.lock();
        let Some(session) = shared.session.as_mut().filter(|s| s.generation == generation) else {
            debug!("Session gone before request {id} could be answered");
            return;
        };
        if let Err(e) = session.reply(id, content) {
            warn!("Failed to answer debugger: {e}");
            shared.close_on_error();
        }
    }

    /// Sends the compiler output to the debugger and waits for the acknowledgement.
    ///
    /// Best effort: failures are logged, never returned.
    pub async fn link_compiler_output(&self, source_root: &str, compilation: Value) {
        let content = Content::from_value(json!({
            "sourceRootPath": source_root,
            "compilationResult": compilation,
        }));
        match self.request(triggers::LINK_COMPILER_OUTPUT, content).await {
            Ok(EventOutcome::Resumed(_)) => info!("Compilation results received"),
            Ok(_) => warn!("Cannot send compilation results, debugger is not connected"),
            Err(e) => warn!("Cannot send compilation results: {e}"),
        }
    }

    /// Tells the debugger where contract `name` was deployed.
    ///
    /// Best effort: failures are logged, never returned.
    pub async fn link_contract_address(&self, name: &str, address: &str) {
        let address = AddressKey::new(address);
        let mut content = Content::object();
        content.set("contractName", name);
        content.set("address", address.as_str());
        match self.request(triggers::LINK_CONTRACT_ADDRESS, content).await {
            Ok(EventOutcome::Resumed(_)) => info!("Contract address ({name}, {address}) received"),
            Ok(_) => {
                warn!("Cannot send contract address ({name}, {address}), debugger is not connected")
            }
            Err(e) => warn!("Cannot send contract address ({name}, {address}): {e}"),
        }
    }

    /// Checks that the debugger is alive.
    ///
    /// Resolves with the debugger's answer, or with the canned disconnected
    /// response when no debugger is attached. The request stays pending until it
    /// is answered; wrap the call in [`tokio::time::timeout`] to bound the wait.
    pub async fn ping(&self) -> Result<EventOutcome, BridgeError> {
        let outcome = self.request(triggers::PING, Content::object()).await;
        match &outcome {
            Ok(EventOutcome::Resumed(_)) => debug!("Debugger answered ping"),
            Ok(_) => debug!("Ping without a debugger attached"),
            Err(e) => warn!("Ping failed: {e}"),
        }
        outcome
    }

    async fn request(&self, trigger: &str, content: Content) -> Result<EventOutcome, BridgeError> {
        let rx = {
            let mut shared = self.inner.shared.lock();
            if shared.session.is_none() {
                return Ok(EventOutcome::Disconnected(CannedResponse::disconnected()));
            }
            shared.forward(trigger, content)?
        };
        match rx.await {
            Ok(Ok(envelope)) => Ok(EventOutcome::Resumed(envelope)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BridgeError::ContinuationDropped),
        }
    }

    /// Marks `address` as running finalized runtime code.
    pub fn report_contract_finalized(&self, address: impl Into<AddressKey>) {
        let address = address.into();
        debug!("Contract {address} finalized");
        let mut shared = self.inner.shared.lock();
        if let Some(session) = shared.session.as_mut() {
            session.state.runtime_addresses.insert(address.clone());
        }
        shared.finalized.insert(address);
    }

    /// Drops the debugger. Paused events fail with [`BridgeError::SessionClosed`].
    pub fn disconnect(&self) {
        self.end_session(None, Some("disconnect requested"));
    }

    fn end_session(&self, generation: Option<u64>, reason: Option<&str>) {
        let session = {
            let mut shared = self.inner.shared.lock();
            let current = shared
                .session
                .as_ref()
                .is_some_and(|s| generation.is_none_or(|g| g == s.generation));
            if current {
                shared.finalized.clear();
                shared.session.take()
            } else {
                None
            }
        };
        if let Some(session) = session {
            let peer = session.peer.clone();
            let failed = session.teardown();
            info!(
                "Debugger detached ({peer}): {}; failed {failed} paused event(s)",
                reason.unwrap_or("connection closed")
            );
        }
    }
}
