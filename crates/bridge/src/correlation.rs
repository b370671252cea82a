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

//! Request/response correlation.
//!
//! Every envelope the bridge sends as a request, and every request the debugger
//! sends to the bridge, occupies one entry keyed by its id until it is answered.
//! Responses are matched purely by id, so the debugger may answer in any order.

use std::collections::HashMap;

use sdb_common::{Envelope, RequestId};
use tokio::sync::oneshot;
use tracing::trace;

use crate::BridgeError;

/// Outcome delivered to a paused engine event.
pub type Resolution = Result<Envelope, BridgeError>;

/// Resumes exactly one paused engine event.
///
/// Dropping a `Resumer` without calling [`Resumer::resume`] wakes the waiting event
/// with [`BridgeError::ContinuationDropped`] instead of leaving it hanging.
#[derive(Debug)]
pub struct Resumer(oneshot::Sender<Resolution>);

impl Resumer {
    /// A resumer and the receiver the paused event awaits.
    pub fn channel() -> (Self, oneshot::Receiver<Resolution>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Resumes the paused event with the debugger's response.
    pub fn resume(self, envelope: Envelope) {
        self.settle(Ok(envelope));
    }

    /// Fails the paused event.
    pub fn fail(self, error: BridgeError) {
        self.settle(Err(error));
    }

    fn settle(self, resolution: Resolution) {
        if self.0.send(resolution).is_err() {
            trace!("Paused event gave up waiting before it was resumed");
        }
    }
}

/// What to do when the response for an id arrives.
#[derive(Debug)]
pub enum Continuation {
    /// An engine event is paused on this id.
    Resume(Resumer),
    /// A debugger-originated request the bridge still has to answer.
    AwaitingReply,
}

/// Map of in-flight request ids.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: HashMap<RequestId, Continuation>,
}

impl CorrelationTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `id`. A live id cannot be registered twice.
    pub fn register(&mut self, id: RequestId, continuation: Continuation) -> Result<(), BridgeError> {
        if self.entries.contains_key(&id) {
            return Err(BridgeError::DuplicateRequest(id));
        }
        self.entries.insert(id, continuation);
        Ok(())
    }

    /// Invokes and removes the continuation for the response's id.
    ///
    /// Returns `false` for unknown ids (late or duplicate responses), which are
    /// otherwise ignored.
    pub fn resolve(&mut self, envelope: Envelope) -> bool {
        match self.entries.remove(&envelope.id) {
            Some(Continuation::Resume(resumer)) => {
                resumer.resume(envelope);
                true
            }
            Some(Continuation::AwaitingReply) => true,
            None => false,
        }
    }

    /// Forgets `id` without invoking anything.
    pub fn drop(&mut self, id: &RequestId) {
        self.entries.remove(id);
    }

    /// Removes and returns the continuation for `id`.
    pub fn take(&mut self, id: &RequestId) -> Option<Continuation> {
        self.entries.remove(id)
    }

    /// Puts `continuation` under `id`, returning whatever was there before.
    pub fn reassign(&mut self, id: RequestId, continuation: Continuation) -> Option<Continuation> {
        self.entries.insert(id, continuation)
    }

    /// Whether `id` is in flight.
    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of in-flight ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empties the table, failing every paused event with the error from `error`.
    pub fn fail_all(&mut self, error: impl Fn() -> BridgeError) -> usize {
        let mut failed = 0;
        for (_, continuation) in self.entries.drain() {
            if let Continuation::Resume(resumer) = continuation {
                resumer.fail(error());
                failed += 1;
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdb_common::{triggers, Content};

    fn response(id: &RequestId, message: &str) -> Envelope {
        let mut content = Content::object();
        content.set("message", message);
        Envelope::response(id.clone(), content)
    }

    #[test]
    fn test_resolve_invokes_exactly_once() {
        let mut table = CorrelationTable::new();
        let id = RequestId::random();
        let (resumer, mut rx) = Resumer::channel();
        table.register(id.clone(), Continuation::Resume(resumer)).unwrap();

        assert!(table.resolve(response(&id, "first")));
        assert!(!table.resolve(response(&id, "second")));
        assert!(table.is_empty());

        let envelope = rx.try_recv().unwrap().unwrap();
        assert_eq!(envelope.content.root().get("message").unwrap().as_str(), Some("first"));
    }

    #[test]
    fn test_register_rejects_live_id() {
        let mut table = CorrelationTable::new();
        let id = RequestId::from("dup");
        table.register(id.clone(), Continuation::AwaitingReply).unwrap();
        assert!(matches!(
            table.register(id, Continuation::AwaitingReply),
            Err(BridgeError::DuplicateRequest(_))
        ));
    }

    #[test]
    fn test_out_of_order_responses() {
        let mut table = CorrelationTable::new();
        let step = Envelope::request(triggers::STEP, Content::object());
        let storage = RequestId::random();
        let (resumer, mut step_rx) = Resumer::channel();
        table.register(step.id.clone(), Continuation::Resume(resumer)).unwrap();
        table.register(storage.clone(), Continuation::AwaitingReply).unwrap();

        assert!(table.resolve(response(&storage, "storage")));
        assert!(step_rx.try_recv().is_err());
        assert!(table.resolve(response(&step.id, "step")));
        assert!(step_rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn test_reassign_moves_continuation() {
        let mut table = CorrelationTable::new();
        let step_id = RequestId::from("s1");
        let run_id = RequestId::from("r1");
        let (resumer, mut rx) = Resumer::channel();
        table.register(run_id.clone(), Continuation::AwaitingReply).unwrap();
        table.register(step_id.clone(), Continuation::Resume(resumer)).unwrap();

        let moved = table.take(&step_id).unwrap();
        assert!(matches!(table.reassign(run_id.clone(), moved), Some(Continuation::AwaitingReply)));
        assert!(!table.contains(&step_id));

        assert!(table.resolve(response(&run_id, "go")));
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn test_fail_all_wakes_every_paused_event() {
        let mut table = CorrelationTable::new();
        let (a, mut rx_a) = Resumer::channel();
        let (b, mut rx_b) = Resumer::channel();
        table.register(RequestId::random(), Continuation::Resume(a)).unwrap();
        table.register(RequestId::random(), Continuation::Resume(b)).unwrap();
        table.register(RequestId::random(), Continuation::AwaitingReply).unwrap();

        assert_eq!(table.fail_all(|| BridgeError::SessionClosed), 2);
        assert!(table.is_empty());
        assert!(matches!(rx_a.try_recv().unwrap(), Err(BridgeError::SessionClosed)));
        assert!(matches!(rx_b.try_recv().unwrap(), Err(BridgeError::SessionClosed)));
    }

    #[test]
    fn test_dropped_resumer_is_observable() {
        let (resumer, mut rx) = Resumer::channel();
        drop(resumer);
        assert!(rx.try_recv().is_err());
    }
}
