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

//! Per-session debugger state.
//!
//! Everything here is written only by the bridge's request handlers and engine
//! hooks, and read by the step policy. A fresh [`DebuggerState`] is created for
//! every attached session and discarded on disconnect.

use std::collections::{HashMap, HashSet};

use sdb_common::{AddressKey, Breakpoint, BreakpointId, BreakpointScope, RequestId};
use tracing::debug;

/// Address to program-counter index (jump destinations, variable declarations).
#[derive(Debug, Clone, Default)]
pub struct AddressIndex {
    entries: HashMap<AddressKey, HashSet<u64>>,
}

impl AddressIndex {
    /// Replaces the whole entry for `address`.
    pub fn replace(&mut self, address: AddressKey, pcs: impl IntoIterator<Item = u64>) {
        self.entries.insert(address, pcs.into_iter().collect());
    }

    /// Whether `address` has `pc` indexed.
    pub fn contains(&self, address: &AddressKey, pc: u64) -> bool {
        self.entries.get(address).is_some_and(|pcs| pcs.contains(&pc))
    }

    /// The indexed pcs of `address`, if any were sent.
    pub fn get(&self, address: &AddressKey) -> Option<&HashSet<u64>> {
        self.entries.get(address)
    }
}

/// Live breakpoints, split by scope.
///
/// Uniqueness holds per `(id, address)` within each set.
#[derive(Debug, Clone, Default)]
pub struct BreakpointSet {
    creation: Vec<Breakpoint>,
    runtime: Vec<Breakpoint>,
    unscoped: Vec<Breakpoint>,
}

impl BreakpointSet {
    fn bucket_mut(&mut self, scope: Option<BreakpointScope>) -> &mut Vec<Breakpoint> {
        match scope {
            Some(BreakpointScope::Creation) => &mut self.creation,
            Some(BreakpointScope::Runtime) => &mut self.runtime,
            None => &mut self.unscoped,
        }
    }

    /// Adds `breakpoint` unless its `(id, address)` is already live in its set.
    /// Returns whether it was added.
    pub fn enable(&mut self, breakpoint: Breakpoint) -> bool {
        let bucket = self.bucket_mut(breakpoint.scope);
        if bucket.iter().any(|bp| bp.id == breakpoint.id && bp.address == breakpoint.address) {
            return false;
        }
        debug!("Breakpoint enabled: {breakpoint}");
        bucket.push(breakpoint);
        true
    }

    /// Removes every breakpoint with `id` from every set. Returns how many went.
    pub fn disable(&mut self, id: &BreakpointId) -> usize {
        let before = self.len();
        for bucket in [&mut self.creation, &mut self.runtime, &mut self.unscoped] {
            bucket.retain(|bp| bp.id != *id);
        }
        let removed = before - self.len();
        debug!("Breakpoint {id} disabled ({removed} removed)");
        removed
    }

    /// Whether a breakpoint applies at `(address, pc)` for code of the given flavor.
    ///
    /// Unscoped breakpoints match either flavor.
    pub fn hits(&self, address: &AddressKey, pc: u64, runtime: bool) -> bool {
        let scoped = if runtime { &self.runtime } else { &self.creation };
        scoped.iter().chain(&self.unscoped).any(|bp| bp.is_at(address, pc))
    }

    /// All live breakpoints.
    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.creation.iter().chain(&self.runtime).chain(&self.unscoped)
    }

    /// Number of live breakpoints.
    pub fn len(&self) -> usize {
        self.creation.len() + self.runtime.len() + self.unscoped.len()
    }

    /// Whether no breakpoint is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pending "run until pc" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunUntilCursor {
    /// Id of the debugger's `runUntilPc` request, answered at the hit.
    pub request_id: RequestId,
    /// Program counter to stop at.
    pub target_pc: u64,
}

/// Everything the step policy consults.
#[derive(Debug, Clone)]
pub struct DebuggerState {
    /// Live breakpoints
    pub breakpoints: BreakpointSet,
    /// Function jump destinations per address
    pub jump_destinations: AddressIndex,
    /// Variable declaration sites per address
    pub declarations: AddressIndex,
    /// Addresses whose code is finalized runtime code
    pub runtime_addresses: HashSet<AddressKey>,
    /// At most one outstanding run-until request
    pub run_until: Option<RunUntilCursor>,
    /// Skip steps that nothing flagged
    pub fast_step: bool,
}

impl Default for DebuggerState {
    fn default() -> Self {
        Self {
            breakpoints: BreakpointSet::default(),
            jump_destinations: AddressIndex::default(),
            declarations: AddressIndex::default(),
            runtime_addresses: HashSet::new(),
            run_until: None,
            fast_step: true,
        }
    }
}

impl DebuggerState {
    /// Whether `address` runs finalized (runtime) code.
    pub fn is_runtime(&self, address: &AddressKey) -> bool {
        self.runtime_addresses.contains(address)
    }
}
