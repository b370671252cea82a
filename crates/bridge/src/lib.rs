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

//! SDB Bridge - connects a running EVM to an external source-level debugger.
//!
//! The engine reports step, contract and block/transaction events to a
//! [`Bridge`]; a step policy decides which of them pause the engine until the
//! debugger answers. The debugger in turn sets breakpoints, reads storage, runs
//! until a program counter or hot-swaps code through the same link.

pub mod bridge;
pub use bridge::*;

pub mod commands;
pub use commands::DebuggerCommand;

pub mod config;
pub use config::*;

pub mod correlation;
pub use correlation::*;

pub mod error;
pub use error::*;

pub mod host;
pub use host::*;

pub mod policy;
pub use policy::{Decision, SpecialEvent};

pub mod state;
pub use state::*;

pub mod transport;
pub use transport::*;
