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

//! SDB Common - Shared functionality for SDB components
//!
//! This crate provides the wire-level vocabulary shared by the bridge engine and
//! any debugger front-end talking to it: envelopes, addresses, breakpoints, the
//! back-reference aware content graph and its codec, plus logging setup.

/// Wire types exchanged between the bridge and the debugger
pub mod types;

/// Back-reference aware JSON codec for envelopes and their content graphs
pub mod codec;
/// Environment variable names recognized by SDB components
pub mod env;
/// Logging setup and utilities for consistent logging across SDB components
pub mod logging;

pub use codec::*;
pub use types::*;
