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

/// Normalized contract addresses used as index keys
pub mod address;
/// Breakpoint identity and scope
pub mod breakpoint;
/// Arena-backed content graph carried inside envelopes
pub mod content;
/// The wire envelope and its identifiers
pub mod envelope;

pub use address::*;
pub use breakpoint::*;
pub use content::*;
pub use envelope::*;
