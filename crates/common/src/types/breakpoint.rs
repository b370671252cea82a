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

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::AddressKey;

/// Identifier the debugger assigns to a breakpoint.
///
/// Can be either a string or a number, whichever the debugger front-end uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BreakpointId {
    /// Numeric identifier
    Number(u64),
    /// String identifier
    String(String),
}

impl Display for BreakpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for BreakpointId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl From<u64> for BreakpointId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

/// Which flavor of code a breakpoint applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointScope {
    /// Code running during contract deployment (constructor / init code).
    Creation,
    /// Code running against already deployed, finalized bytecode.
    Runtime,
}

impl BreakpointScope {
    /// Scope implied by the debugger's optional `runtime` flag.
    pub fn from_runtime_flag(runtime: bool) -> Self {
        if runtime {
            Self::Runtime
        } else {
            Self::Creation
        }
    }
}

/// A breakpoint at a program counter of a contract address.
///
/// `scope == None` marks an unscoped breakpoint, which matches both creation and
/// runtime code at that address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Debugger-assigned identifier.
    pub id: BreakpointId,
    /// Normalized contract address.
    pub address: AddressKey,
    /// Program counter within the contract's code.
    pub pc: u64,
    /// Creation or runtime scope, if the debugger supplied one.
    pub scope: Option<BreakpointScope>,
}

impl Breakpoint {
    /// Whether this breakpoint sits at `(address, pc)`.
    pub fn is_at(&self, address: &AddressKey, pc: u64) -> bool {
        self.pc == pc && self.address == *address
    }
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} @{}:{}", self.id, self.address, self.pc)?;
        match self.scope {
            Some(BreakpointScope::Creation) => write!(f, " (creation)"),
            Some(BreakpointScope::Runtime) => write!(f, " (runtime)"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoint_id_accepts_numbers_and_strings() {
        let id: BreakpointId = serde_json::from_str("7").unwrap();
        assert_eq!(id, BreakpointId::Number(7));

        let id: BreakpointId = serde_json::from_str("\"b1\"").unwrap();
        assert_eq!(id, BreakpointId::from("b1"));
    }

    #[test]
    fn test_display() {
        let bp = Breakpoint {
            id: "b1".into(),
            address: AddressKey::new("0xAA"),
            pc: 10,
            scope: Some(BreakpointScope::Runtime),
        };
        assert_eq!(bp.to_string(), "#b1 @aa:10 (runtime)");
        assert!(bp.is_at(&AddressKey::new("aa"), 10));
        assert!(!bp.is_at(&AddressKey::new("aa"), 11));
    }
}
