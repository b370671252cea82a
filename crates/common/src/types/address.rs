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

use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize};

/// A contract address in its wire form: lowercase hex without a `0x` prefix.
///
/// Every address that enters the bridge, whether from the engine, from a linking
/// call or from the debugger, goes through [`AddressKey::new`] so that index
/// lookups never miss on case or prefix differences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AddressKey(String);

impl AddressKey {
    /// Normalizes `raw`, stripping surrounding whitespace and any `0x`/`0X` prefix.
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let stripped = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        Self(stripped.to_ascii_lowercase())
    }

    /// The normalized hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the key back into a 20-byte address, if it is one.
    pub fn to_address(&self) -> Option<Address> {
        self.0.parse().ok()
    }
}

impl Display for AddressKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Address> for AddressKey {
    fn from(address: Address) -> Self {
        Self(hex::encode(address.as_slice()))
    }
}

impl From<&str> for AddressKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for AddressKey {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl<'de> Deserialize<'de> for AddressKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}
