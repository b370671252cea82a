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

//! Requests the debugger sends to the bridge.
//!
//! A request envelope names its command in `content.type`. Content without a
//! `type` and commands this bridge does not know are acknowledged generically so
//! that newer debuggers keep working against older bridges.

use std::fmt;

use alloy_primitives::U256;
use sdb_common::{AddressKey, BreakpointId, CodecError, Content, RequestId};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer,
};

/// Reply message of a handled command.
pub const OK: &str = "ok";
/// Reply message of a successful code injection.
pub const CODE_INJECTED: &str = "Code Injected";
/// Reply message of a successful storage read.
pub const STORAGE_RETRIEVED: &str = "Retrieved Storage Value";
/// Reply message of a failed storage read.
pub const STORAGE_ERROR: &str = "Error Retrieving Storage Value";
/// Reply message when no engine is attached.
pub const NO_ENGINE: &str = "Error: no EVM attached";
/// Reason given when a request reuses the id of one still being answered.
pub const DUPLICATE_ID: &str = "duplicate request id";

/// A typed debugger request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DebuggerCommand {
    /// Hot-swap contract code, optionally resuming a paused step afterwards
    #[serde(rename_all = "camelCase")]
    InjectNewCode {
        /// Paused step to hand over to the engine
        #[serde(default)]
        step_id: Option<RequestId>,
    },
    /// Read a storage slot
    GetStorage {
        /// Contract address
        address: AddressKey,
        /// Slot, as a number or hex string
        position: StorageSlot,
    },
    /// Enable or disable a breakpoint
    SendBreakpoint {
        /// Debugger-assigned id
        id: BreakpointId,
        /// Contract address
        address: AddressKey,
        /// Program counter, required when enabling
        #[serde(default)]
        pc: Option<u64>,
        /// Enable (`true`) or disable by id (`false`)
        #[serde(default)]
        enabled: bool,
        /// Runtime (`true`) or creation (`false`) code; absent means either
        #[serde(default)]
        runtime: Option<bool>,
    },
    /// Replace the declaration sites of an address
    SendDeclarations {
        /// Contract address
        address: AddressKey,
        /// Program counters of variable declarations
        declarations: Vec<u64>,
    },
    /// Replace the function jump destinations of an address
    #[serde(rename_all = "camelCase")]
    SendJumpDestinations {
        /// Contract address
        address: AddressKey,
        /// Program counters of function entries
        jump_destinations: Vec<u64>,
    },
    /// Run freely until `pc`, releasing the paused step `step_id`
    #[serde(rename_all = "camelCase")]
    RunUntilPc {
        /// Paused step to release
        step_id: RequestId,
        /// Target program counter
        pc: u64,
    },
    /// Liveness check, acknowledged with `ok`
    Ping,
    /// Anything else
    #[serde(other)]
    Unknown,
}

impl DebuggerCommand {
    /// Parses request content. Content without a string `type` is [`Self::Unknown`].
    pub fn parse(content: &Content) -> Result<Self, CodecError> {
        if content.root().get("type").and_then(|ty| ty.as_str()).is_none() {
            return Ok(Self::Unknown);
        }
        content.deserialize()
    }

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InjectNewCode { .. } => "injectNewCode",
            Self::GetStorage { .. } => "getStorage",
            Self::SendBreakpoint { .. } => "sendBreakpoint",
            Self::SendDeclarations { .. } => "sendDeclarations",
            Self::SendJumpDestinations { .. } => "sendJumpDestinations",
            Self::RunUntilPc { .. } => "runUntilPc",
            Self::Ping => "ping",
            Self::Unknown => "unknown",
        }
    }
}

/// Storage slot index.
///
/// Accepts a JSON number, a `0x`-prefixed hex string, or a bare hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSlot(pub U256);

impl<'de> Deserialize<'de> for StorageSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SlotVisitor;

        impl Visitor<'_> for SlotVisitor {
            type Value = StorageSlot;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a storage slot as an unsigned integer or hex string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(StorageSlot(U256::from(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                let v = v.trim();
                let digits = v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")).unwrap_or(v);
                let digits = if digits.is_empty() { "0" } else { digits };
                U256::from_str_radix(digits, 16)
                    .map(StorageSlot)
                    .map_err(|e| E::custom(format!("invalid storage slot `{v}`: {e}")))
            }
        }

        deserializer.deserialize_any(SlotVisitor)
    }
}

/// `{message}` reply content.
pub fn reply(message: &str) -> Content {
    let mut content = Content::object();
    content.set("message", message);
    content
}

/// `{message: "Error: <reason>"}` reply content.
pub fn error_reply(reason: impl fmt::Display) -> Content {
    reply(&format!("Error: {reason}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> Result<DebuggerCommand, CodecError> {
        DebuggerCommand::parse(&Content::from_value(value))
    }

    #[test]
    fn test_parse_breakpoint() {
        let command = parse(json!({
            "type": "sendBreakpoint",
            "id": 3,
            "address": "0xAAAA",
            "pc": 10,
            "enabled": true,
            "runtime": true,
        }))
        .unwrap();
        assert_eq!(
            command,
            DebuggerCommand::SendBreakpoint {
                id: 3u64.into(),
                address: AddressKey::new("aaaa"),
                pc: Some(10),
                enabled: true,
                runtime: Some(true),
            }
        );
    }

    #[test]
    fn test_parse_disable_without_pc() {
        let command =
            parse(json!({ "type": "sendBreakpoint", "id": "b1", "address": "aa" })).unwrap();
        assert!(matches!(
            command,
            DebuggerCommand::SendBreakpoint { pc: None, enabled: false, runtime: None, .. }
        ));
    }

    #[test]
    fn test_parse_camel_case_fields() {
        assert_eq!(
            parse(json!({ "type": "runUntilPc", "stepId": "s1", "pc": 50 })).unwrap(),
            DebuggerCommand::RunUntilPc { step_id: "s1".into(), pc: 50 }
        );
        assert_eq!(
            parse(json!({ "type": "sendJumpDestinations", "address": "bb", "jumpDestinations": [1, 2] }))
                .unwrap(),
            DebuggerCommand::SendJumpDestinations {
                address: AddressKey::new("bb"),
                jump_destinations: vec![1, 2],
            }
        );
        assert_eq!(
            parse(json!({ "type": "injectNewCode", "code": "6000" })).unwrap(),
            DebuggerCommand::InjectNewCode { step_id: None }
        );
    }

    #[test]
    fn test_storage_slot_forms() {
        for (position, expected) in
            [(json!(5), 5u64), (json!("0x1f"), 31), (json!("1f"), 31), (json!("0x"), 0)]
        {
            let command = parse(json!({ "type": "getStorage", "address": "aa", "position": position }))
                .unwrap();
            assert_eq!(
                command,
                DebuggerCommand::GetStorage {
                    address: AddressKey::new("aa"),
                    position: StorageSlot(U256::from(expected)),
                }
            );
        }
        assert!(parse(json!({ "type": "getStorage", "address": "aa", "position": "zz" })).is_err());
    }

    #[test]
    fn test_unknown_and_untyped() {
        assert_eq!(parse(json!({ "type": "stepOver" })).unwrap(), DebuggerCommand::Unknown);
        assert_eq!(parse(json!({ "message": "hi" })).unwrap(), DebuggerCommand::Unknown);
        assert_eq!(parse(json!(null)).unwrap(), DebuggerCommand::Unknown);
        assert_eq!(parse(json!({ "type": "ping", "at": 1 })).unwrap(), DebuggerCommand::Ping);
    }

    #[test]
    fn test_known_type_with_bad_fields_fails() {
        assert!(parse(json!({ "type": "runUntilPc", "stepId": "s1" })).is_err());
        assert!(parse(json!({ "type": "sendDeclarations", "address": "aa", "declarations": "x" }))
            .is_err());
    }

    #[test]
    fn test_replies() {
        assert_eq!(reply(OK).to_value().unwrap(), json!({ "message": "ok" }));
        assert_eq!(
            error_reply("missing field `pc`").to_value().unwrap(),
            json!({ "message": "Error: missing field `pc`" })
        );
    }
}
