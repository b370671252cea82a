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

//! Environment variable name constants for SDB configuration.
//!
//! Every variable here overlays a field of the bridge configuration when the host
//! calls `BridgeConfig::from_env`. Unset variables leave the defaults untouched.

/// Host name or IP the bridge listens on (listen mode) or dials (dial mode).
///
/// # Default
///
/// `127.0.0.1`
pub const SDB_HOST: &str = "SDB_HOST";

/// TCP port of the debugger endpoint.
///
/// # Default
///
/// `8455`
pub const SDB_PORT: &str = "SDB_PORT";

/// Transport mode, either `listen` or `dial`.
///
/// # Default
///
/// `listen`
pub const SDB_TRANSPORT_MODE: &str = "SDB_TRANSPORT_MODE";

/// Deadline in milliseconds for binding/accepting or dialing the debugger.
pub const SDB_CONNECT_TIMEOUT_MS: &str = "SDB_CONNECT_TIMEOUT_MS";

/// When `true`, step events raised while the engine estimates gas are never
/// forwarded to the debugger.
///
/// Accepts `1`, `true`, `yes` (and their negations), case-insensitively.
pub const SDB_SKIP_GAS_ESTIMATION: &str = "SDB_SKIP_GAS_ESTIMATION";
