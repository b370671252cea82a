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

//! Bridge configuration.
//!
//! [`BridgeConfig`] is a plain struct with defaults and builder-style setters, and
//! can be overlaid from the environment (see [`sdb_common::env`]) by the host.

use std::{env, str::FromStr, time::Duration};

use eyre::{bail, eyre, Result, WrapErr};
use sdb_common::env::{
    SDB_CONNECT_TIMEOUT_MS, SDB_HOST, SDB_PORT, SDB_SKIP_GAS_ESTIMATION, SDB_TRANSPORT_MODE,
};

use crate::transport::{Transport, WsClientTransport, WsServerTransport};

/// Default debugger port.
pub const DEFAULT_SDB_PORT: u16 = 8455;

/// Default deadline for establishing the debugger connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// How the bridge reaches its single debugger peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Listen on `host:port` and accept exactly one debugger connection.
    Listen,
    /// Dial a debugger already listening on `host:port`.
    Dial,
}

impl FromStr for TransportMode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "listen" | "server" => Ok(Self::Listen),
            "dial" | "connect" | "client" => Ok(Self::Dial),
            other => bail!("Unknown transport mode `{other}`, expected `listen` or `dial`"),
        }
    }
}

/// Debugger endpoint and transport selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Listen or dial
    pub mode: TransportMode,
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { mode: TransportMode::Listen, host: "127.0.0.1".into(), port: DEFAULT_SDB_PORT }
    }
}

impl TransportConfig {
    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// WebSocket URL used in dial mode.
    pub fn url(&self) -> String {
        format!("ws://{}", self.endpoint())
    }

    /// Builds the configured transport backend.
    pub fn build(&self) -> Box<dyn Transport> {
        match self.mode {
            TransportMode::Listen => Box::new(WsServerTransport::new(self.endpoint())),
            TransportMode::Dial => Box::new(WsClientTransport::new(self.url())),
        }
    }
}

/// How `sendBreakpoint` scope data is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BreakpointScopeMode {
    /// A `runtime` flag files the breakpoint under creation or runtime scope and it
    /// only matches code of that flavor; without the flag it matches either.
    #[default]
    Scoped,
    /// Scope data is ignored; every breakpoint matches creation and runtime code.
    ScopeInsensitive,
}

/// Configuration for the bridge engine.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Debugger endpoint
    pub transport: TransportConfig,
    /// Deadline for binding/accepting or dialing the debugger
    pub connect_timeout: Duration,
    /// Never forward steps raised while the engine estimates gas
    pub skip_gas_estimation: bool,
    /// Breakpoint scope interpretation
    pub breakpoint_scope: BreakpointScopeMode,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            skip_gas_estimation: false,
            breakpoint_scope: BreakpointScopeMode::default(),
        }
    }
}

impl BridgeConfig {
    /// Set the debugger endpoint
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Set the connection deadline
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable skipping of gas-estimation steps
    pub fn with_skip_gas_estimation(mut self, skip: bool) -> Self {
        self.skip_gas_estimation = skip;
        self
    }

    /// Set how breakpoint scope data is interpreted
    pub fn with_breakpoint_scope(mut self, mode: BreakpointScopeMode) -> Self {
        self.breakpoint_scope = mode;
        self
    }

    /// Defaults overlaid with the `SDB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Overlays the `SDB_*` environment variables that are set.
    pub fn merge_env(mut self) -> Result<Self> {
        if let Some(host) = read_var(SDB_HOST) {
            self.transport.host = host;
        }
        if let Some(port) = read_var(SDB_PORT) {
            self.transport.port =
                port.parse().wrap_err_with(|| format!("Invalid {SDB_PORT} value `{port}`"))?;
        }
        if let Some(mode) = read_var(SDB_TRANSPORT_MODE) {
            self.transport.mode = mode.parse()?;
        }
        if let Some(ms) = read_var(SDB_CONNECT_TIMEOUT_MS) {
            let ms: u64 = ms
                .parse()
                .wrap_err_with(|| format!("Invalid {SDB_CONNECT_TIMEOUT_MS} value `{ms}`"))?;
            self.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(flag) = read_var(SDB_SKIP_GAS_ESTIMATION) {
            self.skip_gas_estimation = parse_flag(&flag)
                .ok_or_else(|| eyre!("Invalid {SDB_SKIP_GAS_ESTIMATION} value `{flag}`"))?;
        }
        Ok(self)
    }
}

fn read_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
