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

use std::{env, time::Duration};

use sdb_bridge::{
    BreakpointScopeMode, BridgeConfig, TransportMode, DEFAULT_CONNECT_TIMEOUT, DEFAULT_SDB_PORT,
};
use sdb_common::env::{
    SDB_CONNECT_TIMEOUT_MS, SDB_HOST, SDB_PORT, SDB_SKIP_GAS_ESTIMATION, SDB_TRANSPORT_MODE,
};
use serial_test::serial;
use tracing::info;

const ALL_VARS: [&str; 5] =
    [SDB_HOST, SDB_PORT, SDB_TRANSPORT_MODE, SDB_CONNECT_TIMEOUT_MS, SDB_SKIP_GAS_ESTIMATION];

fn clear_env() {
    for name in ALL_VARS {
        env::remove_var(name);
    }
}

fn set_var(name: &str, value: &str) {
    env::set_var(name, value);
}

#[test]
fn test_default_config() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = BridgeConfig::default();

    assert_eq!(config.transport.mode, TransportMode::Listen);
    assert_eq!(config.transport.host, "127.0.0.1");
    assert_eq!(config.transport.port, DEFAULT_SDB_PORT);
    assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    assert!(!config.skip_gas_estimation);
    assert_eq!(config.breakpoint_scope, BreakpointScopeMode::Scoped);
}

#[test]
fn test_config_builders() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = BridgeConfig::default()
        .with_connect_timeout(Duration::from_millis(250))
        .with_skip_gas_estimation(true)
        .with_breakpoint_scope(BreakpointScopeMode::ScopeInsensitive);

    assert_eq!(config.connect_timeout, Duration::from_millis(250));
    assert!(config.skip_gas_estimation);
    assert_eq!(config.breakpoint_scope, BreakpointScopeMode::ScopeInsensitive);
}

#[test]
#[serial]
fn test_from_env_overlays_set_variables() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    clear_env();
    set_var(SDB_HOST, "localhost");
    set_var(SDB_PORT, "9001");
    set_var(SDB_TRANSPORT_MODE, "dial");
    set_var(SDB_CONNECT_TIMEOUT_MS, "1500");
    set_var(SDB_SKIP_GAS_ESTIMATION, "true");

    let config = BridgeConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.transport.host, "localhost");
    assert_eq!(config.transport.port, 9001);
    assert_eq!(config.transport.mode, TransportMode::Dial);
    assert_eq!(config.connect_timeout, Duration::from_millis(1500));
    assert!(config.skip_gas_estimation);
    assert_eq!(config.transport.url(), "ws://localhost:9001");
}

#[test]
#[serial]
fn test_from_env_without_variables_is_default() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    clear_env();
    set_var(SDB_HOST, "   ");

    let config = BridgeConfig::from_env().unwrap();
    clear_env();
    assert_eq!(config.transport, BridgeConfig::default().transport);
}

#[test]
#[serial]
fn test_from_env_rejects_bad_values() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    clear_env();

    set_var(SDB_PORT, "not-a-port");
    assert!(BridgeConfig::from_env().is_err());
    clear_env();

    set_var(SDB_TRANSPORT_MODE, "smoke-signals");
    assert!(BridgeConfig::from_env().is_err());
    clear_env();

    set_var(SDB_SKIP_GAS_ESTIMATION, "perhaps");
    let err = BridgeConfig::from_env().unwrap_err();
    clear_env();
    assert!(err.to_string().contains(SDB_SKIP_GAS_ESTIMATION));
}
