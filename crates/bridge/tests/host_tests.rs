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

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, U256};
use eyre::eyre;
use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;
use sdb_bridge::{
    pair, Bridge, BridgeConfig, BridgeError, CodeInjection, DirectPeer, EngineEvent, EventOutcome,
    EvmHost, StepEvent,
};
use sdb_common::{Content, Envelope};
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::info;

const AA: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Engine double: fixed storage, records injections and resumes the paused step
/// unless told to fail.
#[derive(Default)]
struct MockHost {
    fail: bool,
    delay: Option<Duration>,
    injected: Mutex<Vec<Value>>,
}

impl EvmHost for MockHost {
    fn get_contract_storage(
        &self,
        address: Address,
        slot: U256,
    ) -> BoxFuture<'static, eyre::Result<U256>> {
        let (fail, delay) = (self.fail, self.delay);
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if fail {
                return Err(eyre!("no state for {address}"));
            }
            Ok(slot + U256::from(41))
        }
        .boxed()
    }

    fn inject_code(&self, injection: CodeInjection) -> eyre::Result<()> {
        if self.fail {
            eyre::bail!("code rejected");
        }
        self.injected.lock().push(injection.content.to_value()?);
        injection.resume();
        Ok(())
    }
}

async fn attached(host: Option<Arc<MockHost>>) -> (Bridge, DirectPeer) {
    let bridge = Bridge::new(BridgeConfig::default());
    if let Some(host) = host {
        bridge.attach_evm(host);
    }
    let (transport, peer) = pair();
    bridge.attach_with(Box::new(transport), || {}).await.unwrap();
    (bridge, peer)
}

async fn next(peer: &mut DirectPeer) -> Envelope {
    timeout(Duration::from_secs(5), peer.recv()).await.expect("peer timed out").expect("link closed")
}

async fn command(peer: &mut DirectPeer, content: Value) -> Value {
    let request = Envelope::request("request", Content::from_value(content));
    peer.send(&request).unwrap();
    let reply = next(peer).await;
    assert_eq!(reply.id, request.id);
    reply.content.to_value().unwrap()
}

#[tokio::test]
async fn test_get_storage() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (_bridge, mut peer) = attached(Some(Arc::new(MockHost::default()))).await;

    let reply = command(&mut peer, json!({ "type": "getStorage", "address": AA, "position": "0x1" })).await;
    assert_eq!(reply, json!({ "message": "Retrieved Storage Value", "value": "0x2a" }));

    let reply = command(&mut peer, json!({ "type": "getStorage", "address": AA, "position": 0 })).await;
    assert_eq!(reply["value"], json!("0x29"));
}

#[tokio::test]
async fn test_get_storage_failure_is_reported() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let host = Arc::new(MockHost { fail: true, ..Default::default() });
    let (_bridge, mut peer) = attached(Some(host)).await;

    let reply = command(&mut peer, json!({ "type": "getStorage", "address": AA, "position": 1 })).await;
    assert_eq!(reply["message"], json!("Error Retrieving Storage Value"));

    let reply =
        command(&mut peer, json!({ "type": "getStorage", "address": "xyz", "position": 1 })).await;
    assert!(reply["message"].as_str().unwrap().starts_with("Error: invalid address"));
}

#[tokio::test]
async fn test_requests_without_engine() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (_bridge, mut peer) = attached(None).await;

    for content in [
        json!({ "type": "getStorage", "address": AA, "position": 1 }),
        json!({ "type": "injectNewCode", "code": "6000" }),
    ] {
        assert_eq!(command(&mut peer, content).await, json!({ "message": "Error: no EVM attached" }));
    }
}

#[tokio::test]
async fn test_inject_code_resumes_paused_step() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let host = Arc::new(MockHost::default());
    let (bridge, mut peer) = attached(Some(host.clone())).await;
    command(
        &mut peer,
        json!({ "type": "sendBreakpoint", "id": "b1", "address": AA, "pc": 3, "enabled": true }),
    )
    .await;

    let paused = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge.on_engine_event(EngineEvent::Step(StepEvent::new(AA, 3, "SSTORE"))).await
        })
    };
    let step = next(&mut peer).await;

    let reply = command(
        &mut peer,
        json!({ "type": "injectNewCode", "stepId": step.id, "address": AA, "code": "6001" }),
    )
    .await;
    assert_eq!(reply, json!({ "message": "Code Injected" }));

    let outcome = timeout(Duration::from_secs(5), paused).await.unwrap().unwrap().unwrap();
    assert!(matches!(outcome, EventOutcome::Resumed(ref env) if env.id == step.id));
    assert_eq!(host.injected.lock()[0]["code"], json!("6001"));
    assert_eq!(bridge.pending_requests(), 0);
}

#[tokio::test]
async fn test_rejected_injection_fails_paused_step() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let host = Arc::new(MockHost { fail: true, ..Default::default() });
    let (bridge, mut peer) = attached(Some(host)).await;

    let paused = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.on_engine_event(EngineEvent::AfterBlock(Content::object())).await })
    };
    let event = next(&mut peer).await;

    let reply =
        command(&mut peer, json!({ "type": "injectNewCode", "stepId": event.id, "code": "00" })).await;
    assert_eq!(reply, json!({ "message": "Error: code rejected" }));

    let result = timeout(Duration::from_secs(5), paused).await.unwrap().unwrap();
    assert!(matches!(result, Err(BridgeError::ContinuationDropped)));
}

#[tokio::test]
async fn test_reused_request_id_is_rejected() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let host = Arc::new(MockHost { delay: Some(Duration::from_millis(200)), ..Default::default() });
    let (bridge, mut peer) = attached(Some(host)).await;

    let read = Content::from_value(json!({ "type": "getStorage", "address": AA, "position": 1 }));
    let mut request = Envelope::request("request", read);
    request.id = "dup".into();
    peer.send(&request).unwrap();
    peer.send(&request).unwrap();

    // the second copy is refused at once, the first is answered once the read ends
    let first = next(&mut peer).await;
    assert_eq!(first.id, request.id);
    assert_eq!(first.content.to_value().unwrap(), json!({ "message": "Error: duplicate request id" }));
    assert_eq!(bridge.pending_requests(), 1);

    let second = next(&mut peer).await;
    assert_eq!(second.id, request.id);
    assert_eq!(second.content.to_value().unwrap()["value"], json!("0x2a"));
    assert_eq!(bridge.pending_requests(), 0);
    assert!(peer.try_recv().is_none());
}
