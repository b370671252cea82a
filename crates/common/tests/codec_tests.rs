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

use sdb_common::{codec, triggers, CodecError, Content, Envelope, MessageType};
use serde_json::{json, Value};
use tracing::info;

#[test]
fn test_self_referencing_array_round_trip() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut content = Content::object();
    let frames = content.alloc_array();
    content.push(frames, 1u64.into());
    content.push(frames, frames.into());
    content.set_item("frames", frames.into());

    let envelope = Envelope::request(triggers::STEP, content);
    let bytes = codec::encode(&envelope).unwrap();
    let wire: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(wire["content"]["frames"], json!([1, { "$ref": "/frames" }]));

    let decoded = codec::decode(&bytes).unwrap();
    assert_eq!(decoded, envelope);
    let frames = decoded.content.root().get("frames").unwrap();
    assert_eq!(frames.at(1).unwrap().node_id(), frames.node_id());
}

#[test]
fn test_peer_frame_with_back_reference() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let frame = br#"{
        "id": "r1",
        "messageType": "response",
        "triggerType": "response",
        "content": {
            "callstack": [{ "fn": "main", "caller": null }, { "fn": "inner", "caller": { "$ref": "/callstack/0" } }],
            "top": { "$ref": "/callstack/1" }
        }
    }"#;

    let envelope = codec::decode(frame).unwrap();
    assert_eq!(envelope.message_type, MessageType::Response);
    let root = envelope.content.root();
    let caller = root.get("top").unwrap().get("caller").unwrap();
    assert_eq!(caller.node_id(), root.get("callstack").unwrap().at(0).unwrap().node_id());
    assert_eq!(caller.get("fn").unwrap().as_str(), Some("main"));

    // acyclic sharing still flattens, duplicating the shared frames
    let flat = envelope.content.to_value().unwrap();
    assert_eq!(flat["top"]["caller"]["fn"], json!("main"));
}

#[test]
fn test_cyclic_content_only_travels_through_the_codec() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut content = Content::object();
    let root = content.root().node_id().unwrap();
    content.set_item("self", root.into());

    assert!(matches!(content.to_value(), Err(CodecError::Cycle)));
    let wire = codec::encode_content(&content).unwrap();
    assert_eq!(wire, json!({ "self": { "$ref": "" } }));
    assert_eq!(codec::decode_content(wire).unwrap(), content);
}

#[test]
fn test_missing_content_decodes_as_null() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let envelope = codec::decode(br#"{"id":"x","messageType":"request"}"#).unwrap();
    assert!(envelope.content.is_null());
    assert!(envelope.is_request());
}
