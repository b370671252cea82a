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

//! Wire codec for [`Envelope`]s.
//!
//! Envelopes travel as JSON objects
//! `{"id", "messageType", "triggerType", "content"}`. The content graph is written
//! depth-first: the first visit of a container is emitted inline, every later visit
//! of the same container becomes `{"$ref": "<json pointer to the first visit>"}`.
//! Object keys that start with `$` are escaped by doubling the leading `$`, so a
//! payload can never forge a reference marker.
//!
//! Decoding is two-pass: containers are rebuilt first while their pointers are
//! recorded, then every reference is patched to the node it names. This keeps the
//! decoder independent of key order in the incoming text.
//!
//! Both directions share one nesting limit, [`MAX_DEPTH`]. Incoming frames are
//! measured before they are parsed, so an over-deep frame is refused without
//! recursing into it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{Content, Envelope, Item, MessageType, Node, NodeId, RequestId};

/// Key of a back-reference marker object.
pub const REF_KEY: &str = "$ref";

/// Deepest container nesting allowed in a content graph, reference markers
/// included. Leaves room for a chain of 1024 call frames.
pub const MAX_DEPTH: usize = 1280;

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Bytes are not valid JSON or do not have the envelope shape
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// A `$ref` key appeared next to other keys or with a non-string target
    #[error("malformed reference marker at `{0}`")]
    MalformedReference(String),

    /// A `$ref` names a location that holds no container
    #[error("unresolved reference to `{0}`")]
    UnresolvedReference(String),

    /// Content nests deeper than [`MAX_DEPTH`]
    #[error("content nests {0} levels deep, limit is {MAX_DEPTH}")]
    TooDeep(usize),

    /// A cyclic graph was asked to flatten into a tree
    #[error("content graph contains a cycle and cannot be flattened")]
    Cycle,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    id: RequestId,
    message_type: MessageType,
    #[serde(default)]
    trigger_type: String,
    #[serde(default)]
    content: Value,
}

/// Encodes an envelope into a JSON frame.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let wire = WireEnvelope {
        id: envelope.id.clone(),
        message_type: envelope.message_type,
        trigger_type: envelope.trigger_type.clone(),
        content: encode_content(&envelope.content)?,
    };
    Ok(serde_json::to_vec(&wire)?)
}

/// Decodes a JSON frame into an envelope.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    // the envelope object itself is one level
    let depth = nesting_depth(bytes).saturating_sub(1);
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep(depth));
    }
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    deserializer.disable_recursion_limit();
    let wire = WireEnvelope::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(Envelope {
        id: wire.id,
        message_type: wire.message_type,
        trigger_type: wire.trigger_type,
        content: decode_content(wire.content)?,
    })
}

/// Encodes a content graph into a JSON tree with reference markers.
///
/// Fails with [`CodecError::TooDeep`] when the written tree would nest deeper than
/// [`MAX_DEPTH`].
pub fn encode_content(content: &Content) -> Result<Value, CodecError> {
    let mut first_seen = HashMap::new();
    encode_item(content, content.root_item(), String::new(), 1, &mut first_seen)
}

fn encode_item(
    content: &Content,
    item: &Item,
    pointer: String,
    depth: usize,
    first_seen: &mut HashMap<NodeId, String>,
) -> Result<Value, CodecError> {
    let id = match item {
        Item::Null => return Ok(Value::Null),
        Item::Bool(b) => return Ok(Value::Bool(*b)),
        Item::Number(n) => return Ok(Value::Number(n.clone())),
        Item::String(s) => return Ok(Value::String(s.clone())),
        Item::Node(id) => *id,
    };
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep(depth));
    }

    if let Some(target) = first_seen.get(&id) {
        let mut marker = Map::new();
        marker.insert(REF_KEY.to_string(), Value::String(target.clone()));
        return Ok(Value::Object(marker));
    }
    first_seen.insert(id, pointer.clone());

    let value = match content.node(id) {
        None => Value::Null,
        Some(Node::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(encode_item(content, item, format!("{pointer}/{i}"), depth + 1, first_seen)?);
            }
            Value::Array(out)
        }
        Some(Node::Object(map)) => {
            let mut out = Map::new();
            for (key, item) in map {
                let key = escape_key(key);
                let child = format!("{pointer}/{}", escape_pointer_token(&key));
                let value = encode_item(content, item, child, depth + 1, first_seen)?;
                out.insert(key, value);
            }
            Value::Object(out)
        }
    };
    Ok(value)
}

/// Deepest bracket nesting in a JSON text, ignoring brackets inside strings.
fn nesting_depth(bytes: &[u8]) -> usize {
    let (mut depth, mut deepest) = (0usize, 0usize);
    let (mut in_string, mut escaped) = (false, false);
    for &byte in bytes {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

/// Decodes a JSON tree with reference markers into a content graph.
pub fn decode_content(value: Value) -> Result<Content, CodecError> {
    let mut decoder = Decoder::default();
    match decoder.decode(value, String::new())? {
        Decoded::Item(root) => decoder.content.set_root(root),
        Decoded::Ref(target) => return Err(CodecError::UnresolvedReference(target)),
    }

    for patch in std::mem::take(&mut decoder.patches) {
        let target = *decoder
            .pointers
            .get(&patch.target)
            .ok_or_else(|| CodecError::UnresolvedReference(patch.target.clone()))?;
        match patch.slot {
            Slot::Key(key) => decoder.content.insert(patch.parent, key, Item::Node(target)),
            Slot::Index(index) => {
                decoder.content.replace_at(patch.parent, index, Item::Node(target))
            }
        };
    }

    Ok(decoder.content)
}

struct Decoder {
    content: Content,
    pointers: HashMap<String, NodeId>,
    patches: Vec<Patch>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self { content: Content::null(), pointers: HashMap::new(), patches: Vec::new() }
    }
}

enum Decoded {
    Item(Item),
    Ref(String),
}

enum Slot {
    Key(String),
    Index(usize),
}

/// A reference slot waiting for its target.
struct Patch {
    parent: NodeId,
    slot: Slot,
    target: String,
}

impl Decoder {
    fn decode(&mut self, value: Value, pointer: String) -> Result<Decoded, CodecError> {
        let item = match value {
            Value::Null => Item::Null,
            Value::Bool(b) => Item::Bool(b),
            Value::Number(n) => Item::Number(n),
            Value::String(s) => Item::String(s),
            Value::Array(values) => {
                let id = self.content.alloc_array();
                self.pointers.insert(pointer.clone(), id);
                for (index, value) in values.into_iter().enumerate() {
                    match self.decode(value, format!("{pointer}/{index}"))? {
                        Decoded::Item(item) => {
                            self.content.push(id, item);
                        }
                        Decoded::Ref(target) => {
                            self.content.push(id, Item::Null);
                            self.patches.push(Patch { parent: id, slot: Slot::Index(index), target });
                        }
                    }
                }
                Item::Node(id)
            }
            Value::Object(map) => {
                if map.contains_key(REF_KEY) {
                    return match (map.len(), map.get(REF_KEY)) {
                        (1, Some(Value::String(target))) => Ok(Decoded::Ref(target.clone())),
                        _ => Err(CodecError::MalformedReference(pointer)),
                    };
                }

                let id = self.content.alloc_object();
                self.pointers.insert(pointer.clone(), id);
                for (wire_key, value) in map {
                    let child = format!("{pointer}/{}", escape_pointer_token(&wire_key));
                    let key = unescape_key(wire_key);
                    match self.decode(value, child)? {
                        Decoded::Item(item) => {
                            self.content.insert(id, key, item);
                        }
                        Decoded::Ref(target) => {
                            self.content.insert(id, key.clone(), Item::Null);
                            self.patches.push(Patch { parent: id, slot: Slot::Key(key), target });
                        }
                    }
                }
                Item::Node(id)
            }
        };
        Ok(Decoded::Item(item))
    }
}

fn escape_key(key: &str) -> String {
    if key.starts_with('$') {
        format!("${key}")
    } else {
        key.to_string()
    }
}

fn unescape_key(key: String) -> String {
    if key.starts_with("$$") {
        key[1..].to_string()
    } else {
        key
    }
}

/// RFC 6901 token escaping.
fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
