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

//! Arena-backed payload graph.
//!
//! Execution contexts handed over by the EVM legitimately reference themselves (a
//! call frame pointing at its parent, a state manager shared by several frames), so
//! envelope content cannot be a plain JSON tree. [`Content`] stores every array and
//! object as a [`Node`] in an arena and lets [`Item::Node`] slots point at any node,
//! including an ancestor. Primitives live inline in their slot.
//!
//! Equality between two [`Content`] values is graph isomorphism from the root:
//! primitives compare by value and containers must correspond one-to-one, so a
//! shared node on one side must be shared on the other.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::CodecError;

/// Index of a container inside a [`Content`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One slot: either an inline primitive or a link to a container.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// JSON null
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number
    Number(Number),
    /// JSON string
    String(String),
    /// Link to an array or object node, possibly one already linked elsewhere
    Node(NodeId),
}

impl From<bool> for Item {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for Item {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Item {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NodeId> for Item {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

/// A container node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered list of slots
    Array(Vec<Item>),
    /// Key-ordered map of slots
    Object(BTreeMap<String, Item>),
}

/// Envelope payload: a rooted graph of JSON-like values.
#[derive(Debug, Clone)]
pub struct Content {
    nodes: Vec<Node>,
    root: Item,
}

impl Default for Content {
    fn default() -> Self {
        Self::object()
    }
}

impl Content {
    /// Content whose root is `null`.
    pub fn null() -> Self {
        Self { nodes: Vec::new(), root: Item::Null }
    }

    /// Content whose root is an empty object.
    pub fn object() -> Self {
        Self { nodes: vec![Node::Object(BTreeMap::new())], root: Item::Node(NodeId(0)) }
    }

    /// Builds a (tree-shaped) content graph from a JSON value.
    pub fn from_value(value: Value) -> Self {
        let mut content = Self::null();
        content.root = content.import(value);
        content
    }

    /// Read view of the root.
    pub fn root(&self) -> View<'_> {
        View { content: self, item: &self.root }
    }

    /// The root slot.
    pub fn root_item(&self) -> &Item {
        &self.root
    }

    /// Replaces the root slot.
    pub fn set_root(&mut self, item: Item) {
        self.root = item;
    }

    /// Whether the root is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self.root, Item::Null)
    }

    /// Looks up a container by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Allocates an empty, unlinked object node.
    pub fn alloc_object(&mut self) -> NodeId {
        self.alloc(Node::Object(BTreeMap::new()))
    }

    /// Allocates an empty, unlinked array node.
    pub fn alloc_array(&mut self) -> NodeId {
        self.alloc(Node::Array(Vec::new()))
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Sets `key` of object `node`. Returns `false` when `node` is not an object.
    pub fn insert(&mut self, node: NodeId, key: impl Into<String>, item: Item) -> bool {
        match self.nodes.get_mut(node.0) {
            Some(Node::Object(map)) => {
                map.insert(key.into(), item);
                true
            }
            _ => false,
        }
    }

    /// Appends to array `node`. Returns `false` when `node` is not an array.
    pub fn push(&mut self, node: NodeId, item: Item) -> bool {
        match self.nodes.get_mut(node.0) {
            Some(Node::Array(items)) => {
                items.push(item);
                true
            }
            _ => false,
        }
    }

    /// Replaces slot `index` of array `node`. Returns `false` when out of range.
    pub(crate) fn replace_at(&mut self, node: NodeId, index: usize, item: Item) -> bool {
        match self.nodes.get_mut(node.0) {
            Some(Node::Array(items)) if index < items.len() => {
                items[index] = item;
                true
            }
            _ => false,
        }
    }

    /// Copies a JSON tree into the arena and returns the slot referring to it.
    pub fn import(&mut self, value: Value) -> Item {
        match value {
            Value::Null => Item::Null,
            Value::Bool(b) => Item::Bool(b),
            Value::Number(n) => Item::Number(n),
            Value::String(s) => Item::String(s),
            Value::Array(values) => {
                let items = values.into_iter().map(|v| self.import(v)).collect();
                Item::Node(self.alloc(Node::Array(items)))
            }
            Value::Object(map) => {
                let entries = map.into_iter().map(|(k, v)| (k, self.import(v))).collect();
                Item::Node(self.alloc(Node::Object(entries)))
            }
        }
    }

    /// Sets a root-level field, turning the root into an object first if needed.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let item = self.import(value.into());
        self.set_item(key, item);
    }

    /// Like [`Content::set`] but with a prepared slot, e.g. a link to an existing node.
    pub fn set_item(&mut self, key: impl Into<String>, item: Item) {
        let root = self.root_object();
        self.insert(root, key, item);
    }

    fn root_object(&mut self) -> NodeId {
        if let Item::Node(id) = self.root {
            if matches!(self.nodes.get(id.0), Some(Node::Object(_))) {
                return id;
            }
        }
        let id = self.alloc_object();
        self.root = Item::Node(id);
        id
    }

    /// Flattens the graph into a JSON tree.
    ///
    /// Shared (acyclic) nodes are duplicated; a node reachable from itself cannot be
    /// flattened and yields [`CodecError::Cycle`].
    pub fn to_value(&self) -> Result<Value, CodecError> {
        let mut ancestors = Vec::new();
        self.flatten(&self.root, &mut ancestors)
    }

    fn flatten(&self, item: &Item, ancestors: &mut Vec<NodeId>) -> Result<Value, CodecError> {
        let id = match item {
            Item::Null => return Ok(Value::Null),
            Item::Bool(b) => return Ok(Value::Bool(*b)),
            Item::Number(n) => return Ok(Value::Number(n.clone())),
            Item::String(s) => return Ok(Value::String(s.clone())),
            Item::Node(id) => *id,
        };
        if ancestors.contains(&id) {
            return Err(CodecError::Cycle);
        }

        ancestors.push(id);
        let value = match self.node(id) {
            None => Value::Null,
            Some(Node::Array(items)) => Value::Array(
                items.iter().map(|i| self.flatten(i, ancestors)).collect::<Result<_, _>>()?,
            ),
            Some(Node::Object(map)) => {
                let mut out = Map::new();
                for (key, item) in map {
                    out.insert(key.clone(), self.flatten(item, ancestors)?);
                }
                Value::Object(out)
            }
        };
        ancestors.pop();
        Ok(value)
    }

    /// Deserializes the (acyclic) content into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(serde_json::from_value(self.to_value()?)?)
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        GraphMatcher { left: self, right: other, forward: HashMap::new(), backward: HashMap::new() }
            .items_eq(&self.root, &other.root)
    }
}

/// Walks two graphs in lockstep, building a node bijection as it goes.
struct GraphMatcher<'a> {
    left: &'a Content,
    right: &'a Content,
    forward: HashMap<NodeId, NodeId>,
    backward: HashMap<NodeId, NodeId>,
}

impl GraphMatcher<'_> {
    fn items_eq(&mut self, a: &Item, b: &Item) -> bool {
        let (a, b) = match (a, b) {
            (Item::Node(a), Item::Node(b)) => (*a, *b),
            (Item::Node(_), _) | (_, Item::Node(_)) => return false,
            (a, b) => return a == b,
        };

        match (self.forward.get(&a), self.backward.get(&b)) {
            (Some(mapped), _) => return *mapped == b,
            (None, Some(_)) => return false,
            (None, None) => {}
        }
        self.forward.insert(a, b);
        self.backward.insert(b, a);

        let (left, right) = (self.left, self.right);
        match (left.node(a), right.node(b)) {
            (Some(Node::Array(xs)), Some(Node::Array(ys))) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.items_eq(x, y))
            }
            (Some(Node::Object(xs)), Some(Node::Object(ys))) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|((kx, x), (ky, y))| kx == ky && self.items_eq(x, y))
            }
            (None, None) => true,
            _ => false,
        }
    }
}

/// Borrowed, read-only cursor into a [`Content`] graph.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    content: &'a Content,
    item: &'a Item,
}

impl<'a> View<'a> {
    /// The underlying slot.
    pub fn item(&self) -> &'a Item {
        self.item
    }

    /// Container id, if this slot links to one.
    pub fn node_id(&self) -> Option<NodeId> {
        match self.item {
            Item::Node(id) => Some(*id),
            _ => None,
        }
    }

    fn node(&self) -> Option<&'a Node> {
        self.node_id().and_then(|id| self.content.node(id))
    }

    /// Field `key` of an object.
    pub fn get(&self, key: &str) -> Option<View<'a>> {
        match self.node()? {
            Node::Object(map) => map.get(key).map(|item| View { content: self.content, item }),
            Node::Array(_) => None,
        }
    }

    /// Element `index` of an array.
    pub fn at(&self, index: usize) -> Option<View<'a>> {
        match self.node()? {
            Node::Array(items) => items.get(index).map(|item| View { content: self.content, item }),
            Node::Object(_) => None,
        }
    }

    /// Elements of an array (empty for anything else).
    pub fn elements(&self) -> impl Iterator<Item = View<'a>> + 'a {
        let content = self.content;
        let items: &'a [Item] = match self.node() {
            Some(Node::Array(items)) => items,
            _ => &[],
        };
        items.iter().map(move |item| View { content, item })
    }

    /// String value.
    pub fn as_str(&self) -> Option<&'a str> {
        match self.item {
            Item::String(s) => Some(s),
            _ => None,
        }
    }

    /// Unsigned integer value.
    pub fn as_u64(&self) -> Option<u64> {
        match self.item {
            Item::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    /// Boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self.item {
            Item::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether the slot is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self.item, Item::Null)
    }
}
