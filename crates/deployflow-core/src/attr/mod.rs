//! Flat attribute tree
//!
//! The user-facing deployment model is a tree of named attributes. Every node
//! is one of three kinds: a scalar, an ordered list of blocks, or a single
//! nested block. Nodes are addressed with dotted paths such as
//! `apm.0.topology.0.memory_per_node`; a trailing `#` addresses the length of
//! a block list (`apm.#`).
//!
//! An attribute that is not set is simply absent from its block, so "unset"
//! and a zero value are never confused.

mod path;

pub use path::{AttrPath, Segment};

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Leaf value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Attribute node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Scalar(Scalar),
    List(Vec<Block>),
    Block(Block),
}

impl AttrValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttrValue::Scalar(Scalar::Bool(_)) => "bool",
            AttrValue::Scalar(Scalar::Int(_)) => "number",
            AttrValue::Scalar(Scalar::Str(_)) => "string",
            AttrValue::List(_) => "block list",
            AttrValue::Block(_) => "block",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Scalar(Scalar::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_blocks(&self) -> Option<&[Block]> {
        match self {
            AttrValue::List(blocks) => Some(blocks),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            AttrValue::Block(block) => Some(block),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Scalar(Scalar::Str(value.to_string()))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Scalar(Scalar::Str(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Scalar(Scalar::Int(value))
    }
}

impl From<Vec<Block>> for AttrValue {
    fn from(value: Vec<Block>) -> Self {
        AttrValue::List(value)
    }
}

impl From<Block> for AttrValue {
    fn from(value: Block) -> Self {
        AttrValue::Block(value)
    }
}

/// A set of named attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block {
    attrs: BTreeMap<String, AttrValue>,
}

enum Node<'a> {
    Block(&'a Block),
    Value(&'a AttrValue),
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.attrs.iter()
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.attrs.remove(key)
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Blocks of a block list, empty when the attribute is absent
    pub fn blocks(&self, key: &str) -> &[Block] {
        self.attrs
            .get(key)
            .and_then(AttrValue::as_blocks)
            .unwrap_or(&[])
    }

    /// Copy `keys` from `from` when this block does not set them itself
    pub fn carry_over(&mut self, from: &Block, keys: &[&str]) {
        for key in keys {
            if let Some(value) = from.get(key) {
                self.attrs
                    .entry((*key).to_string())
                    .or_insert_with(|| value.clone());
            }
        }
    }

    /// Look up the node at `path`
    pub fn lookup(&self, path: &str) -> Result<Option<&AttrValue>> {
        let parsed: AttrPath = path.parse()?;
        if parsed.segments().last() == Some(&Segment::Count) {
            return Err(ModelError::invalid_path(path, "use count() for '#' paths"));
        }
        Ok(match self.resolve(parsed.segments()) {
            Some(Node::Value(value)) => Some(value),
            _ => None,
        })
    }

    /// Number of blocks in the block list at `path`; an absent list counts as zero
    pub fn count(&self, path: &str) -> Result<usize> {
        let parsed: AttrPath = path.parse()?;
        let segments = match parsed.split_last() {
            Some((Segment::Count, parents)) => parents,
            _ => parsed.segments(),
        };
        match self.resolve(segments) {
            None => Ok(0),
            Some(Node::Value(AttrValue::List(blocks))) => Ok(blocks.len()),
            Some(Node::Value(other)) => Err(ModelError::invalid_path(
                path,
                format!("expected block list, found {}", other.kind_name()),
            )),
            Some(Node::Block(_)) => Err(ModelError::invalid_path(
                path,
                "expected block list, found block",
            )),
        }
    }

    /// Render the attribute at `path` the way it appears in a flat state
    /// listing: scalars as strings, `#` paths as list lengths.
    pub fn attr(&self, path: &str) -> Option<String> {
        if path.ends_with(".#") {
            return self.count(path).ok().map(|n| n.to_string());
        }
        match self.lookup(path).ok()?? {
            AttrValue::Scalar(scalar) => Some(scalar.to_string()),
            _ => None,
        }
    }

    /// Set the attribute at `path`, creating intermediate blocks.
    ///
    /// A list index may address an existing block or the position directly
    /// after the last one, which appends a new block.
    pub fn set_path(&mut self, path: &str, value: impl Into<AttrValue>) -> Result<()> {
        let parsed: AttrPath = path.parse()?;
        let Some((Segment::Key(key), parents)) = parsed.split_last() else {
            return Err(ModelError::invalid_path(
                path,
                "path must end with an attribute name",
            ));
        };
        let block = self.block_mut(parents, path)?;
        block.insert(key.clone(), value);
        Ok(())
    }

    /// Every scalar and list length keyed by its dotted path
    pub fn flatmap(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        self.collect_flat("", &mut out);
        out
    }

    fn collect_flat(&self, prefix: &str, out: &mut BTreeMap<String, String>) {
        for (key, value) in &self.attrs {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match value {
                AttrValue::Scalar(scalar) => {
                    out.insert(path, scalar.to_string());
                }
                AttrValue::List(blocks) => {
                    out.insert(format!("{}.#", path), blocks.len().to_string());
                    for (i, block) in blocks.iter().enumerate() {
                        block.collect_flat(&format!("{}.{}", path, i), out);
                    }
                }
                AttrValue::Block(block) => block.collect_flat(&path, out),
            }
        }
    }

    fn resolve(&self, segments: &[Segment]) -> Option<Node<'_>> {
        let mut node = Node::Block(self);
        for segment in segments {
            node = match (node, segment) {
                (Node::Block(block), Segment::Key(key)) => Node::Value(block.attrs.get(key)?),
                (Node::Value(AttrValue::Block(block)), Segment::Key(key)) => {
                    Node::Value(block.attrs.get(key)?)
                }
                (Node::Value(AttrValue::List(blocks)), Segment::Index(i)) => {
                    Node::Block(blocks.get(*i)?)
                }
                _ => return None,
            };
        }
        Some(node)
    }

    fn block_mut(&mut self, segments: &[Segment], path: &str) -> Result<&mut Block> {
        let mut current = self;
        let mut iter = segments.iter().peekable();
        while let Some(segment) = iter.next() {
            let Segment::Key(key) = segment else {
                return Err(ModelError::invalid_path(
                    path,
                    "list index must follow a block list name",
                ));
            };

            if let Some(Segment::Index(index)) = iter.peek() {
                let index = *index;
                iter.next();
                let entry = current
                    .attrs
                    .entry(key.clone())
                    .or_insert_with(|| AttrValue::List(Vec::new()));
                let AttrValue::List(blocks) = entry else {
                    return Err(ModelError::invalid_path(
                        path,
                        format!("\"{}\" is not a block list", key),
                    ));
                };
                if index == blocks.len() {
                    blocks.push(Block::new());
                } else if index > blocks.len() {
                    return Err(ModelError::invalid_path(
                        path,
                        format!("index {} out of range for \"{}\"", index, key),
                    ));
                }
                current = &mut blocks[index];
            } else {
                let entry = current
                    .attrs
                    .entry(key.clone())
                    .or_insert_with(|| AttrValue::Block(Block::new()));
                let AttrValue::Block(block) = entry else {
                    return Err(ModelError::invalid_path(
                        path,
                        format!("\"{}\" is not a block", key),
                    ));
                };
                current = block;
            }
        }
        Ok(current)
    }
}
