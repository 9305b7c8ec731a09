//! Raw YAML document model.
//!
//! The file is decoded into [`RawNode`] rather than `serde_yaml::Value` so
//! that mapping order is kept and a key written twice in the same mapping
//! fails immediately with `key "<key>" already set in map`.

use std::collections::HashSet;
use std::fmt;
use std::path::Path as FsPath;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_yaml::Value;

use crate::error::YamlfigError;

#[derive(Debug, Clone, PartialEq)]
pub enum RawNode {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Seq(Vec<RawNode>),
    Map(Vec<(String, RawNode)>),
}

impl RawNode {
    /// Parse a YAML document. An empty document yields `None`.
    pub fn parse(content: &str, path: &FsPath) -> Result<Option<RawNode>, YamlfigError> {
        let node: RawNode = serde_yaml::from_str(content).map_err(|e| YamlfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(match node {
            RawNode::Null => None,
            other => Some(other),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawNode::Null)
    }

    /// Short description used in type mismatch messages.
    pub fn describe(&self) -> &'static str {
        match self {
            RawNode::Null => "null",
            RawNode::Bool(_) => "a bool",
            RawNode::Int(_) | RawNode::UInt(_) => "an integer",
            RawNode::Float(_) => "a float",
            RawNode::String(_) => "a string",
            RawNode::Seq(_) => "a sequence",
            RawNode::Map(_) => "a mapping",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RawNode::Null => Value::Null,
            RawNode::Bool(b) => Value::Bool(*b),
            RawNode::Int(i) => Value::Number((*i).into()),
            RawNode::UInt(u) => Value::Number((*u).into()),
            RawNode::Float(f) => Value::Number((*f).into()),
            RawNode::String(s) => Value::String(s.clone()),
            RawNode::Seq(items) => Value::Sequence(items.iter().map(RawNode::to_value).collect()),
            RawNode::Map(entries) => Value::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.to_value()))
                    .collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for RawNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawNodeVisitor)
    }
}

struct RawNodeVisitor;

impl<'de> Visitor<'de> for RawNodeVisitor {
    type Value = RawNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a YAML scalar, sequence or mapping")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<RawNode, E> {
        Ok(RawNode::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawNode, E> {
        Ok(RawNode::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawNode, E> {
        Ok(RawNode::UInt(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawNode, E> {
        Ok(RawNode::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RawNode, E> {
        Ok(RawNode::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<RawNode, E> {
        Ok(RawNode::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawNode, E> {
        Ok(RawNode::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<RawNode, E> {
        Ok(RawNode::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawNode, D::Error> {
        RawNode::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawNode, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(RawNode::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawNode, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        let mut seen = HashSet::new();
        while let Some(RawKey(key)) = map.next_key()? {
            if !seen.insert(key.clone()) {
                return Err(de::Error::custom(format_args!(
                    "key \"{key}\" already set in map"
                )));
            }
            let value = map.next_value()?;
            entries.push((key, value));
        }
        Ok(RawNode::Map(entries))
    }
}

/// Mapping key rendered as a string; YAML allows `1: x` or `true: y`.
struct RawKey(String);

impl<'de> Deserialize<'de> for RawKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawKeyVisitor)
    }
}

struct RawKeyVisitor;

impl<'de> Visitor<'de> for RawKeyVisitor {
    type Value = RawKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar mapping key")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<RawKey, E> {
        Ok(RawKey(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawKey, E> {
        Ok(RawKey(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawKey, E> {
        Ok(RawKey(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawKey, E> {
        Ok(RawKey(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RawKey, E> {
        Ok(RawKey(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<RawKey, E> {
        Ok(RawKey(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawKey, E> {
        Ok(RawKey("~".to_string()))
    }
}
