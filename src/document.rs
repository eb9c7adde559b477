//! Path addressing into the state document.
//!
//! The state document is a plain JSON tree. Values inside it are addressed
//! with a [`Path`]: an ordered list of segments parsed from a dot-separated
//! string (`"story.beats.2.revealed"`). All-digit segments address array
//! elements; everything else addresses object keys.
//!
//! [`get`] and [`set`] are the only two operations views and the store need:
//! a non-panicking walk, and a pure write that returns a new document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{key}"),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// An address inside the state document.
///
/// The empty string parses to the root path (zero segments), which addresses
/// the whole document. Whole-document change notifications carry the root
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The root path: addresses the whole document.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a dot-separated path string. Never fails: any segment that is
    /// not all digits is an object key.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::root();
        }
        let segments = raw
            .split('.')
            .map(|part| {
                if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
                    match part.parse::<usize>() {
                        Ok(index) => Segment::Index(index),
                        Err(_) => Segment::Key(part.to_string()),
                    }
                } else {
                    Segment::Key(part.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Prefix test used by views to filter change notifications.
    /// Every path starts with the root path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Extend this path with one more segment.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for Path {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

/// Read the value at `path`, or `None` as soon as any intermediate is
/// missing. Never panics.
///
/// An `Index` segment against an object falls back to the stringified key,
/// matching how the persisted layout treats numeric keys.
pub fn get<'a>(document: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = document;
    for segment in path.segments() {
        current = match (current, segment) {
            (Value::Object(map), Segment::Key(key)) => map.get(key)?,
            (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string())?,
            (Value::Array(items), Segment::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path`, returning a new document. The input document is
/// never mutated.
///
/// Missing intermediates are created as empty objects, never as arrays;
/// callers must pre-create arrays before addressing elements by index.
/// An index one past the end of an existing array appends; further past pads
/// with nulls. The root path replaces the whole document.
pub fn set(document: &Value, path: &Path, value: Value) -> Value {
    if path.is_root() {
        return value;
    }
    let mut next = document.clone();
    assign(&mut next, path.segments(), value);
    next
}

fn assign(current: &mut Value, segments: &[Segment], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *current = value;
        return;
    };

    let slot = match segment {
        Segment::Index(index) if current.is_array() => {
            let items = match current {
                Value::Array(items) => items,
                _ => unreachable!("just checked is_array"),
            };
            while items.len() <= *index {
                items.push(Value::Null);
            }
            &mut items[*index]
        }
        Segment::Index(index) => object_slot(current)
            .entry(index.to_string())
            .or_insert(Value::Null),
        Segment::Key(key) => object_slot(current)
            .entry(key.clone())
            .or_insert(Value::Null),
    };

    assign(slot, rest, value);
}

/// View `value` as an object map, replacing it with an empty object first if
/// it is anything else.
fn object_slot(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

/// Recursively merge `incoming` over `base`.
///
/// Keys present in both where both values are objects recurse; any other
/// collision the incoming value wins outright. Arrays are replaced, never
/// merged element-wise. This is the tolerance mechanism for import and for
/// loading documents written by older or newer versions.
pub fn deep_merge(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (key, incoming_value) in incoming_map {
                match base_map.get_mut(&key) {
                    Some(slot) if slot.is_object() && incoming_value.is_object() => {
                        deep_merge(slot, incoming_value);
                    }
                    Some(slot) => *slot = incoming_value,
                    None => {
                        base_map.insert(key, incoming_value);
                    }
                }
            }
        }
        (base, incoming) => *base = incoming,
    }
}
