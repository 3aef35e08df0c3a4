//! Pipe-delimited flat key expansion into nested trees (spec section 4.1).
//!
//! Galaxy tool templates address parameters both by the flat `"a|b|c"` name
//! and by the nested `$a.b.c` form; the expander produces a map that carries
//! both views so either style of template lookup succeeds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A file reference carried through the input/output environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(rename = "class")]
    pub class: FileClass,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileClass {
    File,
}

impl FileRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            class: FileClass::File,
            path: path.into(),
            url: None,
        }
    }

    pub fn with_url(path: impl Into<String>, url: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            class: FileClass::File,
            url: Some(url.into()),
            path,
        }
    }
}

/// The dynamically-typed tagged sum handed to the template engine, per the
/// "Dynamic input trees" design note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    File(FileRef),
    /// A reference to a declared tool output, rendered as its relative name.
    ToolOutput { name: String },
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    fn as_map_mut(&mut self) -> &mut BTreeMap<String, Value> {
        if !matches!(self, Value::Map(_)) {
            *self = Value::Map(BTreeMap::new());
        }
        match self {
            Value::Map(m) => m,
            _ => unreachable!(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// A flat map of pipe-delimited names to values, as produced by the Input
/// Resolver before expansion.
pub type FlatMap = BTreeMap<String, Value>;

/// Expand a flat, possibly pipe-delimited key map into a nested tree while
/// preserving every original flat key.
///
/// `{"a|b|c": 1, "x": 2}` becomes `{"a|b|c": 1, "x": 2, "a": {"b": {"c": 1}}}`.
/// Existing intermediate maps are reused; a segment that would overwrite a
/// non-map value is overwritten without error.
pub fn expand(flat: &FlatMap) -> FlatMap {
    let mut out: FlatMap = flat.clone();

    for (key, value) in flat {
        let segments: Vec<&str> = key.split('|').collect();
        if segments.len() < 2 {
            continue;
        }

        let mut cursor = &mut out;
        for segment in &segments[..segments.len() - 1] {
            let entry = cursor
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            cursor = entry.as_map_mut();
        }
        cursor.insert(segments[segments.len() - 1].to_string(), value.clone());
    }

    out
}
