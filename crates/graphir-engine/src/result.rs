//! Engine result decoding.
//!
//! The execution engine answers with one [`QueryResult`] per batch. The
//! decoder turns it into client-visible JSON values: graph elements become
//! id lists (`[id]` for vertices, `[src, dst]` for edges), tag entries are
//! keyed by tag name, and literal values map to their JSON counterparts.

use graphir_common::types::Value;
use graphir_common::utils::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};
use tracing::error;

/// A batch of engine results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryResult {
    /// Paths of graph elements.
    Paths(Vec<Vec<GraphElement>>),
    /// Graph elements.
    Elements(Vec<GraphElement>),
    /// Records of tagged values.
    TagEntries(Vec<Vec<TagEntry>>),
    /// Key/value pairs, as produced by `group()`.
    MapResult(Vec<PairEntry>),
    /// A single value.
    Value(Value),
    /// A list of values.
    ValueList(Vec<Value>),
}

/// A vertex or edge reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphElement {
    /// A vertex.
    Vertex {
        /// Vertex id.
        id: i64,
    },
    /// An edge.
    Edge {
        /// Source vertex id.
        src_id: i64,
        /// Target vertex id.
        dst_id: i64,
    },
    /// The engine sent an element without a payload.
    Unset,
}

/// One tagged value of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagEntry {
    /// Tag id, resolved through the [`TagTable`].
    pub tag: u32,
    /// The value bound to the tag.
    pub value: OneTagValue,
}

/// Value bound to a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneTagValue {
    /// A graph element.
    Element(GraphElement),
    /// A literal value.
    Value(Value),
    /// A property map.
    Properties(IndexMap<String, Value>),
}

/// One key/value pair of a map result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairEntry {
    /// Key.
    pub first: PairElement,
    /// Value.
    pub second: PairElement,
}

/// Either side of a [`PairEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairElement {
    /// A graph element.
    GraphElement(GraphElement),
    /// A literal value.
    Value(Value),
    /// A list of graph elements.
    GraphElementList(Vec<GraphElement>),
    /// A list of values.
    ValueList(Vec<Value>),
}

/// Tag id to tag name mapping agreed with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagTable {
    names: IndexMap<u32, String>,
}

impl TagTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` under `id`.
    pub fn insert(&mut self, id: u32, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Returns the name registered under `id`.
    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }
}

impl FromIterator<(u32, String)> for TagTable {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// Decodes engine results.
#[derive(Debug, Clone, Default)]
pub struct ResultDecoder {
    tags: TagTable,
}

impl ResultDecoder {
    /// Creates a decoder resolving tag ids through `tags`.
    pub fn new(tags: TagTable) -> Self {
        Self { tags }
    }

    /// Decodes one batch into client-visible values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a record refers to an unknown tag.
    pub fn decode(&self, result: &QueryResult) -> Result<Vec<Json>> {
        Ok(match result {
            QueryResult::Paths(paths) => paths
                .iter()
                .map(|path| Json::Array(path.iter().map(element).collect()))
                .collect(),
            QueryResult::Elements(elements) => elements.iter().map(element).collect(),
            QueryResult::TagEntries(records) => records
                .iter()
                .map(|entries| self.tag_entries(entries))
                .collect::<Result<_>>()?,
            QueryResult::MapResult(pairs) => pairs
                .iter()
                .map(|pair| {
                    let mut entry = Map::with_capacity(2);
                    entry.insert("key".into(), pair_element(&pair.first));
                    entry.insert("value".into(), pair_element(&pair.second));
                    Json::Object(entry)
                })
                .collect(),
            QueryResult::Value(v) => vec![value(v)],
            QueryResult::ValueList(values) => values.iter().map(value).collect(),
        })
    }

    /// A record with a single entry decodes to its bare value.
    fn tag_entries(&self, entries: &[TagEntry]) -> Result<Json> {
        let mut record = Map::with_capacity(entries.len());
        for entry in entries {
            let name = self
                .tags
                .name(entry.tag)
                .ok_or_else(|| Error::Decode(format!("unknown tag id {}", entry.tag)))?;
            record.insert(name.to_string(), one_tag_value(&entry.value));
        }
        if entries.len() == 1 {
            if let Some((_, only)) = record.into_iter().next() {
                return Ok(only);
            }
            return Ok(Json::Null);
        }
        Ok(Json::Object(record))
    }
}

fn element(e: &GraphElement) -> Json {
    match e {
        GraphElement::Vertex { id } => Json::Array(vec![Json::from(*id)]),
        GraphElement::Edge { src_id, dst_id } => {
            Json::Array(vec![Json::from(*src_id), Json::from(*dst_id)])
        }
        GraphElement::Unset => {
            error!("graph element type not set");
            Json::Array(Vec::new())
        }
    }
}

fn one_tag_value(v: &OneTagValue) -> Json {
    match v {
        OneTagValue::Element(e) => element(e),
        OneTagValue::Value(v) => value(v),
        OneTagValue::Properties(props) => Json::Object(
            props
                .iter()
                .map(|(k, v)| (k.clone(), value(v)))
                .collect(),
        ),
    }
}

fn pair_element(p: &PairElement) -> Json {
    match p {
        PairElement::GraphElement(e) => element(e),
        PairElement::Value(v) => value(v),
        PairElement::GraphElementList(items) => Json::Array(items.iter().map(element).collect()),
        PairElement::ValueList(items) => Json::Array(items.iter().map(value).collect()),
    }
}

fn value(v: &Value) -> Json {
    match v {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int64(i) => Json::from(*i),
        Value::Float64(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.to_string()),
        Value::List(items) => Json::Array(items.iter().map(value).collect()),
    }
}
