use serde_json::{Map, Value};
use std::collections::HashMap;

/// Keys that may hold the slot tree, in lookup order
const SLOT_KEYS: [&str; 3] = ["Slots", "slots", "SLOT"];

/// The remote rule document.
///
/// Only the slot tree is interpreted; any other top-level keys are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectsConfig {
    document: Map<String, Value>,
}

impl RedirectsConfig {
    /// Parse a rule document. The document must be a JSON object.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let document: Map<String, Value> = serde_json::from_str(text)?;
        Ok(Self { document })
    }

    /// The slot tree, taken from the first of `Slots`, `slots`, `SLOT`
    /// that is present and is an object
    pub fn slots(&self) -> Option<&Map<String, Value>> {
        SLOT_KEYS
            .iter()
            .find_map(|key| self.document.get(*key).and_then(Value::as_object))
    }
}

/// One declared rule before normalization: string shorthand or object form
#[derive(Debug, Clone, PartialEq)]
pub enum RouteValue {
    Target(String),
    Config(Map<String, Value>),
}

impl RouteValue {
    /// Slot entry value as a rule list; anything that is neither a string
    /// nor an object is dropped
    pub fn coerce(input: &Value) -> Vec<RouteValue> {
        match input {
            Value::Array(items) => items.iter().filter_map(Self::coerce_one).collect(),
            other => Self::coerce_one(other).into_iter().collect(),
        }
    }

    fn coerce_one(value: &Value) -> Option<RouteValue> {
        match value {
            Value::String(target) => Some(RouteValue::Target(target.clone())),
            Value::Object(config) => Some(RouteValue::Config(config.clone())),
            _ => None,
        }
    }
}

/// Flattened slot tree: base path key -> rule list, in first-seen key order
#[derive(Debug, Default, Clone)]
pub struct FlatSlots {
    entries: Vec<(String, Vec<RouteValue>)>,
    index: HashMap<String, usize>,
}

impl FlatSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rules for `key`, concatenating onto any earlier list for the same key
    pub fn push(&mut self, key: &str, rules: Vec<RouteValue>) {
        if rules.is_empty() {
            return;
        }
        match self.index.get(key) {
            Some(&pos) => self.entries[pos].1.extend(rules),
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), rules));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&[RouteValue]> {
        self.index.get(key).map(|&pos| self.entries[pos].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RouteValue])> {
        self.entries
            .iter()
            .map(|(key, rules)| (key.as_str(), rules.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Depth-first flattening of a slot tree. Keys starting with `/` are base
/// paths; every other key is a group whose object value is recursed into.
pub fn flatten_slots(source: &Map<String, Value>) -> FlatSlots {
    let mut out = FlatSlots::new();
    flatten_into(source, &mut out);
    out
}

fn flatten_into(source: &Map<String, Value>, out: &mut FlatSlots) {
    for (key, value) in source {
        if key.starts_with('/') {
            out.push(key, RouteValue::coerce(value));
        } else if let Value::Object(group) = value {
            flatten_into(group, out);
        }
    }
}
