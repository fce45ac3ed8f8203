use crate::path::{KeyPath, PathSeg};
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One mutation applied to a record, carrying enough payload to construct
/// its inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    Set { old: Option<Value>, new: Value },
    Unset { old: Value },
    Insert { value: Value, index: usize },
    Remove { value: Value, index: usize },
    Move { from: usize, to: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeVerb {
    Set,
    Unset,
    Insert,
    Remove,
    Move,
}

impl Change {
    pub fn verb(&self) -> ChangeVerb {
        match self {
            Change::Set { .. } => ChangeVerb::Set,
            Change::Unset { .. } => ChangeVerb::Unset,
            Change::Insert { .. } => ChangeVerb::Insert,
            Change::Remove { .. } => ChangeVerb::Remove,
            Change::Move { .. } => ChangeVerb::Move,
        }
    }
}

/// Stable identity of a record, independent of the live object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordId {
    Entity(String),
    Asset(String),
}

impl RecordId {
    pub fn id(&self) -> &str {
        match self {
            RecordId::Entity(id) | RecordId::Asset(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub record: RecordId,
    pub path: KeyPath,
    pub change: Change,
}

/// Mutable key-path-addressable JSON record. Every mutation returns a typed
/// [`Change`]; routing it to index maintenance, sync translation, and the
/// history stack is the owner's job.
#[derive(Debug, Clone)]
pub struct Record {
    data: Value,
    history_enabled: bool,
}

impl Record {
    pub fn new(data: Value) -> Self {
        Record { data, history_enabled: true }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    /// Gates whether mutations on this record are captured for undo.
    /// Mutations while disabled still produce change events so index
    /// maintainers and sync bridges stay correct.
    pub fn history_enabled(&self) -> bool {
        self.history_enabled
    }

    pub fn set_history_enabled(&mut self, enabled: bool) {
        self.history_enabled = enabled;
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        lookup(&self.data, path)
    }

    pub fn has(&self, path: &KeyPath) -> bool {
        self.get(path).is_some()
    }

    pub fn get_str(&self, path: &KeyPath) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn set(&mut self, path: &KeyPath, value: Value) -> Result<Change> {
        if path.is_empty() {
            bail!("Cannot set the record root");
        }
        let (slot, created) = ensure_mut(&mut self.data, path)?;
        // An explicitly-null value is a real value; only a freshly created
        // slot has no prior state. Conflating the two makes set+undo drop
        // the key instead of restoring null.
        let old = if created { None } else { Some(slot.clone()) };
        *slot = value.clone();
        Ok(Change::Set { old, new: value })
    }

    pub fn unset(&mut self, path: &KeyPath) -> Result<Option<Change>> {
        let Some((parent_path, last)) = path.split_last() else {
            bail!("Cannot unset the record root");
        };
        let Some(parent) = lookup_mut(&mut self.data, &parent_path) else {
            return Ok(None);
        };
        let old = match (parent, last) {
            (Value::Object(map), PathSeg::Key(key)) => map.remove(key),
            (Value::Array(items), PathSeg::Index(index)) if *index < items.len() => {
                Some(items.remove(*index))
            }
            _ => None,
        };
        Ok(old.map(|old| Change::Unset { old }))
    }

    /// Inserts into the array at `path`, creating it if absent. `index`
    /// defaults to append; out-of-range clamps to the end.
    pub fn insert(&mut self, path: &KeyPath, value: Value, index: Option<usize>) -> Result<Change> {
        let (slot, _) = ensure_mut(&mut self.data, path)?;
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        let Value::Array(items) = slot else {
            bail!("Cannot insert into non-array value at '{path}'");
        };
        let index = index.unwrap_or(items.len()).min(items.len());
        items.insert(index, value.clone());
        Ok(Change::Insert { value, index })
    }

    /// Removes the first element equal to `value` from the array at `path`.
    pub fn remove_value(&mut self, path: &KeyPath, value: &Value) -> Result<Option<Change>> {
        let Some(slot) = lookup_mut(&mut self.data, path) else {
            return Ok(None);
        };
        let Value::Array(items) = slot else {
            bail!("Cannot remove from non-array value at '{path}'");
        };
        let Some(index) = items.iter().position(|item| item == value) else {
            return Ok(None);
        };
        let removed = items.remove(index);
        Ok(Some(Change::Remove { value: removed, index }))
    }

    pub fn remove_at(&mut self, path: &KeyPath, index: usize) -> Result<Option<Change>> {
        let Some(slot) = lookup_mut(&mut self.data, path) else {
            return Ok(None);
        };
        let Value::Array(items) = slot else {
            bail!("Cannot remove from non-array value at '{path}'");
        };
        if index >= items.len() {
            return Ok(None);
        }
        let removed = items.remove(index);
        Ok(Some(Change::Remove { value: removed, index }))
    }

    pub fn move_value(&mut self, path: &KeyPath, from: usize, to: usize) -> Result<Change> {
        let slot = lookup_mut(&mut self.data, path)
            .ok_or_else(|| anyhow!("No array at '{path}' to move within"))?;
        let Value::Array(items) = slot else {
            bail!("Cannot move within non-array value at '{path}'");
        };
        if from >= items.len() {
            bail!("Move source index {from} out of range at '{path}'");
        }
        let value = items.remove(from);
        let to = to.min(items.len());
        items.insert(to, value);
        Ok(Change::Move { from, to })
    }
}

// Entity/asset field conventions shared across the crate.
impl Record {
    pub fn resource_id(&self) -> Option<&str> {
        self.data.get("resource_id").and_then(Value::as_str)
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.data.get("parent").and_then(Value::as_str)
    }

    pub fn children_ids(&self) -> Vec<String> {
        match self.data.get("children") {
            Some(Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.data.get("uniqueId").and_then(Value::as_str)
    }
}

pub(crate) fn lookup<'a>(mut value: &'a Value, path: &KeyPath) -> Option<&'a Value> {
    for seg in path.segs() {
        value = match seg {
            PathSeg::Key(key) => value.get(key)?,
            PathSeg::Index(index) => value.get(index)?,
        };
    }
    Some(value)
}

pub(crate) fn lookup_mut<'a>(mut value: &'a mut Value, path: &KeyPath) -> Option<&'a mut Value> {
    for seg in path.segs() {
        value = match seg {
            PathSeg::Key(key) => value.get_mut(key)?,
            PathSeg::Index(index) => value.get_mut(index)?,
        };
    }
    Some(value)
}

/// Walks to `path`, creating intermediate objects for key segments. Array
/// segments must already exist; silently growing arrays would mask malformed
/// data. The returned flag says whether the final slot was newly created.
fn ensure_mut<'a>(mut value: &'a mut Value, path: &KeyPath) -> Result<(&'a mut Value, bool)> {
    let mut created = false;
    for seg in path.segs() {
        match seg {
            PathSeg::Key(key) => {
                if value.is_null() {
                    *value = Value::Object(serde_json::Map::new());
                }
                let Value::Object(map) = value else {
                    bail!("Cannot descend into non-object value at segment '{key}'");
                };
                created = !map.contains_key(key);
                value = map.entry(key.clone()).or_insert(Value::Null);
            }
            PathSeg::Index(index) => {
                let Value::Array(items) = value else {
                    bail!("Cannot index non-array value at segment '{index}'");
                };
                created = false;
                value = items
                    .get_mut(*index)
                    .ok_or_else(|| anyhow!("Array index {index} out of range"))?;
            }
        }
    }
    Ok((value, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_reports_old_value() {
        let mut record = Record::new(json!({ "name": "box" }));
        let change = record.set(&KeyPath::parse("name"), json!("crate")).expect("set name");
        assert_eq!(change, Change::Set { old: Some(json!("box")), new: json!("crate") });
        assert_eq!(record.get_str(&KeyPath::parse("name")), Some("crate"));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut record = Record::new(json!({}));
        record
            .set(&KeyPath::parse("components.button.imageEntity"), json!("abc"))
            .expect("deep set");
        assert_eq!(record.get_str(&KeyPath::parse("components.button.imageEntity")), Some("abc"));
    }

    #[test]
    fn set_distinguishes_explicit_null_from_absent_key() {
        let mut record = Record::new(json!({ "button": { "imageEntity": null } }));
        let change = record.set(&KeyPath::parse("button.imageEntity"), json!("abc")).expect("set");
        assert_eq!(change, Change::Set { old: Some(Value::Null), new: json!("abc") });
        let change = record.set(&KeyPath::parse("button.hoverEntity"), json!("xyz")).expect("set");
        assert_eq!(change, Change::Set { old: None, new: json!("xyz") });
    }

    #[test]
    fn insert_and_remove_carry_index() {
        let mut record = Record::new(json!({ "children": ["a", "c"] }));
        let path = KeyPath::parse("children");
        let change = record.insert(&path, json!("b"), Some(1)).expect("insert");
        assert_eq!(change, Change::Insert { value: json!("b"), index: 1 });
        let change = record.remove_value(&path, &json!("c")).expect("remove").expect("present");
        assert_eq!(change, Change::Remove { value: json!("c"), index: 2 });
        assert_eq!(record.children_ids(), vec!["a", "b"]);
    }

    #[test]
    fn move_clamps_destination() {
        let mut record = Record::new(json!({ "children": ["a", "b", "c"] }));
        record.move_value(&KeyPath::parse("children"), 0, 9).expect("move");
        assert_eq!(record.children_ids(), vec!["b", "c", "a"]);
    }

    #[test]
    fn unset_missing_path_is_none() {
        let mut record = Record::new(json!({}));
        assert!(record.unset(&KeyPath::parse("components.sprite")).expect("unset").is_none());
    }
}
