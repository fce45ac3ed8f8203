use crate::path::KeyPath;
use crate::record::{Change, Record};
use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Project asset registry. Assets carry a project-scoped numeric `id` and a
/// global `uniqueId`; the display order (folders first, then case-insensitive
/// name) is maintained incrementally so renames never require a full resort.
#[derive(Default)]
pub struct AssetStore {
    records: HashMap<String, Record>,
    legacy_ids: HashMap<String, String>,
    order: Vec<String>,
}

fn legacy_id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(raw) => Some(raw.clone()),
        _ => None,
    }
}

impl AssetStore {
    pub fn new() -> Self {
        AssetStore::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.legacy_ids.clear();
        self.order.clear();
    }

    pub fn get(&self, unique_id: &str) -> Option<&Record> {
        self.records.get(unique_id)
    }

    pub(crate) fn get_mut(&mut self, unique_id: &str) -> Option<&mut Record> {
        self.records.get_mut(unique_id)
    }

    /// Unique id for a project-scoped numeric id (accepts the id as string).
    pub fn unique_id_for_legacy(&self, legacy_id: &str) -> Option<&str> {
        self.legacy_ids.get(legacy_id).map(String::as_str)
    }

    pub fn legacy_id_of(&self, unique_id: &str) -> Option<String> {
        self.records.get(unique_id).and_then(|record| record.data().get("id")).and_then(legacy_id_string)
    }

    /// Unique ids in display order.
    pub fn ordered(&self) -> &[String] {
        &self.order
    }

    pub fn add(&mut self, mut data: Value) -> Result<String> {
        if !data.is_object() {
            bail!("Asset data must be an object");
        }
        let unique_id = match data.get("uniqueId").and_then(Value::as_str) {
            Some(existing) => existing.to_string(),
            None => {
                let fresh = Uuid::new_v4().to_string();
                data["uniqueId"] = Value::String(fresh.clone());
                fresh
            }
        };
        if self.records.contains_key(&unique_id) {
            bail!("Asset '{unique_id}' is already registered");
        }
        if let Some(legacy) = data.get("id").and_then(legacy_id_string) {
            self.legacy_ids.insert(legacy, unique_id.clone());
        }
        let record = Record::new(data);
        let key = self.sort_key_of(&record);
        let position = self.insertion_point(&key);
        self.order.insert(position, unique_id.clone());
        self.records.insert(unique_id.clone(), record);
        Ok(unique_id)
    }

    pub fn remove(&mut self, unique_id: &str) -> Option<Value> {
        let record = self.records.remove(unique_id)?;
        self.order.retain(|existing| existing != unique_id);
        if let Some(legacy) = record.data().get("id").and_then(legacy_id_string) {
            self.legacy_ids.remove(&legacy);
        }
        Some(record.into_data())
    }

    /// Renames an asset and moves it to its new sorted position. Returns the
    /// change for sync/history, or None when the asset is gone (stale handle).
    pub fn rename(&mut self, unique_id: &str, name: &str) -> Result<Option<Change>> {
        let Some(record) = self.records.get_mut(unique_id) else {
            return Ok(None);
        };
        let change = record.set(&KeyPath::parse("name"), Value::String(name.to_string()))?;
        let key = self.sort_key_of(&self.records[unique_id]);
        self.order.retain(|existing| existing != unique_id);
        let position = self.insertion_point(&key);
        self.order.insert(position, unique_id.to_string());
        Ok(Some(change))
    }

    pub fn name_of(&self, unique_id: &str) -> Option<&str> {
        self.records.get(unique_id)?.data().get("name")?.as_str()
    }

    pub fn type_of(&self, unique_id: &str) -> Option<&str> {
        self.records.get(unique_id)?.data().get("type")?.as_str()
    }

    /// Ancestor folder names for an asset, outermost first. Folder ids with
    /// no live asset are skipped.
    pub fn folder_path_names(&self, unique_id: &str) -> Vec<String> {
        let Some(record) = self.records.get(unique_id) else {
            return Vec::new();
        };
        let Some(Value::Array(folders)) = record.data().get("path") else {
            return Vec::new();
        };
        folders
            .iter()
            .filter_map(legacy_id_string)
            .filter_map(|legacy| self.legacy_ids.get(&legacy))
            .filter_map(|uid| self.name_of(uid))
            .map(str::to_string)
            .collect()
    }

    /// Best-effort cross-project resolution: match folder path (by names),
    /// asset name, and type. Returns the matching asset's numeric id.
    pub fn resolve_by_path(&self, folder_names: &[String], name: &str, ty: &str) -> Option<String> {
        for unique_id in &self.order {
            if self.name_of(unique_id) != Some(name) || self.type_of(unique_id) != Some(ty) {
                continue;
            }
            if self.folder_path_names(unique_id) == folder_names {
                return self.legacy_id_of(unique_id);
            }
        }
        None
    }

    fn sort_key_of(&self, record: &Record) -> (u8, String) {
        let is_folder = record.data().get("type").and_then(Value::as_str) == Some("folder");
        let name = record
            .data()
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        (if is_folder { 0 } else { 1 }, name)
    }

    fn insertion_point(&self, key: &(u8, String)) -> usize {
        self.order
            .partition_point(|uid| match self.records.get(uid) {
                Some(record) => self.sort_key_of(record) <= *key,
                None => true,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn asset(id: u64, ty: &str, name: &str) -> Value {
        json!({ "id": id, "uniqueId": format!("u-{id}"), "type": ty, "name": name, "path": [] })
    }

    #[test]
    fn folders_sort_before_files_case_insensitive() {
        let mut store = AssetStore::new();
        store.add(asset(1, "texture", "Zebra.png")).expect("add");
        store.add(asset(2, "folder", "materials")).expect("add");
        store.add(asset(3, "texture", "apple.png")).expect("add");
        store.add(asset(4, "folder", "Animations")).expect("add");
        assert_eq!(store.ordered(), ["u-4", "u-2", "u-3", "u-1"]);
    }

    #[test]
    fn rename_keeps_collection_sorted() {
        let mut store = AssetStore::new();
        store.add(asset(1, "texture", "a.png")).expect("add");
        store.add(asset(2, "texture", "m.png")).expect("add");
        store.add(asset(3, "texture", "z.png")).expect("add");
        store.rename("u-1", "zz.png").expect("rename").expect("asset present");
        assert_eq!(store.ordered(), ["u-2", "u-3", "u-1"]);
        store.rename("u-3", "B.png").expect("rename").expect("asset present");
        assert_eq!(store.ordered(), ["u-3", "u-2", "u-1"]);
    }

    #[test]
    fn resolve_by_path_matches_folder_names() {
        let mut store = AssetStore::new();
        store.add(asset(10, "folder", "Textures")).expect("add folder");
        store
            .add(json!({
                "id": 11, "uniqueId": "u-11", "type": "texture",
                "name": "tex.png", "path": [10]
            }))
            .expect("add texture");
        let found = store.resolve_by_path(&["Textures".to_string()], "tex.png", "texture");
        assert_eq!(found.as_deref(), Some("11"));
        assert_eq!(store.resolve_by_path(&[], "tex.png", "texture"), None);
    }
}
