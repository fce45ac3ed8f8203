use crate::context::{EditorContext, Effect};
use crate::events::EditorEvent;
use crate::history::{Command, HistoryAction, RestoreEntry};
use crate::record::{lookup, lookup_mut, Record, RecordId};
use crate::schema::SchemaSet;
use crate::selection::SelectionKind;
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Asset identity as recorded at copy time: name, type, and the folder names
/// above it. Pasting into another project re-resolves by this path instead of
/// by id, since ids are project-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardAsset {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub folder_path: Vec<String>,
}

/// Self-contained copy of a forest of entity subtrees. Survives project
/// switches; everything needed to paste elsewhere travels inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardPayload {
    pub project_id: String,
    pub legacy_scripts: bool,
    /// Top-level copied ids, in selection order.
    pub roots: Vec<String>,
    /// Flattened subtrees, keyed by original resource id.
    pub entities: BTreeMap<String, Value>,
    /// Referenced assets, keyed by legacy id.
    pub assets: BTreeMap<String, ClipboardAsset>,
}

impl EditorContext {
    /// Captures the selected subtrees into the clipboard. Copying records no
    /// history and mutates nothing.
    pub fn copy_entities(&mut self, ids: &[String]) -> Result<()> {
        let top = self.collapse_to_top_level(ids);
        if top.is_empty() {
            return Ok(());
        }
        let mut entities = BTreeMap::new();
        for id in &top {
            self.collect_subtree(id, &mut entities);
        }
        let mut assets = BTreeMap::new();
        for data in entities.values() {
            let Some(Value::Object(components)) = data.get("components") else {
                continue;
            };
            for (component_name, component_data) in components {
                for path in self.schema.asset_reference_paths(component_name, component_data) {
                    let Some(legacy_id) = lookup(component_data, &path).and_then(asset_id_string)
                    else {
                        continue;
                    };
                    let Some(unique_id) = self.assets.unique_id_for_legacy(&legacy_id) else {
                        continue;
                    };
                    let (Some(name), Some(ty)) =
                        (self.assets.name_of(unique_id), self.assets.type_of(unique_id))
                    else {
                        continue;
                    };
                    assets.insert(
                        legacy_id.clone(),
                        ClipboardAsset {
                            name: name.to_string(),
                            ty: ty.to_string(),
                            folder_path: self.assets.folder_path_names(unique_id),
                        },
                    );
                }
            }
        }
        self.set_clipboard(ClipboardPayload {
            project_id: self.project_id.clone(),
            legacy_scripts: self.schema.legacy_scripts(),
            roots: top,
            entities,
            assets,
        });
        Ok(())
    }

    fn collect_subtree(&self, id: &str, out: &mut BTreeMap<String, Value>) {
        let Some(record) = self.entities.get(id) else {
            return;
        };
        out.insert(id.to_string(), record.data().clone());
        for child in record.children_ids() {
            self.collect_subtree(&child, out);
        }
    }

    /// Pastes the clipboard under `parent` (the root when None) with fresh
    /// resource ids, remapping internal entity references and, across
    /// projects, asset references by folder path. One history action.
    pub fn paste(&mut self, parent: Option<&str>) -> Result<Vec<String>> {
        let Some(payload) = self.clipboard.clone() else {
            return Ok(Vec::new());
        };
        let dest_parent = parent
            .map(str::to_string)
            .or_else(|| self.root.clone())
            .ok_or_else(|| anyhow!("No parent to paste under"))?;
        if !self.entities.contains_key(&dest_parent) {
            bail!("Paste parent '{dest_parent}' does not exist");
        }

        let cross_project = payload.project_id != self.project_id;
        let mut asset_map: HashMap<String, String> = HashMap::new();
        if cross_project {
            for (legacy_id, info) in &payload.assets {
                // Unresolved assets keep the original id; a dangling numeric
                // id is recoverable, a silently swapped asset is not.
                if let Some(found) =
                    self.assets.resolve_by_path(&info.folder_path, &info.name, &info.ty)
                {
                    asset_map.insert(legacy_id.clone(), found);
                }
            }
        }
        let drop_scripts = payload.legacy_scripts != self.schema.legacy_scripts();

        let mut id_map = HashMap::new();
        for old_id in payload.entities.keys() {
            id_map.insert(old_id.clone(), Uuid::new_v4().to_string());
        }

        // Pass 1: rewrite and register every record with its children array
        // intact. Attaching before all siblings exist would scramble order.
        for (old_id, data) in &payload.entities {
            let new_id = id_map[old_id].clone();
            let mut data = data.clone();
            data["resource_id"] = json!(new_id);
            let mapped_parent = data
                .get("parent")
                .and_then(Value::as_str)
                .and_then(|parent| id_map.get(parent))
                .cloned()
                .unwrap_or_else(|| dest_parent.clone());
            data["parent"] = json!(mapped_parent);
            if let Some(Value::Array(children)) = data.get_mut("children") {
                for child in children.iter_mut() {
                    if let Some(mapped) = child.as_str().and_then(|id| id_map.get(id)) {
                        *child = json!(mapped);
                    }
                }
            }
            rewrite_components(&self.schema, &mut data, &id_map, &asset_map, drop_scripts);
            let record = Record::new(data);
            let wire = record.data().clone();
            self.entities.insert(new_id.clone(), record);
            self.events.push(EditorEvent::EntityAdded { resource_id: new_id.clone() });
            self.sync.send_created(&RecordId::Entity(new_id), wire);
        }

        // Pass 2: wire the parent index for internal edges, then splice the
        // roots into the destination's children.
        for new_id in id_map.values() {
            let children = self
                .entities
                .get(new_id)
                .map(Record::children_ids)
                .unwrap_or_default();
            for child in children {
                self.index.on_child_inserted(new_id, &child);
            }
        }
        let mut new_roots = Vec::new();
        let mut entries = Vec::new();
        for old_root in &payload.roots {
            let Some(new_id) = id_map.get(old_root).cloned() else {
                continue;
            };
            self.entity_insert(&dest_parent, &super::children_path(), json!(&new_id), None)?;
            let index = self.child_index(&new_id).unwrap_or(0);
            // data: None defers to the deleted cache, filled by undo.
            entries.push(RestoreEntry {
                resource_id: new_id.clone(),
                parent: dest_parent.clone(),
                index,
                data: None,
            });
            new_roots.push(new_id);
        }

        self.queue_effect(Effect::SetSelection {
            kind: Some(SelectionKind::Entity),
            items: new_roots.clone(),
        });
        self.history.add(HistoryAction {
            name: "entity.paste".to_string(),
            undo: vec![Command::DeleteEntities { ids: new_roots.clone() }],
            redo: vec![Command::RestoreEntities { entries, references: Default::default() }],
        });
        Ok(new_roots)
    }
}

/// Rewrites component data for a pasted entity: internal entity references
/// through `id_map`, asset references through `asset_map`, and the script
/// component dropped outright when the source and destination projects
/// disagree on the scripting system.
fn rewrite_components(
    schema: &SchemaSet,
    data: &mut Value,
    id_map: &HashMap<String, String>,
    asset_map: &HashMap<String, String>,
    drop_scripts: bool,
) {
    let Some(Value::Object(components)) = data.get_mut("components") else {
        return;
    };
    if drop_scripts {
        components.remove("script");
    }
    for (component_name, component_data) in components.iter_mut() {
        for path in schema.entity_reference_paths(component_name, component_data) {
            let mapped = lookup(component_data, &path)
                .and_then(Value::as_str)
                .and_then(|target| id_map.get(target))
                .cloned();
            if let (Some(mapped), Some(slot)) = (mapped, lookup_mut(component_data, &path)) {
                *slot = json!(mapped);
            }
        }
        for path in schema.asset_reference_paths(component_name, component_data) {
            let mapped = lookup(component_data, &path)
                .and_then(asset_id_string)
                .and_then(|legacy| asset_map.get(&legacy))
                .cloned();
            if let (Some(mapped), Some(slot)) = (mapped, lookup_mut(component_data, &path)) {
                *slot = match mapped.parse::<u64>() {
                    Ok(number) => json!(number),
                    Err(_) => json!(mapped),
                };
            }
        }
    }
}

/// Asset ids appear as JSON numbers in component data but key string maps in
/// the store.
fn asset_id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}
