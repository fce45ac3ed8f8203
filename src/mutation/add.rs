use super::{children_path, parent_path};
use crate::context::{EditorContext, Effect};
use crate::events::EditorEvent;
use crate::history::{Command, HistoryAction, RestoreEntry};
use crate::index::ReferenceMap;
use crate::record::{Record, RecordId};
use crate::selection::SelectionKind;
use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};
use uuid::Uuid;

/// Runs once after the entity's whole subtree is attached. Used by composite
/// widget templates whose components must reference children that only exist
/// once the full hierarchy is built.
pub type PostCreate = Box<dyn FnOnce(&mut EditorContext, &str)>;

pub struct AddEntityOptions {
    /// Parent resource id; None attaches under the root.
    pub parent: Option<String>,
    /// Position in the parent's children; None appends.
    pub index: Option<usize>,
    /// Defer setting the global selection to the new entity.
    pub select: bool,
    pub post_create: Option<PostCreate>,
}

impl Default for AddEntityOptions {
    fn default() -> Self {
        AddEntityOptions { parent: None, index: None, select: false, post_create: None }
    }
}

impl EditorContext {
    /// Attaches a new entity (and any nested child definitions) under a
    /// parent. The primitive behind create/undo-restore/duplicate/paste; it
    /// mutates directly and records nothing on the history stack itself.
    ///
    /// Child definitions may be inline objects or resource ids resolved from
    /// the deleted cache (the redo-after-delete path). Anything else is
    /// malformed data and fails the whole call.
    pub fn add_entity(
        &mut self,
        mut data: Value,
        options: AddEntityOptions,
        references: Option<&ReferenceMap>,
    ) -> Result<String> {
        if !data.is_object() {
            bail!("Entity definition must be an object, got {data}");
        }
        let parent_id = options
            .parent
            .clone()
            .or_else(|| self.root.clone())
            .ok_or_else(|| anyhow!("No parent for new entity and no root loaded"))?;
        if !self.entities.contains_key(&parent_id) {
            bail!("Parent entity '{parent_id}' does not exist");
        }
        let resource_id = match data.get("resource_id").and_then(Value::as_str) {
            Some(existing) => existing.to_string(),
            None => {
                let fresh = Uuid::new_v4().to_string();
                data["resource_id"] = json!(fresh);
                fresh
            }
        };
        if self.entities.contains_key(&resource_id) {
            bail!("Entity '{resource_id}' already exists");
        }

        // Flatten nested child definitions so recursion below re-adds them as
        // individually tracked entities rather than raw data.
        let child_defs = match data.get_mut("children") {
            Some(children) => std::mem::replace(children, json!([])),
            None => {
                data["children"] = json!([]);
                json!([])
            }
        };
        data["parent"] = json!(parent_id);

        let record = Record::new(data);
        let payload = record.data().clone();
        self.entities.insert(resource_id.clone(), record);
        self.index.on_child_inserted(&parent_id, &resource_id);
        self.events.push(EditorEvent::EntityAdded { resource_id: resource_id.clone() });
        self.sync.send_created(&RecordId::Entity(resource_id.clone()), payload);

        // Structural linkage is part of the atomic add, never a separately
        // undoable step.
        self.entity_insert(&parent_id, &children_path(), json!(resource_id), options.index)?;

        if options.select {
            self.queue_effect(Effect::SetSelection {
                kind: Some(SelectionKind::Entity),
                items: vec![resource_id.clone()],
            });
        }

        if let Value::Array(defs) = child_defs {
            for def in defs {
                let child_data = match def {
                    Value::Object(_) => def,
                    Value::String(child_id) => self
                        .index
                        .deleted(&child_id)
                        .cloned()
                        .ok_or_else(|| anyhow!("Unrecognized child reference '{child_id}'"))?,
                    other => bail!("Unrecognized child definition: {other}"),
                };
                let child_options =
                    AddEntityOptions { parent: Some(resource_id.clone()), ..AddEntityOptions::default() };
                self.add_entity(child_data, child_options, references)?;
            }
        } else {
            bail!("Entity children must be an array");
        }

        if let Some(map) = references {
            self.restore_references(map, &resource_id);
        }
        if let Some(callback) = options.post_create {
            callback(self, &resource_id);
        }
        Ok(resource_id)
    }

    /// User-facing create: adds the entity and records one history action.
    pub fn create_entity(&mut self, data: Value, options: AddEntityOptions) -> Result<String> {
        let id = self.add_entity(data, options, None)?;
        let parent = self
            .index
            .parent_of(&id)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Created entity '{id}' has no parent"))?;
        let index = self.child_index(&id).unwrap_or(0);
        let snapshot = self
            .entities
            .get(&id)
            .map(|record| record.data().clone())
            .ok_or_else(|| anyhow!("Created entity '{id}' vanished"))?;
        self.history.add(HistoryAction {
            name: "entity.create".to_string(),
            undo: vec![Command::DeleteEntities { ids: vec![id.clone()] }],
            redo: vec![Command::RestoreEntities {
                entries: vec![RestoreEntry {
                    resource_id: id.clone(),
                    parent,
                    index,
                    data: Some(snapshot),
                }],
                references: ReferenceMap::default(),
            }],
        });
        Ok(id)
    }

    /// Creates an entity carrying default data for the named component types.
    pub fn create_entity_with_components(
        &mut self,
        name: &str,
        components: &[&str],
        options: AddEntityOptions,
    ) -> Result<String> {
        let mut component_map = serde_json::Map::new();
        for component in components {
            let defaults = self
                .schema
                .default_component(component)
                .ok_or_else(|| anyhow!("Unknown component type '{component}'"))?;
            component_map.insert(component.to_string(), defaults);
        }
        let data = json!({ "name": name, "components": component_map, "children": [] });
        self.create_entity(data, options)
    }

    /// Moves `child` under `parent` at `index` without touching history.
    pub(crate) fn attach_entity(&mut self, child: &str, parent: &str, index: Option<usize>) -> Result<()> {
        if let Some(old_parent) = self.index.parent_of(child).map(str::to_string) {
            if self.entities.contains_key(&old_parent) {
                self.entity_remove_value(&old_parent, &children_path(), &json!(child))?;
            }
        }
        self.entity_insert(parent, &children_path(), json!(child), index)?;
        self.entity_set(child, &parent_path(), json!(parent))?;
        Ok(())
    }

    /// Reparents an entity, recording a history action. Rejects cycles and
    /// moving the root.
    pub fn reparent(&mut self, id: &str, new_parent: &str, index: Option<usize>) -> Result<()> {
        if !self.entities.contains_key(id) || !self.entities.contains_key(new_parent) {
            bail!("Cannot reparent: entity or target parent does not exist");
        }
        if self.root.as_deref() == Some(id) {
            bail!("Cannot reparent the root entity");
        }
        if id == new_parent || self.index.has_ancestor(new_parent, id) {
            bail!("Cannot reparent '{id}' under its own subtree");
        }
        let old_parent = self
            .index
            .parent_of(id)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Entity '{id}' has no current parent"))?;
        let old_index = self.child_index(id).unwrap_or(0);
        self.attach_entity(id, new_parent, index)?;
        let new_index = self.child_index(id).unwrap_or(0);
        self.history.add(HistoryAction {
            name: "entity.reparent".to_string(),
            undo: vec![Command::SetParent {
                child: id.to_string(),
                parent: old_parent,
                index: old_index,
            }],
            redo: vec![Command::SetParent {
                child: id.to_string(),
                parent: new_parent.to_string(),
                index: new_index,
            }],
        });
        Ok(())
    }
}
