use super::children_path;
use crate::context::EditorContext;
use crate::events::EditorEvent;
use crate::index::ReferenceMap;
use crate::record::RecordId;
use anyhow::Result;
use serde_json::json;

impl EditorContext {
    /// Detaches and drops one entity and its whole subtree. The inverse of
    /// [`EditorContext::add_entity`]: direct mutation, no history entry.
    /// Calling it on an id that no longer exists is a no-op, so a stale
    /// handle held across a remote deletion cannot fault.
    pub fn remove_entity(&mut self, id: &str, references: Option<&ReferenceMap>) -> Result<()> {
        let Some(record) = self.entities.get(id) else {
            return Ok(());
        };
        // Snapshot before any teardown so the cache holds the full subtree
        // linkage, then null every inbound reference while sources are live.
        let snapshot = record.data().clone();
        let children = record.children_ids();
        self.index.cache_deleted(id, snapshot.clone());
        if let Some(map) = references {
            self.apply_reference_update(map, id, None);
        }
        for child in children {
            self.remove_entity(&child, references)?;
        }
        // Not an undoable step, but UI listeners still need the notification.
        self.remove_from_selection(id);
        if let Some(parent) = self.index.parent_of(id).map(str::to_string) {
            if self.entities.contains_key(&parent) {
                self.entity_remove_value(&parent, &children_path(), &json!(id))?;
            }
        }
        self.entities.remove(id);
        self.index.drop_entity(id);
        self.events.push(EditorEvent::EntityRemoved { resource_id: id.to_string() });
        self.sync.send_deleted(&RecordId::Entity(id.to_string()), snapshot);
        Ok(())
    }
}
