use crate::context::EditorContext;
use crate::history::{Command, HistoryAction, RestoreEntry};
use crate::index::ReferenceMap;
use anyhow::Result;
use std::collections::HashSet;

impl EditorContext {
    /// Drops stale ids, the root, and any id whose ancestor is also in the
    /// set: deleting or cloning an ancestor already covers the descendant.
    pub(crate) fn collapse_to_top_level(&self, ids: &[String]) -> Vec<String> {
        let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| self.entities.contains_key(*id))
            .filter(|id| self.root.as_deref() != Some(id.as_str()))
            .filter(|id| {
                let mut current = self.index.parent_of(id);
                while let Some(ancestor) = current {
                    if requested.contains(ancestor) {
                        return false;
                    }
                    current = self.index.parent_of(ancestor);
                }
                true
            })
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    /// Deletes a batch of entities (subtrees included) as one history action.
    /// One reference snapshot is taken over the whole scene before anything
    /// is removed; every record in the batch nulls against that same view.
    pub fn delete_entities(&mut self, ids: &[String]) -> Result<()> {
        let top = self.collapse_to_top_level(ids);
        if top.is_empty() {
            return Ok(());
        }
        let mut entries = Vec::new();
        for id in &top {
            let Some(parent) = self.index.parent_of(id).map(str::to_string) else {
                continue;
            };
            let index = self.child_index(id).unwrap_or(0);
            let data = self.entities.get(id).map(|record| record.data().clone());
            entries.push(RestoreEntry { resource_id: id.clone(), parent, index, data });
        }
        let map = match self.root.clone() {
            Some(root) => self.scan_references_from(&root),
            None => ReferenceMap::default(),
        };
        for id in &top {
            self.remove_entity(id, Some(&map))?;
        }
        // Ascending sibling index so undo re-inserts without shifting later
        // entries out of place.
        entries.sort_by_key(|entry| entry.index);
        self.history.add(HistoryAction {
            name: "entity.delete".to_string(),
            undo: vec![Command::RestoreEntities { entries, references: map }],
            redo: vec![Command::DeleteEntities { ids: top }],
        });
        Ok(())
    }
}
