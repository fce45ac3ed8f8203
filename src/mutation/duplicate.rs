use crate::context::{EditorContext, Effect};
use crate::history::{Command, HistoryAction, RestoreEntry};
use crate::mutation::AddEntityOptions;
use crate::selection::SelectionKind;
use anyhow::{anyhow, Result};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

impl EditorContext {
    /// Clones each selected subtree next to its original. References between
    /// members of the duplicated forest are redirected to the corresponding
    /// clones; references pointing outside the forest keep their original
    /// targets.
    pub fn duplicate_entities(&mut self, ids: &[String]) -> Result<Vec<String>> {
        let mut top = self.collapse_to_top_level(ids);
        if top.is_empty() {
            return Ok(Vec::new());
        }
        // Insert clones in descending sibling order so each insertion lands
        // after its original without shifting the ones still pending.
        top.sort_by_key(|id| std::cmp::Reverse(self.child_index(id).unwrap_or(0)));

        let prior_kind = self.selection.kind();
        let prior_items = self.selection.items().to_vec();

        let mut id_map = HashMap::new();
        let mut new_tops = Vec::new();
        for id in &top {
            let parent = self
                .index
                .parent_of(id)
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Entity '{id}' has no parent, cannot duplicate"))?;
            let index = self.child_index(id).map(|position| position + 1);
            let new_id = self.clone_subtree(id, &parent, index, &mut id_map)?;
            new_tops.push(new_id);
        }

        // Clones still carry the originals' reference values. Redirect every
        // site whose target was part of the duplicated forest.
        for new_root in new_tops.clone() {
            let map = self.scan_references_from(&new_root);
            let targets: Vec<String> = map.targets().map(str::to_string).collect();
            for target in targets {
                if let Some(new_target) = id_map.get(&target).cloned() {
                    for site in map.sites(&target).to_vec() {
                        self.write_reference(&site, json!(new_target));
                    }
                }
            }
        }

        // Snapshot after fix-up so redo replays the redirected values as-is.
        let mut entries = Vec::new();
        for new_id in &new_tops {
            let Some(parent) = self.index.parent_of(new_id).map(str::to_string) else {
                continue;
            };
            let index = self.child_index(new_id).unwrap_or(0);
            let data = self.entities.get(new_id).map(|record| record.data().clone());
            entries.push(RestoreEntry { resource_id: new_id.clone(), parent, index, data });
        }
        entries.sort_by_key(|entry| entry.index);

        self.queue_effect(Effect::SetSelection {
            kind: Some(SelectionKind::Entity),
            items: new_tops.clone(),
        });
        self.history.add(HistoryAction {
            name: "entity.duplicate".to_string(),
            undo: vec![
                Command::DeleteEntities { ids: new_tops.clone() },
                Command::SetSelection { kind: prior_kind, items: prior_items },
            ],
            redo: vec![
                Command::RestoreEntities { entries, references: Default::default() },
                Command::SetSelection {
                    kind: Some(SelectionKind::Entity),
                    items: new_tops.clone(),
                },
            ],
        });
        Ok(new_tops)
    }

    fn clone_subtree(
        &mut self,
        source: &str,
        parent: &str,
        index: Option<usize>,
        id_map: &mut HashMap<String, String>,
    ) -> Result<String> {
        let record = self
            .entities
            .get(source)
            .ok_or_else(|| anyhow!("Entity '{source}' disappeared during duplication"))?;
        let mut data = record.data().clone();
        let children = record.children_ids();
        let new_id = Uuid::new_v4().to_string();
        id_map.insert(source.to_string(), new_id.clone());
        data["resource_id"] = json!(new_id);
        data["children"] = json!([]);
        let options = AddEntityOptions {
            parent: Some(parent.to_string()),
            index,
            ..AddEntityOptions::default()
        };
        self.add_entity(data, options, None)?;
        for child in children {
            self.clone_subtree(&child, &new_id, None, id_map)?;
        }
        Ok(new_id)
    }
}
