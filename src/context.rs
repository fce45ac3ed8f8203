use crate::assets::AssetStore;
use crate::config::EditorConfig;
use crate::events::{EditorEvent, EventBus};
use crate::history::{Command, HistoryStack};
use crate::index::{scan_references, ReferenceIndex, ReferenceMap, ReferenceSite};
use crate::mutation::clipboard::ClipboardPayload;
use crate::mutation::AddEntityOptions;
use crate::path::{KeyPath, PathSeg};
use crate::record::{Change, ChangeEvent, Record, RecordId};
use crate::schema::SchemaSet;
use crate::selection::{Selection, SelectionKind};
use crate::snapshot::ProjectSnapshot;
use crate::sync::{SceneOp, SyncBridge};
use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// Deferred tail effect of a mutation, run on the next "tick" via
/// [`EditorContext::flush_effects`]. Selection updates wait for the current
/// synchronous mutation and its listeners to finish; reference restoration
/// deliberately delays its second write so live systems observe a value
/// transition instead of missing a same-tick set.
#[derive(Debug, Clone)]
pub enum Effect {
    SetSelection { kind: Option<SelectionKind>, items: Vec<String> },
    WriteReference { site: ReferenceSite, value: Value },
}

/// Owns the entity/asset registries, derived indices, history, and sync
/// queues for one loaded project. Single logical writer: all local mutations
/// run synchronously through this object; remote ops merge one at a time.
pub struct EditorContext {
    pub(crate) config: EditorConfig,
    pub(crate) project_id: String,
    pub(crate) schema: SchemaSet,
    pub(crate) entities: HashMap<String, Record>,
    pub(crate) root: Option<String>,
    pub(crate) assets: AssetStore,
    pub(crate) index: ReferenceIndex,
    pub(crate) history: HistoryStack,
    pub(crate) sync: SyncBridge,
    pub(crate) selection: Selection,
    pub(crate) clipboard: Option<ClipboardPayload>,
    pub(crate) events: EventBus,
    pub(crate) effects: VecDeque<Effect>,
}

impl EditorContext {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_schema(config, SchemaSet::with_builtin_components())
    }

    pub fn with_schema(config: EditorConfig, schema: SchemaSet) -> Self {
        let history = HistoryStack::with_limit(config.history_limit);
        EditorContext {
            config,
            project_id: String::new(),
            schema,
            entities: HashMap::new(),
            root: None,
            assets: AssetStore::new(),
            index: ReferenceIndex::new(),
            history,
            sync: SyncBridge::new(),
            selection: Selection::default(),
            clipboard: None,
            events: EventBus::default(),
            effects: VecDeque::new(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn schema(&self) -> &SchemaSet {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut SchemaSet {
        &mut self.schema
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStack {
        &mut self.history
    }

    pub fn sync(&self) -> &SyncBridge {
        &self.sync
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.sync.set_connected(connected);
    }

    // ---- lifecycle ----------------------------------------------------

    /// Replaces all project-scoped state from a snapshot. The clipboard
    /// survives; it is the one piece of state that crosses projects.
    pub fn load(&mut self, snapshot: ProjectSnapshot) -> Result<()> {
        self.clear();
        self.project_id = snapshot.project_id;
        self.schema.set_legacy_scripts(snapshot.legacy_scripts);
        let mut roots = Vec::new();
        for data in snapshot.entities {
            if !data.is_object() {
                bail!("Snapshot entity is not an object");
            }
            let record = Record::new(data);
            let id = record
                .resource_id()
                .ok_or_else(|| anyhow!("Snapshot entity is missing a resource_id"))?
                .to_string();
            if record.parent_id().is_none() {
                roots.push(id.clone());
            }
            self.entities.insert(id, record);
        }
        match roots.as_slice() {
            [single] => self.root = Some(single.clone()),
            [] => bail!("Snapshot has no root entity"),
            many => bail!("Snapshot has {} root entities, expected exactly one", many.len()),
        }
        let pairs: Vec<(String, String)> = self
            .entities
            .iter()
            .flat_map(|(id, record)| {
                record.children_ids().into_iter().map(move |child| (id.clone(), child))
            })
            .collect();
        for (parent, child) in pairs {
            self.index.on_child_inserted(&parent, &child);
        }
        for data in snapshot.assets {
            self.assets.add(data)?;
        }
        Ok(())
    }

    /// Drops all project-scoped state (scene unload, realtime disconnect).
    pub fn clear(&mut self) {
        self.project_id.clear();
        self.entities.clear();
        self.root = None;
        self.assets.clear();
        self.index.clear();
        self.history.clear();
        self.sync.clear();
        self.selection.clear();
        self.effects.clear();
        self.events.drain();
    }

    pub fn export(&self) -> ProjectSnapshot {
        let mut entities = Vec::new();
        if let Some(root) = &self.root {
            self.export_subtree(root, &mut entities);
        }
        let assets =
            self.assets.ordered().iter().filter_map(|uid| self.assets.get(uid)).map(|record| record.data().clone()).collect();
        ProjectSnapshot {
            project_id: self.project_id.clone(),
            legacy_scripts: self.schema.legacy_scripts(),
            entities,
            assets,
        }
    }

    fn export_subtree(&self, id: &str, out: &mut Vec<Value>) {
        let Some(record) = self.entities.get(id) else {
            return;
        };
        out.push(record.data().clone());
        for child in record.children_ids() {
            self.export_subtree(&child, out);
        }
    }

    // ---- entity access ------------------------------------------------

    pub fn root_id(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn entity(&self, id: &str) -> Option<&Record> {
        self.entities.get(id)
    }

    pub fn entity_exists(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.index.parent_of(id)
    }

    pub fn child_index(&self, id: &str) -> Option<usize> {
        let parent = self.index.parent_of(id)?;
        self.entities.get(parent)?.children_ids().iter().position(|child| child == id)
    }

    // ---- change dispatch ----------------------------------------------

    /// Routes one change event: children-list edits keep the parent index
    /// current, then the sync bridge translates the event outbound. Wired
    /// here once so no mutation site has to remember to call the index.
    pub(crate) fn dispatch(&mut self, event: ChangeEvent) {
        if let RecordId::Entity(id) = &event.record {
            if event.path.segs() == [PathSeg::key("children")] {
                match &event.change {
                    Change::Insert { value, .. } => {
                        if let Some(child) = value.as_str() {
                            self.index.on_child_inserted(id, child);
                        }
                    }
                    Change::Remove { value, .. } => {
                        if let Some(child) = value.as_str() {
                            self.index.on_child_removed(id, child);
                        }
                    }
                    _ => {}
                }
            }
        }
        self.sync.observe(&event);
    }

    pub(crate) fn entity_set(&mut self, id: &str, path: &KeyPath, value: Value) -> Result<Change> {
        let record =
            self.entities.get_mut(id).ok_or_else(|| anyhow!("Unknown entity '{id}'"))?;
        let change = record.set(path, value)?;
        self.dispatch(ChangeEvent {
            record: RecordId::Entity(id.to_string()),
            path: path.clone(),
            change: change.clone(),
        });
        Ok(change)
    }

    pub(crate) fn entity_unset(&mut self, id: &str, path: &KeyPath) -> Result<Option<Change>> {
        let record =
            self.entities.get_mut(id).ok_or_else(|| anyhow!("Unknown entity '{id}'"))?;
        let Some(change) = record.unset(path)? else {
            return Ok(None);
        };
        self.dispatch(ChangeEvent {
            record: RecordId::Entity(id.to_string()),
            path: path.clone(),
            change: change.clone(),
        });
        Ok(Some(change))
    }

    pub(crate) fn entity_insert(
        &mut self,
        id: &str,
        path: &KeyPath,
        value: Value,
        index: Option<usize>,
    ) -> Result<Change> {
        let record =
            self.entities.get_mut(id).ok_or_else(|| anyhow!("Unknown entity '{id}'"))?;
        let change = record.insert(path, value, index)?;
        self.dispatch(ChangeEvent {
            record: RecordId::Entity(id.to_string()),
            path: path.clone(),
            change: change.clone(),
        });
        Ok(change)
    }

    pub(crate) fn entity_remove_value(
        &mut self,
        id: &str,
        path: &KeyPath,
        value: &Value,
    ) -> Result<Option<Change>> {
        let record =
            self.entities.get_mut(id).ok_or_else(|| anyhow!("Unknown entity '{id}'"))?;
        let Some(change) = record.remove_value(path, value)? else {
            return Ok(None);
        };
        self.dispatch(ChangeEvent {
            record: RecordId::Entity(id.to_string()),
            path: path.clone(),
            change: change.clone(),
        });
        Ok(Some(change))
    }

    pub(crate) fn entity_remove_at(
        &mut self,
        id: &str,
        path: &KeyPath,
        index: usize,
    ) -> Result<Option<Change>> {
        let record =
            self.entities.get_mut(id).ok_or_else(|| anyhow!("Unknown entity '{id}'"))?;
        let Some(change) = record.remove_at(path, index)? else {
            return Ok(None);
        };
        self.dispatch(ChangeEvent {
            record: RecordId::Entity(id.to_string()),
            path: path.clone(),
            change: change.clone(),
        });
        Ok(Some(change))
    }

    pub(crate) fn entity_move(
        &mut self,
        id: &str,
        path: &KeyPath,
        from: usize,
        to: usize,
    ) -> Result<Change> {
        let record =
            self.entities.get_mut(id).ok_or_else(|| anyhow!("Unknown entity '{id}'"))?;
        let change = record.move_value(path, from, to)?;
        self.dispatch(ChangeEvent {
            record: RecordId::Entity(id.to_string()),
            path: path.clone(),
            change: change.clone(),
        });
        Ok(change)
    }

    pub(crate) fn asset_set(&mut self, uid: &str, path: &KeyPath, value: Value) -> Result<Change> {
        let record = self.assets.get_mut(uid).ok_or_else(|| anyhow!("Unknown asset '{uid}'"))?;
        let change = record.set(path, value)?;
        self.dispatch(ChangeEvent {
            record: RecordId::Asset(uid.to_string()),
            path: path.clone(),
            change: change.clone(),
        });
        Ok(change)
    }

    pub(crate) fn asset_unset(&mut self, uid: &str, path: &KeyPath) -> Result<Option<Change>> {
        let record = self.assets.get_mut(uid).ok_or_else(|| anyhow!("Unknown asset '{uid}'"))?;
        let Some(change) = record.unset(path)? else {
            return Ok(None);
        };
        self.dispatch(ChangeEvent {
            record: RecordId::Asset(uid.to_string()),
            path: path.clone(),
            change: change.clone(),
        });
        Ok(Some(change))
    }

    // ---- user-level field edits (history-recorded) ---------------------

    /// Sets one entity field, recording a single-command history action when
    /// both the global stack and the record's history flag allow it.
    pub fn set_entity_field(&mut self, id: &str, path: &KeyPath, value: Value) -> Result<()> {
        let record_history = self.history.enabled()
            && self.entities.get(id).map(Record::history_enabled).unwrap_or(false);
        let change = self.entity_set(id, path, value)?;
        if record_history {
            if let Change::Set { old, new } = change {
                let record = RecordId::Entity(id.to_string());
                self.history.add(crate::history::HistoryAction {
                    name: format!("entity.{path}"),
                    undo: vec![Command::SetField { record: record.clone(), path: path.clone(), value: old }],
                    redo: vec![Command::SetField { record, path: path.clone(), value: Some(new) }],
                });
            }
        }
        Ok(())
    }

    /// Renames an asset, keeping the collection sorted and recording history.
    pub fn rename_asset(&mut self, uid: &str, name: &str) -> Result<()> {
        let record_history =
            self.history.enabled() && self.assets.get(uid).map(Record::history_enabled).unwrap_or(false);
        let Some(change) = self.assets.rename(uid, name)? else {
            return Ok(());
        };
        let path = KeyPath::parse("name");
        self.dispatch(ChangeEvent {
            record: RecordId::Asset(uid.to_string()),
            path: path.clone(),
            change: change.clone(),
        });
        if record_history {
            if let Change::Set { old, new } = change {
                let record = RecordId::Asset(uid.to_string());
                self.history.add(crate::history::HistoryAction {
                    name: "asset.rename".to_string(),
                    undo: vec![Command::SetField { record: record.clone(), path: path.clone(), value: old }],
                    redo: vec![Command::SetField { record, path, value: Some(new) }],
                });
            }
        }
        Ok(())
    }

    pub fn set_entity_history_enabled(&mut self, id: &str, enabled: bool) {
        if let Some(record) = self.entities.get_mut(id) {
            record.set_history_enabled(enabled);
        }
    }

    // ---- selection service --------------------------------------------

    pub fn selection_kind(&self) -> Option<SelectionKind> {
        self.selection.kind()
    }

    pub fn selection_items(&self) -> Vec<String> {
        self.selection.items().to_vec()
    }

    pub fn set_selection(&mut self, kind: SelectionKind, items: Vec<String>) {
        self.selection.set(kind, items);
        self.emit_selection_changed();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.emit_selection_changed();
    }

    pub fn add_to_selection(&mut self, kind: SelectionKind, item: String) {
        self.selection.add(kind, item);
        self.emit_selection_changed();
    }

    pub fn remove_from_selection(&mut self, item: &str) {
        if self.selection.remove(item) {
            self.emit_selection_changed();
        }
    }

    fn emit_selection_changed(&mut self) {
        self.events.push(EditorEvent::SelectionChanged {
            kind: self.selection.kind(),
            items: self.selection.items().to_vec(),
        });
    }

    // ---- clipboard store ----------------------------------------------

    pub fn get_clipboard(&self) -> Option<&ClipboardPayload> {
        self.clipboard.as_ref()
    }

    pub fn set_clipboard(&mut self, payload: ClipboardPayload) {
        self.clipboard = Some(payload);
    }

    // ---- deferred effects ---------------------------------------------

    pub(crate) fn queue_effect(&mut self, effect: Effect) {
        if self.effects.len() >= self.config.deferred_queue_limit {
            log::warn!("Deferred effect queue is full, dropping {effect:?}");
            return;
        }
        self.effects.push_back(effect);
    }

    pub fn has_pending_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    /// Runs one scheduling tick: every effect queued before this call.
    /// Effects queued while flushing wait for the next tick.
    pub fn flush_effects(&mut self) {
        let batch: Vec<Effect> = self.effects.drain(..).collect();
        for effect in batch {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::SetSelection { kind, items } => {
                // Last deferred write wins; stale ids are silently dropped.
                let live: Vec<String> = items
                    .into_iter()
                    .filter(|item| match kind {
                        Some(SelectionKind::Entity) => self.entities.contains_key(item),
                        Some(SelectionKind::Asset) => self.assets.get(item).is_some(),
                        None => false,
                    })
                    .collect();
                match (kind, live.is_empty()) {
                    (Some(kind), false) => self.selection.set(kind, live),
                    _ => self.selection.clear(),
                }
                self.emit_selection_changed();
            }
            Effect::WriteReference { site, value } => {
                self.write_reference(&site, value);
            }
        }
    }

    // ---- reference fix-ups --------------------------------------------

    /// Writes into one recorded reference site if the source entity and its
    /// component still exist. Reference fix-ups are a byproduct of the
    /// primary operation and never recorded as separate history steps.
    pub(crate) fn write_reference(&mut self, site: &ReferenceSite, value: Value) {
        let component_path =
            KeyPath::from_segs([PathSeg::key("components"), PathSeg::key(site.component.clone())]);
        let Some(record) = self.entities.get(&site.source) else {
            log::debug!("reference source '{}' is gone, skipping fix-up", site.source);
            return;
        };
        if !record.has(&component_path) {
            return;
        }
        let full = component_path.join(&site.field);
        if let Err(err) = self.entity_set(&site.source, &full, value) {
            log::debug!("reference fix-up on '{}' failed: {err:#}", site.source);
        }
    }

    /// Nulls out (or redirects) every recorded reference to `old_target`.
    pub fn apply_reference_update(
        &mut self,
        map: &ReferenceMap,
        old_target: &str,
        new_target: Option<&str>,
    ) {
        let value = match new_target {
            Some(id) => Value::String(id.to_string()),
            None => Value::Null,
        };
        for site in map.sites(old_target).to_vec() {
            self.write_reference(&site, value.clone());
        }
    }

    /// Two-phase restoration: null now, real id one tick later, so live
    /// component state observes the transition. A single-phase write is a
    /// silent correctness bug for running components.
    pub(crate) fn restore_references(&mut self, map: &ReferenceMap, target: &str) {
        for site in map.sites(target).to_vec() {
            self.write_reference(&site, Value::Null);
            self.queue_effect(Effect::WriteReference {
                site,
                value: Value::String(target.to_string()),
            });
        }
    }

    /// One consistent reference snapshot over the subtree at `root`.
    pub fn scan_references_from(&self, root: &str) -> ReferenceMap {
        let mut map = ReferenceMap::default();
        scan_references(&self.entities, &self.schema, root, &mut map);
        map
    }

    // ---- history execution --------------------------------------------

    pub fn undo(&mut self) -> bool {
        let Some(action) = self.history.pop_undo() else {
            return false;
        };
        self.execute_commands(&action.undo.clone());
        self.history.push_redo(action);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(action) = self.history.pop_redo() else {
            return false;
        };
        self.execute_commands(&action.redo.clone());
        self.history.push_undone(action);
        true
    }

    /// Interprets replay commands. Every target is re-resolved by stable id
    /// here, at invocation time; a missing record skips that command (or that
    /// entry) and the rest of the batch proceeds.
    pub(crate) fn execute_commands(&mut self, commands: &[Command]) {
        for command in commands {
            match command {
                Command::RestoreEntities { entries, references } => {
                    for entry in entries {
                        if self.entities.contains_key(&entry.resource_id) {
                            continue;
                        }
                        let data = entry
                            .data
                            .clone()
                            .or_else(|| self.index.deleted(&entry.resource_id).cloned());
                        let Some(data) = data else {
                            log::warn!(
                                "No cached data for entity '{}', skipping restore",
                                entry.resource_id
                            );
                            continue;
                        };
                        if !self.entities.contains_key(&entry.parent) {
                            log::warn!(
                                "Parent '{}' of entity '{}' is gone, skipping restore",
                                entry.parent,
                                entry.resource_id
                            );
                            continue;
                        }
                        let options = AddEntityOptions {
                            parent: Some(entry.parent.clone()),
                            index: Some(entry.index),
                            ..AddEntityOptions::default()
                        };
                        if let Err(err) = self.add_entity(data, options, Some(references)) {
                            log::warn!("Restore of entity '{}' failed: {err:#}", entry.resource_id);
                        }
                    }
                }
                Command::DeleteEntities { ids } => {
                    let live: Vec<String> =
                        ids.iter().filter(|id| self.entities.contains_key(*id)).cloned().collect();
                    if live.is_empty() {
                        continue;
                    }
                    let map = match self.root.clone() {
                        Some(root) => self.scan_references_from(&root),
                        None => ReferenceMap::default(),
                    };
                    for id in live {
                        if let Err(err) = self.remove_entity(&id, Some(&map)) {
                            log::warn!("Redo delete of entity '{id}' failed: {err:#}");
                        }
                    }
                }
                Command::SetField { record, path, value } => {
                    let result = match (record, value) {
                        (RecordId::Entity(id), Some(value)) => {
                            if !self.entities.contains_key(id) {
                                continue;
                            }
                            self.entity_set(id, path, value.clone()).map(Some)
                        }
                        (RecordId::Entity(id), None) => {
                            if !self.entities.contains_key(id) {
                                continue;
                            }
                            self.entity_unset(id, path)
                        }
                        (RecordId::Asset(uid), Some(value)) => {
                            if self.assets.get(uid).is_none() {
                                continue;
                            }
                            let applied = self.asset_set(uid, path, value.clone()).map(Some);
                            if path.segs() == [PathSeg::key("name")] {
                                self.resort_asset(uid);
                            }
                            applied
                        }
                        (RecordId::Asset(uid), None) => {
                            if self.assets.get(uid).is_none() {
                                continue;
                            }
                            self.asset_unset(uid, path)
                        }
                    };
                    if let Err(err) = result {
                        log::warn!("History field write on '{}' failed: {err:#}", record.id());
                    }
                }
                Command::SetParent { child, parent, index } => {
                    if !self.entities.contains_key(child) || !self.entities.contains_key(parent) {
                        continue;
                    }
                    if let Err(err) = self.attach_entity(child, parent, Some(*index)) {
                        log::warn!("History reparent of '{child}' failed: {err:#}");
                    }
                }
                Command::SetSelection { kind, items } => {
                    match kind {
                        Some(kind) => self.selection.set(*kind, items.clone()),
                        None => self.selection.clear(),
                    }
                    self.emit_selection_changed();
                }
            }
        }
    }

    fn resort_asset(&mut self, uid: &str) {
        // Rename through the command path bypasses AssetStore::rename, so
        // re-apply the current name to refresh sort order.
        if let Some(name) = self.assets.name_of(uid).map(str::to_string) {
            if let Err(err) = self.assets.rename(uid, &name) {
                log::warn!("Asset resort after rename failed: {err:#}");
            }
        }
    }

    // ---- event / op draining ------------------------------------------

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        self.events.drain()
    }

    pub fn drain_outgoing_ops(&mut self) -> Vec<SceneOp> {
        self.sync.drain_outgoing()
    }
}
