use crate::path::{KeyPath, PathSeg};
use crate::record::{Change, ChangeEvent, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Wire shape exchanged with the realtime transport: `p` is the path into the
/// shared document, `oi`/`od` are object insert/delete (doubling as
/// set/unset when both or one are present), `li`/`ld`/`lm` are list insert/
/// delete/move (for `lm`, `p` ends at the source index and `lm` is the
/// destination).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneOp {
    pub p: Vec<PathSeg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oi: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub od: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub li: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ld: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm: Option<usize>,
}

impl SceneOp {
    pub fn object_insert(p: Vec<PathSeg>, value: Value) -> Self {
        SceneOp { p, oi: Some(value), ..SceneOp::default() }
    }

    pub fn object_delete(p: Vec<PathSeg>, value: Value) -> Self {
        SceneOp { p, od: Some(value), ..SceneOp::default() }
    }

    fn from_change(mut p: Vec<PathSeg>, change: &Change) -> Self {
        match change {
            Change::Set { old, new } => {
                SceneOp { p, oi: Some(new.clone()), od: old.clone(), ..SceneOp::default() }
            }
            Change::Unset { old } => SceneOp { p, od: Some(old.clone()), ..SceneOp::default() },
            Change::Insert { value, index } => {
                p.push(PathSeg::Index(*index));
                SceneOp { p, li: Some(value.clone()), ..SceneOp::default() }
            }
            Change::Remove { value, index } => {
                p.push(PathSeg::Index(*index));
                SceneOp { p, ld: Some(value.clone()), ..SceneOp::default() }
            }
            Change::Move { from, to } => {
                p.push(PathSeg::Index(*from));
                SceneOp { p, lm: Some(*to), ..SceneOp::default() }
            }
        }
    }
}

// Only mutations on these top-level paths replicate; everything else is
// editor-local scratch state.
const ENTITY_SYNC_PATHS: &[&str] =
    &["name", "tags", "parent", "children", "position", "rotation", "scale", "enabled", "components"];
const ASSET_SYNC_PATHS: &[&str] = &["name", "preload", "scope", "data", "meta", "file", "i18n"];

/// Translates local record mutations into outbound ops and guards against
/// echoing remotely-applied ops back out.
pub struct SyncBridge {
    outbox: VecDeque<SceneOp>,
    applying_remote: bool,
    connected: bool,
}

impl Default for SyncBridge {
    fn default() -> Self {
        SyncBridge { outbox: VecDeque::new(), applying_remote: false, connected: true }
    }
}

impl SyncBridge {
    pub fn new() -> Self {
        SyncBridge::default()
    }

    /// While false, local mutations produce no outbound ops (offline mode).
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn begin_remote(&mut self) {
        self.applying_remote = true;
    }

    pub(crate) fn end_remote(&mut self) {
        self.applying_remote = false;
    }

    pub fn applying_remote(&self) -> bool {
        self.applying_remote
    }

    fn prefix_for(record: &RecordId) -> Vec<PathSeg> {
        match record {
            RecordId::Entity(id) => vec![PathSeg::key("entities"), PathSeg::key(id.clone())],
            RecordId::Asset(id) => vec![PathSeg::key("assets"), PathSeg::key(id.clone())],
        }
    }

    fn tracks(record: &RecordId, path: &KeyPath) -> bool {
        let Some(first) = path.first_key() else {
            return false;
        };
        let allowed = match record {
            RecordId::Entity(_) => ENTITY_SYNC_PATHS,
            RecordId::Asset(_) => ASSET_SYNC_PATHS,
        };
        allowed.contains(&first)
    }

    /// Observes one local change event and queues the equivalent op.
    pub fn observe(&mut self, event: &ChangeEvent) {
        if self.applying_remote || !self.connected {
            return;
        }
        if !Self::tracks(&event.record, &event.path) {
            return;
        }
        let mut p = Self::prefix_for(&event.record);
        p.extend(event.path.segs().iter().cloned());
        self.outbox.push_back(SceneOp::from_change(p, &event.change));
    }

    /// Whole-record creation bypasses path diffing: a brand-new record has no
    /// meaningful prior-state diff, so it ships as one object-insert.
    pub fn send_created(&mut self, record: &RecordId, data: Value) {
        if self.applying_remote || !self.connected {
            return;
        }
        self.outbox.push_back(SceneOp::object_insert(Self::prefix_for(record), data));
    }

    /// Whole-record deletion, the structural mirror of `send_created`.
    pub fn send_deleted(&mut self, record: &RecordId, data: Value) {
        if self.applying_remote || !self.connected {
            return;
        }
        self.outbox.push_back(SceneOp::object_delete(Self::prefix_for(record), data));
    }

    /// Drains queued outbound ops for the transport.
    pub fn drain_outgoing(&mut self) -> Vec<SceneOp> {
        self.outbox.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    pub fn clear(&mut self) {
        self.outbox.clear();
        self.applying_remote = false;
    }
}

impl crate::context::EditorContext {
    /// Merges one remote op into local state. Ops targeting ids with no live
    /// local record are logged and dropped; convergence for those is the
    /// full-reload path's problem, not silent local corruption. Applied
    /// mutations still emit regular change events (index maintenance), but
    /// the re-entrancy guard keeps them out of the outbox.
    pub fn apply_remote_op(&mut self, op: &SceneOp) {
        let (collection, id) = match op.p.as_slice() {
            [PathSeg::Key(collection), PathSeg::Key(id), ..] => (collection.clone(), id.clone()),
            _ => {
                log::warn!("Malformed remote op path {:?}, dropping", op.p);
                return;
            }
        };
        self.sync.begin_remote();
        let result = match (collection.as_str(), op.p.len()) {
            ("entities", 2) => self.apply_remote_entity_structural(&id, op),
            ("entities", _) => self.apply_remote_field(&RecordId::Entity(id), op),
            ("assets", 2) => self.apply_remote_asset_structural(&id, op),
            ("assets", _) => self.apply_remote_field(&RecordId::Asset(id), op),
            _ => {
                log::warn!("Remote op targets unknown collection '{collection}', dropping");
                Ok(())
            }
        };
        self.sync.end_remote();
        if let Err(err) = result {
            log::warn!("Remote op application failed: {err:#}");
        }
    }

    fn apply_remote_entity_structural(&mut self, id: &str, op: &SceneOp) -> anyhow::Result<()> {
        if let Some(data) = &op.oi {
            if let Some(old) = self.entities.remove(id) {
                log::warn!("Remote created entity '{id}' that already exists, replacing");
                // The replaced record's child edges are stale now.
                for child in old.children_ids() {
                    self.index.on_child_removed(id, &child);
                }
            }
            let record = crate::record::Record::new(data.clone());
            for child in record.children_ids() {
                self.index.on_child_inserted(id, &child);
            }
            self.entities.insert(id.to_string(), record);
            self.events.push(crate::events::EditorEvent::EntityAdded { resource_id: id.to_string() });
        } else if op.od.is_some() {
            if self.entities.remove(id).is_none() {
                log::warn!("Remote deleted unknown entity '{id}', dropping");
                return Ok(());
            }
            self.index.drop_entity(id);
            self.remove_from_selection(id);
            self.events
                .push(crate::events::EditorEvent::EntityRemoved { resource_id: id.to_string() });
        }
        Ok(())
    }

    fn apply_remote_asset_structural(&mut self, id: &str, op: &SceneOp) -> anyhow::Result<()> {
        if let Some(data) = &op.oi {
            self.assets.add(data.clone())?;
            self.events.push(crate::events::EditorEvent::AssetAdded { unique_id: id.to_string() });
        } else if op.od.is_some() {
            if self.assets.remove(id).is_none() {
                log::warn!("Remote deleted unknown asset '{id}', dropping");
                return Ok(());
            }
            self.remove_from_selection(id);
            self.events.push(crate::events::EditorEvent::AssetRemoved { unique_id: id.to_string() });
        }
        Ok(())
    }

    fn apply_remote_field(&mut self, record: &RecordId, op: &SceneOp) -> anyhow::Result<()> {
        let exists = match record {
            RecordId::Entity(id) => self.entity_exists(id),
            RecordId::Asset(uid) => self.assets.get(uid).is_some(),
        };
        if !exists {
            log::warn!("Remote op targets unknown record '{}', dropping", record.id());
            return Ok(());
        }
        let rest = KeyPath::from_segs(op.p[2..].iter().cloned());
        if let Some(value) = &op.li {
            let Some((parent, PathSeg::Index(index))) = rest.split_last().map(|(p, s)| (p, s.clone())) else {
                anyhow::bail!("List insert op without index segment");
            };
            self.remote_insert(record, &parent, value.clone(), index)?;
        } else if op.ld.is_some() {
            let Some((parent, PathSeg::Index(index))) = rest.split_last().map(|(p, s)| (p, s.clone())) else {
                anyhow::bail!("List delete op without index segment");
            };
            self.remote_remove_at(record, &parent, index)?;
        } else if let Some(to) = op.lm {
            let Some((parent, PathSeg::Index(from))) = rest.split_last().map(|(p, s)| (p, s.clone())) else {
                anyhow::bail!("List move op without index segment");
            };
            self.remote_move(record, &parent, from, to)?;
        } else if let Some(value) = &op.oi {
            match record {
                RecordId::Entity(id) => {
                    let id = id.clone();
                    self.entity_set(&id, &rest, value.clone())?;
                }
                RecordId::Asset(uid) => {
                    let uid = uid.clone();
                    self.asset_set(&uid, &rest, value.clone())?;
                }
            }
        } else if op.od.is_some() {
            match record {
                RecordId::Entity(id) => {
                    let id = id.clone();
                    self.entity_unset(&id, &rest)?;
                }
                RecordId::Asset(uid) => {
                    let uid = uid.clone();
                    self.asset_unset(&uid, &rest)?;
                }
            }
        }
        Ok(())
    }

    fn remote_insert(
        &mut self,
        record: &RecordId,
        path: &KeyPath,
        value: serde_json::Value,
        index: usize,
    ) -> anyhow::Result<()> {
        match record {
            RecordId::Entity(id) => {
                let id = id.clone();
                self.entity_insert(&id, path, value, Some(index))?;
            }
            RecordId::Asset(uid) => {
                let uid = uid.clone();
                let asset = self
                    .assets
                    .get_mut(&uid)
                    .ok_or_else(|| anyhow::anyhow!("Unknown asset '{uid}'"))?;
                let change = asset.insert(path, value, Some(index))?;
                self.dispatch(ChangeEvent {
                    record: RecordId::Asset(uid.clone()),
                    path: path.clone(),
                    change,
                });
            }
        }
        Ok(())
    }

    fn remote_remove_at(&mut self, record: &RecordId, path: &KeyPath, index: usize) -> anyhow::Result<()> {
        match record {
            RecordId::Entity(id) => {
                let id = id.clone();
                self.entity_remove_at(&id, path, index)?;
            }
            RecordId::Asset(uid) => {
                let uid = uid.clone();
                let asset = self
                    .assets
                    .get_mut(&uid)
                    .ok_or_else(|| anyhow::anyhow!("Unknown asset '{uid}'"))?;
                if let Some(change) = asset.remove_at(path, index)? {
                    self.dispatch(ChangeEvent {
                        record: RecordId::Asset(uid.clone()),
                        path: path.clone(),
                        change,
                    });
                }
            }
        }
        Ok(())
    }

    fn remote_move(&mut self, record: &RecordId, path: &KeyPath, from: usize, to: usize) -> anyhow::Result<()> {
        match record {
            RecordId::Entity(id) => {
                let id = id.clone();
                self.entity_move(&id, path, from, to)?;
            }
            RecordId::Asset(uid) => {
                let uid = uid.clone();
                let asset = self
                    .assets
                    .get_mut(&uid)
                    .ok_or_else(|| anyhow::anyhow!("Unknown asset '{uid}'"))?;
                let change = asset.move_value(path, from, to)?;
                self.dispatch(ChangeEvent {
                    record: RecordId::Asset(uid.clone()),
                    path: path.clone(),
                    change,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(path: &str, change: Change) -> ChangeEvent {
        ChangeEvent {
            record: RecordId::Entity("e-1".to_string()),
            path: KeyPath::parse(path),
            change,
        }
    }

    #[test]
    fn untracked_paths_are_ignored() {
        let mut bridge = SyncBridge::new();
        bridge.observe(&event("__editorOnly", Change::Set { old: None, new: json!(1) }));
        assert_eq!(bridge.pending(), 0);
    }

    #[test]
    fn set_becomes_object_insert_with_delete() {
        let mut bridge = SyncBridge::new();
        bridge.observe(&event("name", Change::Set { old: Some(json!("a")), new: json!("b") }));
        let ops = bridge.drain_outgoing();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].p, vec![PathSeg::key("entities"), PathSeg::key("e-1"), PathSeg::key("name")]);
        assert_eq!(ops[0].oi, Some(json!("b")));
        assert_eq!(ops[0].od, Some(json!("a")));
    }

    #[test]
    fn list_insert_appends_index_segment() {
        let mut bridge = SyncBridge::new();
        bridge.observe(&event("children", Change::Insert { value: json!("c"), index: 2 }));
        let ops = bridge.drain_outgoing();
        assert_eq!(ops[0].p.last(), Some(&PathSeg::Index(2)));
        assert_eq!(ops[0].li, Some(json!("c")));
    }

    #[test]
    fn remote_guard_suppresses_echo() {
        let mut bridge = SyncBridge::new();
        bridge.begin_remote();
        bridge.observe(&event("name", Change::Set { old: None, new: json!("b") }));
        bridge.send_created(&RecordId::Entity("e-2".to_string()), json!({}));
        bridge.end_remote();
        assert_eq!(bridge.pending(), 0);
    }

    #[test]
    fn op_shape_serializes_sparse() {
        let op = SceneOp::object_insert(vec![PathSeg::key("entities"), PathSeg::key("x")], json!({}));
        let raw = serde_json::to_value(&op).expect("serialize op");
        assert_eq!(raw, json!({ "p": ["entities", "x"], "oi": {} }));
    }
}
