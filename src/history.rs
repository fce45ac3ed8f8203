use crate::index::ReferenceMap;
use crate::path::KeyPath;
use crate::record::RecordId;
use crate::selection::SelectionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything a restore needs to put an entity back: stable ids and the
/// captured position. `data` of None means "fetch from the deleted cache at
/// execution time" (redo-after-undo and paste-redo paths).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreEntry {
    pub resource_id: String,
    pub parent: String,
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Replayable history commands. These carry stable ids and values, never
/// live object references, so replay long after the referenced
/// objects were destroyed and recreated stays valid. The executor re-resolves
/// every id immediately before mutating and skips records that no longer
/// exist; one missing record must not corrupt the rest of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    RestoreEntities { entries: Vec<RestoreEntry>, references: ReferenceMap },
    DeleteEntities { ids: Vec<String> },
    SetField { record: RecordId, path: KeyPath, value: Option<Value> },
    SetParent { child: String, parent: String, index: usize },
    SetSelection { kind: Option<SelectionKind>, items: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryAction {
    pub name: String,
    pub undo: Vec<Command>,
    pub redo: Vec<Command>,
}

/// Single global linear undo/redo log. An undo always reverts the most
/// recent action regardless of which records it touched.
pub struct HistoryStack {
    undo: Vec<HistoryAction>,
    redo: Vec<HistoryAction>,
    limit: usize,
    enabled: bool,
}

impl Default for HistoryStack {
    fn default() -> Self {
        HistoryStack::with_limit(1000)
    }
}

impl HistoryStack {
    pub fn with_limit(limit: usize) -> Self {
        HistoryStack { undo: Vec::new(), redo: Vec::new(), limit: limit.max(1), enabled: true }
    }

    /// Gates recording; replayed commands and remote ops run with this off.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Pushes an already-applied action. Does not execute anything; the
    /// operation under way has mutated state directly and the action only
    /// captures how to walk it back and forward again.
    pub fn add(&mut self, action: HistoryAction) {
        if !self.enabled {
            return;
        }
        self.redo.clear();
        self.undo.push(action);
        if self.undo.len() > self.limit {
            let excess = self.undo.len() - self.limit;
            self.undo.drain(..excess);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_name(&self) -> Option<&str> {
        self.undo.last().map(|action| action.name.as_str())
    }

    pub fn redo_name(&self) -> Option<&str> {
        self.redo.last().map(|action| action.name.as_str())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub(crate) fn pop_undo(&mut self) -> Option<HistoryAction> {
        self.undo.pop()
    }

    pub(crate) fn push_redo(&mut self, action: HistoryAction) {
        self.redo.push(action);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<HistoryAction> {
        self.redo.pop()
    }

    pub(crate) fn push_undone(&mut self, action: HistoryAction) {
        // Re-push after redo without clearing the redo stack.
        self.undo.push(action);
    }
}
