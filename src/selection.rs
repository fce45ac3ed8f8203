use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    Entity,
    Asset,
}

/// Current selection: one kind at a time, ordered items. Mixing kinds resets
/// the selection to the new kind.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    kind: Option<SelectionKind>,
    items: Vec<String>,
}

impl Selection {
    pub fn kind(&self) -> Option<SelectionKind> {
        self.kind
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.iter().any(|existing| existing == item)
    }

    pub fn set(&mut self, kind: SelectionKind, items: Vec<String>) {
        self.kind = Some(kind);
        self.items = items;
        self.items.dedup();
    }

    pub fn clear(&mut self) {
        self.kind = None;
        self.items.clear();
    }

    pub fn add(&mut self, kind: SelectionKind, item: String) {
        if self.kind != Some(kind) {
            self.set(kind, vec![item]);
            return;
        }
        if !self.contains(&item) {
            self.items.push(item);
        }
    }

    /// Returns true if the item was selected.
    pub fn remove(&mut self, item: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|existing| existing != item);
        if self.items.is_empty() {
            self.kind = None;
        }
        self.items.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_with_other_kind_resets() {
        let mut selection = Selection::default();
        selection.set(SelectionKind::Entity, vec!["a".into(), "b".into()]);
        selection.add(SelectionKind::Asset, "x".into());
        assert_eq!(selection.kind(), Some(SelectionKind::Asset));
        assert_eq!(selection.items(), ["x"]);
    }

    #[test]
    fn removing_last_item_clears_kind() {
        let mut selection = Selection::default();
        selection.set(SelectionKind::Entity, vec!["a".into()]);
        assert!(selection.remove("a"));
        assert_eq!(selection.kind(), None);
    }
}
