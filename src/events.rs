use crate::selection::SelectionKind;
use std::fmt;

/// Coarse notifications for UI listeners (tree view, grid view). Fine-grained
/// field changes travel as [`crate::record::ChangeEvent`] through the sync
/// bridge instead.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    EntityAdded { resource_id: String },
    EntityRemoved { resource_id: String },
    AssetAdded { unique_id: String },
    AssetRemoved { unique_id: String },
    SelectionChanged { kind: Option<SelectionKind>, items: Vec<String> },
}

impl fmt::Display for EditorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorEvent::EntityAdded { resource_id } => write!(f, "EntityAdded {resource_id}"),
            EditorEvent::EntityRemoved { resource_id } => write!(f, "EntityRemoved {resource_id}"),
            EditorEvent::AssetAdded { unique_id } => write!(f, "AssetAdded {unique_id}"),
            EditorEvent::AssetRemoved { unique_id } => write!(f, "AssetRemoved {unique_id}"),
            EditorEvent::SelectionChanged { items, .. } => {
                write!(f, "SelectionChanged {} item(s)", items.len())
            }
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    events: Vec<EditorEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: EditorEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<EditorEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
