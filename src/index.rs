use crate::path::KeyPath;
use crate::record::Record;
use crate::schema::SchemaSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One location holding a reference to some target entity: a field on a
/// component of the source entity. `field` is relative to the component data
/// (script attributes resolve under `scripts.<name>.attributes.<attr>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSite {
    pub source: String,
    pub component: String,
    pub field: KeyPath,
}

/// Point-in-time snapshot: target resource id -> every site referencing it.
/// Captured once at the start of a delete/duplicate operation and threaded
/// through the whole batch so all records share one consistent view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceMap {
    targets: HashMap<String, Vec<ReferenceSite>>,
}

impl ReferenceMap {
    pub fn record(&mut self, target: impl Into<String>, site: ReferenceSite) {
        self.targets.entry(target.into()).or_default().push(site);
    }

    pub fn sites(&self, target: &str) -> &[ReferenceSite] {
        self.targets.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Derived structure over the live entity graph: O(1) parent lookups plus the
/// last-known JSON of every deleted entity so redo-after-undo chains and
/// paste-after-delete can reconstruct records without an external store.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    child_to_parent: HashMap<String, String>,
    deleted_cache: HashMap<String, Value>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        ReferenceIndex::default()
    }

    pub fn clear(&mut self) {
        self.child_to_parent.clear();
        self.deleted_cache.clear();
    }

    pub fn on_child_inserted(&mut self, parent: &str, child: &str) {
        self.child_to_parent.insert(child.to_string(), parent.to_string());
    }

    pub fn on_child_removed(&mut self, parent: &str, child: &str) {
        // Guard against late events after a reparent already rewired the child.
        if self.child_to_parent.get(child).map(String::as_str) == Some(parent) {
            self.child_to_parent.remove(child);
        }
    }

    pub fn drop_entity(&mut self, resource_id: &str) {
        self.child_to_parent.remove(resource_id);
    }

    pub fn parent_of(&self, child: &str) -> Option<&str> {
        self.child_to_parent.get(child).map(String::as_str)
    }

    /// Whether `ancestor` appears on `child`'s parent chain.
    pub fn has_ancestor(&self, child: &str, ancestor: &str) -> bool {
        let mut current = self.parent_of(child);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }

    pub fn cache_deleted(&mut self, resource_id: impl Into<String>, data: Value) {
        self.deleted_cache.insert(resource_id.into(), data);
    }

    pub fn deleted(&self, resource_id: &str) -> Option<&Value> {
        self.deleted_cache.get(resource_id)
    }
}

/// Recursively scans the subtree rooted at `root`, consulting the schema for
/// every component on every visited entity, and records each non-null
/// reference value found. Targets outside the scanned subtree are recorded
/// too; nulling and restoration decide relevance later.
pub fn scan_references(
    entities: &HashMap<String, Record>,
    schema: &SchemaSet,
    root: &str,
    map: &mut ReferenceMap,
) {
    let Some(record) = entities.get(root) else {
        return;
    };
    if let Some(Value::Object(components)) = record.data().get("components") {
        for (component_name, component_data) in components {
            for field in schema.entity_reference_paths(component_name, component_data) {
                let target = field
                    .segs()
                    .iter()
                    .fold(Some(component_data), |value, seg| {
                        value.and_then(|value| match seg {
                            crate::path::PathSeg::Key(key) => value.get(key),
                            crate::path::PathSeg::Index(index) => value.get(index),
                        })
                    })
                    .and_then(Value::as_str);
                if let Some(target) = target {
                    map.record(
                        target,
                        ReferenceSite {
                            source: root.to_string(),
                            component: component_name.clone(),
                            field,
                        },
                    );
                }
            }
        }
    }
    for child in record.children_ids() {
        scan_references(entities, schema, &child, map);
    }
}
