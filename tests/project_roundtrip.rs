use orrery::{EditorConfig, EditorContext, ProjectSnapshot};
use serde_json::json;

#[test]
fn export_save_load_preserves_scene_shape() {
    let mut ctx = EditorContext::new(EditorConfig::default());
    let snapshot = ProjectSnapshot {
        project_id: "proj-rt".to_string(),
        legacy_scripts: false,
        entities: vec![
            json!({ "resource_id": "root", "name": "Root", "children": ["a", "b"] }),
            json!({ "resource_id": "a", "name": "A", "parent": "root", "children": ["c"] }),
            json!({ "resource_id": "c", "name": "C", "parent": "a", "children": [] }),
            json!({ "resource_id": "b", "name": "B", "parent": "root", "children": [] }),
        ],
        assets: vec![
            json!({ "id": 1, "uniqueId": "u-1", "type": "folder", "name": "Stuff", "path": [] }),
            json!({ "id": 2, "uniqueId": "u-2", "type": "texture", "name": "a.png", "path": [1] }),
        ],
    };
    ctx.load(snapshot).expect("project should load");
    let original_count = ctx.entity_count();

    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("project.json");
    ctx.export().save_to_path(&path).expect("snapshot save should succeed");

    let loaded = ProjectSnapshot::load_from_path(&path).expect("snapshot load should succeed");
    assert_eq!(loaded.project_id, "proj-rt");
    assert_eq!(loaded.entities.len(), original_count);
    // Export walks the tree depth-first from the root.
    assert_eq!(loaded.entities[0].get("resource_id"), Some(&json!("root")));

    let mut fresh = EditorContext::new(EditorConfig::default());
    fresh.load(loaded).expect("reloaded snapshot should load");
    assert_eq!(fresh.entity_count(), original_count);
    assert_eq!(fresh.root_id(), Some("root"));
    assert_eq!(fresh.parent_of("c"), Some("a"));
    assert_eq!(fresh.assets().ordered(), ["u-1", "u-2"]);
}

#[test]
fn load_rejects_ambiguous_roots() {
    let mut ctx = EditorContext::new(EditorConfig::default());
    let snapshot = ProjectSnapshot {
        project_id: "bad".to_string(),
        legacy_scripts: false,
        entities: vec![
            json!({ "resource_id": "r1", "name": "R1", "children": [] }),
            json!({ "resource_id": "r2", "name": "R2", "children": [] }),
        ],
        assets: vec![],
    };
    assert!(ctx.load(snapshot).is_err());
    assert!(ctx.load(ProjectSnapshot::default()).is_err(), "an empty scene has no root");
}
