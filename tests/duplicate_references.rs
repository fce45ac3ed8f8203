use orrery::{EditorConfig, EditorContext, KeyPath, ProjectSnapshot, SelectionKind};
use serde_json::json;

fn context() -> EditorContext {
    let mut ctx = EditorContext::new(EditorConfig::default());
    let snapshot = ProjectSnapshot {
        project_id: "proj-1".to_string(),
        legacy_scripts: false,
        entities: vec![
            json!({ "resource_id": "root", "name": "Root", "children": ["panel", "ext"] }),
            json!({
                "resource_id": "panel", "name": "Panel", "parent": "root", "children": ["icon"],
                "components": {
                    "button": { "enabled": true, "imageEntity": "icon" },
                    "scrollview": { "enabled": true, "viewportEntity": "ext" }
                }
            }),
            json!({ "resource_id": "icon", "name": "Icon", "parent": "panel", "children": [] }),
            json!({ "resource_id": "ext", "name": "External", "parent": "root", "children": [] }),
        ],
        assets: vec![],
    };
    ctx.load(snapshot).expect("fixture scene should load");
    ctx
}

#[test]
fn duplicate_rewrites_internal_references_only() {
    let mut ctx = context();
    let clones = ctx.duplicate_entities(&["panel".to_string()]).expect("duplicate should succeed");
    assert_eq!(clones.len(), 1);

    let clone_id = &clones[0];
    assert_ne!(clone_id, "panel");
    assert_eq!(ctx.parent_of(clone_id), Some("root"));
    assert_eq!(
        ctx.entity("root").expect("root").children_ids(),
        vec!["panel".to_string(), clone_id.clone(), "ext".to_string()],
        "clone should land right after its original"
    );

    let clone = ctx.entity(clone_id).expect("clone should exist");
    let clone_children = clone.children_ids();
    assert_eq!(clone_children.len(), 1);
    let clone_icon = clone_children[0].clone();
    assert_ne!(clone_icon, "icon");
    assert!(ctx.entity_exists(&clone_icon));

    // The self-reference follows the clone; the external one does not.
    assert_eq!(
        clone.get_str(&KeyPath::parse("components.button.imageEntity")),
        Some(clone_icon.as_str())
    );
    assert_eq!(
        clone.get_str(&KeyPath::parse("components.scrollview.viewportEntity")),
        Some("ext")
    );
    // The original keeps its own references untouched.
    assert_eq!(
        ctx.entity("panel").expect("panel").get_str(&KeyPath::parse("components.button.imageEntity")),
        Some("icon")
    );
}

#[test]
fn duplicate_selection_moves_to_clones_on_next_tick() {
    let mut ctx = context();
    ctx.set_selection(SelectionKind::Entity, vec!["panel".to_string()]);
    let clones = ctx.duplicate_entities(&["panel".to_string()]).expect("duplicate should succeed");

    assert_eq!(ctx.selection_items(), vec!["panel".to_string()], "selection moves deferred");
    ctx.flush_effects();
    assert_eq!(ctx.selection_items(), clones);
}

#[test]
fn duplicate_undo_redo_roundtrip() {
    let mut ctx = context();
    ctx.set_selection(SelectionKind::Entity, vec!["panel".to_string()]);
    let clones = ctx.duplicate_entities(&["panel".to_string()]).expect("duplicate should succeed");
    ctx.flush_effects();
    let clone_id = clones[0].clone();

    assert!(ctx.undo());
    assert!(!ctx.entity_exists(&clone_id));
    assert_eq!(ctx.selection_items(), vec!["panel".to_string()], "undo restores prior selection");

    assert!(ctx.redo());
    let clone = ctx.entity(&clone_id).expect("redo should rebuild the clone under the same id");
    let clone_icon = clone.children_ids()[0].clone();
    assert_eq!(
        clone.get_str(&KeyPath::parse("components.button.imageEntity")),
        Some(clone_icon.as_str()),
        "redo replays the already-redirected reference"
    );
    assert_eq!(ctx.selection_items(), vec![clone_id]);
}

#[test]
fn duplicating_ancestor_and_descendant_collapses() {
    let mut ctx = context();
    let clones = ctx
        .duplicate_entities(&["panel".to_string(), "icon".to_string()])
        .expect("duplicate should succeed");
    assert_eq!(clones.len(), 1, "descendants fold into their duplicated ancestor");
    assert_eq!(ctx.entity("root").expect("root").children_ids().len(), 3);
}
