use orrery::{
    EditorConfig, EditorContext, KeyPath, PathSeg, ProjectSnapshot, SceneOp, SelectionKind,
};
use serde_json::json;

fn context() -> EditorContext {
    let mut ctx = EditorContext::new(EditorConfig::default());
    let snapshot = ProjectSnapshot {
        project_id: "proj-1".to_string(),
        legacy_scripts: false,
        entities: vec![
            json!({ "resource_id": "root", "name": "Root", "children": ["a"] }),
            json!({ "resource_id": "a", "name": "A", "parent": "root", "children": [] }),
        ],
        assets: vec![],
    };
    ctx.load(snapshot).expect("fixture scene should load");
    ctx.drain_outgoing_ops();
    ctx
}

#[test]
fn local_delete_replicates_as_object_deletes() {
    let mut ctx = context();
    ctx.delete_entities(&["a".to_string()]).expect("delete should succeed");
    let ops = ctx.drain_outgoing_ops();
    assert!(ops
        .iter()
        .any(|op| op.p == vec![PathSeg::key("entities"), PathSeg::key("a")] && op.od.is_some()));
    assert!(
        ops.iter().any(|op| op.ld == Some(json!("a"))),
        "the children unlink should replicate as a list delete"
    );
}

#[test]
fn local_field_edit_replicates_with_inverse() {
    let mut ctx = context();
    ctx.set_entity_field("a", &KeyPath::parse("name"), json!("Renamed"))
        .expect("set should succeed");
    let ops = ctx.drain_outgoing_ops();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].oi, Some(json!("Renamed")));
    assert_eq!(ops[0].od, Some(json!("A")));
}

#[test]
fn offline_edits_produce_no_ops() {
    let mut ctx = context();
    ctx.set_connected(false);
    ctx.set_entity_field("a", &KeyPath::parse("name"), json!("Quiet"))
        .expect("set should succeed");
    assert!(ctx.drain_outgoing_ops().is_empty());
}

#[test]
fn remote_creation_applies_without_echo() {
    let mut ctx = context();
    let create = SceneOp::object_insert(
        vec![PathSeg::key("entities"), PathSeg::key("b")],
        json!({ "resource_id": "b", "name": "B", "parent": "root", "children": [] }),
    );
    ctx.apply_remote_op(&create);
    let splice = SceneOp {
        p: vec![
            PathSeg::key("entities"),
            PathSeg::key("root"),
            PathSeg::key("children"),
            PathSeg::Index(1),
        ],
        li: Some(json!("b")),
        ..SceneOp::default()
    };
    ctx.apply_remote_op(&splice);

    assert!(ctx.entity_exists("b"));
    assert_eq!(ctx.parent_of("b"), Some("root"), "remote child splice should wire the index");
    assert!(ctx.drain_outgoing_ops().is_empty(), "remote application must never echo");
}

#[test]
fn remote_field_ops_mutate_local_records() {
    let mut ctx = context();
    let rename = SceneOp {
        p: vec![PathSeg::key("entities"), PathSeg::key("a"), PathSeg::key("name")],
        oi: Some(json!("Remote")),
        od: Some(json!("A")),
        ..SceneOp::default()
    };
    ctx.apply_remote_op(&rename);
    assert_eq!(ctx.entity("a").expect("a").get_str(&KeyPath::parse("name")), Some("Remote"));

    // An op for an id nobody has locally is dropped, not applied.
    let stray = SceneOp {
        p: vec![PathSeg::key("entities"), PathSeg::key("ghost"), PathSeg::key("name")],
        oi: Some(json!("x")),
        ..SceneOp::default()
    };
    ctx.apply_remote_op(&stray);
    assert!(!ctx.entity_exists("ghost"));
}

#[test]
fn remote_replacement_drops_stale_child_links() {
    let mut ctx = context();
    let create_child = SceneOp::object_insert(
        vec![PathSeg::key("entities"), PathSeg::key("c")],
        json!({ "resource_id": "c", "name": "C", "parent": "a", "children": [] }),
    );
    ctx.apply_remote_op(&create_child);
    let splice = SceneOp {
        p: vec![
            PathSeg::key("entities"),
            PathSeg::key("a"),
            PathSeg::key("children"),
            PathSeg::Index(0),
        ],
        li: Some(json!("c")),
        ..SceneOp::default()
    };
    ctx.apply_remote_op(&splice);
    assert_eq!(ctx.parent_of("c"), Some("a"));

    // Replacing "a" with a childless copy must not leave "c" pointing at it.
    let replace = SceneOp::object_insert(
        vec![PathSeg::key("entities"), PathSeg::key("a")],
        json!({ "resource_id": "a", "name": "A", "parent": "root", "children": [] }),
    );
    ctx.apply_remote_op(&replace);
    assert!(ctx.entity_exists("a"));
    assert_eq!(ctx.parent_of("c"), None);
}

#[test]
fn remote_deletion_clears_local_selection() {
    let mut ctx = context();
    ctx.set_selection(SelectionKind::Entity, vec!["a".to_string()]);
    let delete = SceneOp::object_delete(
        vec![PathSeg::key("entities"), PathSeg::key("a")],
        json!({ "resource_id": "a" }),
    );
    ctx.apply_remote_op(&delete);
    assert!(!ctx.entity_exists("a"));
    assert!(ctx.selection_items().is_empty());
    assert!(ctx.drain_outgoing_ops().is_empty());
}
