use orrery::{EditorConfig, EditorContext, KeyPath, ProjectSnapshot};
use serde_json::{json, Value};

fn source_project() -> ProjectSnapshot {
    ProjectSnapshot {
        project_id: "proj-src".to_string(),
        legacy_scripts: false,
        entities: vec![
            json!({ "resource_id": "root", "name": "Root", "children": ["speaker"] }),
            json!({
                "resource_id": "speaker", "name": "Speaker", "parent": "root",
                "children": ["label"],
                "components": {
                    "button": { "enabled": true, "imageEntity": "label" },
                    "sound": { "enabled": true, "slots": { "boom": { "asset": 11 } } },
                    "script": { "enabled": true, "order": [], "scripts": {} }
                }
            }),
            json!({ "resource_id": "label", "name": "Label", "parent": "speaker", "children": [] }),
        ],
        assets: vec![
            json!({ "id": 10, "uniqueId": "src-folder", "type": "folder", "name": "Sounds", "path": [] }),
            json!({ "id": 11, "uniqueId": "src-boom", "type": "audio", "name": "boom.mp3", "path": [10] }),
        ],
    }
}

fn dest_project(legacy_scripts: bool) -> ProjectSnapshot {
    ProjectSnapshot {
        project_id: "proj-dst".to_string(),
        legacy_scripts,
        entities: vec![json!({ "resource_id": "root2", "name": "Root", "children": [] })],
        assets: vec![
            json!({ "id": 20, "uniqueId": "dst-folder", "type": "folder", "name": "Sounds", "path": [] }),
            json!({ "id": 21, "uniqueId": "dst-boom", "type": "audio", "name": "boom.mp3", "path": [20] }),
        ],
    }
}

#[test]
fn paste_into_same_project_keeps_asset_ids() {
    let mut ctx = EditorContext::new(EditorConfig::default());
    ctx.load(source_project()).expect("source project should load");
    ctx.copy_entities(&["speaker".to_string()]).expect("copy should succeed");

    let pasted = ctx.paste(None).expect("paste should succeed");
    assert_eq!(pasted.len(), 1);
    let new_id = &pasted[0];
    assert_ne!(new_id, "speaker", "pasted entities always get fresh ids");
    assert!(ctx.entity_exists("speaker"), "the original survives");

    let record = ctx.entity(new_id).expect("pasted entity should exist");
    assert_eq!(
        record.get(&KeyPath::parse("components.sound.slots.boom.asset")),
        Some(&json!(11)),
        "same-project paste keeps asset references as they were"
    );
    // The internal entity reference follows the pasted copy.
    let new_label = record.children_ids()[0].clone();
    assert_ne!(new_label, "label");
    assert_eq!(
        record.get_str(&KeyPath::parse("components.button.imageEntity")),
        Some(new_label.as_str())
    );
}

#[test]
fn cross_project_paste_remaps_assets_by_folder_path() {
    let mut ctx = EditorContext::new(EditorConfig::default());
    ctx.load(source_project()).expect("source project should load");
    ctx.copy_entities(&["speaker".to_string()]).expect("copy should succeed");

    // The clipboard is the one piece of state that survives a project switch.
    ctx.load(dest_project(false)).expect("destination project should load");
    let pasted = ctx.paste(None).expect("paste should succeed");
    assert_eq!(pasted.len(), 1);

    let record = ctx.entity(&pasted[0]).expect("pasted entity should exist");
    assert_eq!(ctx.parent_of(&pasted[0]), Some("root2"));
    assert_eq!(
        record.get(&KeyPath::parse("components.sound.slots.boom.asset")),
        Some(&json!(21)),
        "the asset reference should resolve to the destination's boom.mp3 by folder path"
    );
    assert!(
        record.get(&KeyPath::parse("components.script")).is_some(),
        "matching script systems keep the script component"
    );
}

#[test]
fn cross_project_paste_drops_mismatched_script_component() {
    let mut ctx = EditorContext::new(EditorConfig::default());
    ctx.load(source_project()).expect("source project should load");
    ctx.copy_entities(&["speaker".to_string()]).expect("copy should succeed");

    ctx.load(dest_project(true)).expect("destination project should load");
    let pasted = ctx.paste(None).expect("paste should succeed");
    let record = ctx.entity(&pasted[0]).expect("pasted entity should exist");
    assert_eq!(
        record.get(&KeyPath::parse("components.script")),
        None,
        "legacy and current script components cannot be reconciled"
    );
    assert!(record.get(&KeyPath::parse("components.sound")).is_some());
}

#[test]
fn unresolved_assets_keep_their_original_ids() {
    let mut ctx = EditorContext::new(EditorConfig::default());
    ctx.load(source_project()).expect("source project should load");
    ctx.copy_entities(&["speaker".to_string()]).expect("copy should succeed");

    // Destination has no matching asset at all.
    let mut bare = dest_project(false);
    bare.assets = vec![];
    ctx.load(bare).expect("destination project should load");
    let pasted = ctx.paste(None).expect("paste should succeed");
    let record = ctx.entity(&pasted[0]).expect("pasted entity should exist");
    assert_eq!(
        record.get(&KeyPath::parse("components.sound.slots.boom.asset")),
        Some(&json!(11)),
        "a dangling original id beats a silently wrong asset"
    );
}

#[test]
fn paste_undo_removes_the_pasted_forest() {
    let mut ctx = EditorContext::new(EditorConfig::default());
    ctx.load(source_project()).expect("source project should load");
    ctx.copy_entities(&["speaker".to_string()]).expect("copy should succeed");

    let pasted = ctx.paste(None).expect("paste should succeed");
    ctx.flush_effects();
    assert_eq!(ctx.selection_items(), pasted);

    assert!(ctx.undo());
    assert!(!ctx.entity_exists(&pasted[0]));
    assert!(ctx.entity_exists("speaker"));

    assert!(ctx.redo());
    let record = ctx.entity(&pasted[0]).expect("redo should rebuild the pasted entity");
    assert_eq!(record.children_ids().len(), 1);
}

#[test]
fn copy_is_a_pure_read() {
    let mut ctx = EditorContext::new(EditorConfig::default());
    ctx.load(source_project()).expect("source project should load");
    let before: Value = json!(ctx.entity("speaker").expect("speaker").data().clone());
    ctx.copy_entities(&["speaker".to_string()]).expect("copy should succeed");
    assert_eq!(json!(ctx.entity("speaker").expect("speaker").data().clone()), before);
    assert!(!ctx.history().can_undo(), "copy records no history");
}
