use crate::path::{KeyPath, PathPattern};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Declares which fields of a component type hold cross-record references.
/// Patterns may contain `*` wildcards for array/slot-indexed sub-objects.
#[derive(Debug, Clone, Default)]
pub struct ComponentSchema {
    entity_fields: Vec<PathPattern>,
    asset_fields: Vec<PathPattern>,
    defaults: Value,
}

impl ComponentSchema {
    pub fn new(entity_fields: &[&str], asset_fields: &[&str], defaults: Value) -> Self {
        ComponentSchema {
            entity_fields: entity_fields.iter().map(|raw| PathPattern::parse(raw)).collect(),
            asset_fields: asset_fields.iter().map(|raw| PathPattern::parse(raw)).collect(),
            defaults,
        }
    }

    pub fn entity_fields(&self) -> &[PathPattern] {
        &self.entity_fields
    }

    pub fn asset_fields(&self) -> &[PathPattern] {
        &self.asset_fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Entity,
    Asset,
    Boolean,
    Number,
    String,
    Json,
}

#[derive(Debug, Clone)]
pub struct ScriptAttribute {
    pub name: String,
    pub kind: AttributeKind,
    pub array: bool,
}

/// Metadata for one script: the asset that defines it plus its declared
/// attribute schema.
#[derive(Debug, Clone)]
pub struct ScriptInfo {
    pub asset_id: String,
    pub attributes: Vec<ScriptAttribute>,
}

/// Schema lookups consumed by the reference scanner and the clipboard.
/// Missing entries mean "no references from this component/script", never an
/// error; favoring under-restoration over crashing a whole scan.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    components: HashMap<String, ComponentSchema>,
    scripts: HashMap<String, ScriptInfo>,
    legacy_scripts: bool,
}

impl SchemaSet {
    pub fn new() -> Self {
        SchemaSet::default()
    }

    /// Schema table for the stock component set.
    pub fn with_builtin_components() -> Self {
        let mut set = SchemaSet::new();
        set.register_component(
            "button",
            ComponentSchema::new(
                &["imageEntity"],
                &[],
                json!({ "enabled": true, "active": true, "imageEntity": null, "transitionMode": 0 }),
            ),
        );
        set.register_component(
            "scrollview",
            ComponentSchema::new(
                &["viewportEntity", "contentEntity", "horizontalScrollbarEntity", "verticalScrollbarEntity"],
                &[],
                json!({
                    "enabled": true,
                    "viewportEntity": null,
                    "contentEntity": null,
                    "horizontalScrollbarEntity": null,
                    "verticalScrollbarEntity": null
                }),
            ),
        );
        set.register_component(
            "scrollbar",
            ComponentSchema::new(
                &["handleEntity"],
                &[],
                json!({ "enabled": true, "orientation": 0, "value": 0, "handleEntity": null }),
            ),
        );
        set.register_component(
            "element",
            ComponentSchema::new(
                &[],
                &["textureAsset", "spriteAsset", "materialAsset", "fontAsset"],
                json!({ "enabled": true, "type": "image", "width": 32, "height": 32 }),
            ),
        );
        set.register_component(
            "sprite",
            ComponentSchema::new(
                &[],
                &["spriteAsset", "clips.*.spriteAsset"],
                json!({ "enabled": true, "type": "simple", "frame": 0, "spriteAsset": null }),
            ),
        );
        set.register_component(
            "sound",
            ComponentSchema::new(&[], &["slots.*.asset"], json!({ "enabled": true, "slots": {} })),
        );
        set.register_component(
            "animation",
            ComponentSchema::new(
                &[],
                &["assets.*"],
                json!({ "enabled": true, "assets": [], "speed": 1, "loop": true }),
            ),
        );
        set.register_component(
            "model",
            ComponentSchema::new(
                &[],
                &["asset", "materialAsset"],
                json!({ "enabled": true, "type": "asset", "asset": null }),
            ),
        );
        set.register_component(
            "collision",
            ComponentSchema::new(&[], &["asset"], json!({ "enabled": true, "type": "box", "asset": null })),
        );
        set.register_component(
            "particlesystem",
            ComponentSchema::new(
                &[],
                &["colorMapAsset", "normalMapAsset", "mesh"],
                json!({ "enabled": true, "numParticles": 30 }),
            ),
        );
        set.register_component("camera", ComponentSchema::new(&[], &[], json!({ "enabled": true, "fov": 45 })));
        set.register_component("light", ComponentSchema::new(&[], &[], json!({ "enabled": true, "type": "directional" })));
        // Script references are declared per-script, not here.
        set.register_component("script", ComponentSchema::new(&[], &[], json!({ "enabled": true, "order": [], "scripts": {} })));
        set
    }

    pub fn register_component(&mut self, name: impl Into<String>, schema: ComponentSchema) {
        self.components.insert(name.into(), schema);
    }

    pub fn component(&self, name: &str) -> Option<&ComponentSchema> {
        self.components.get(name)
    }

    /// Default payload for a named component type, or None if unknown.
    pub fn default_component(&self, name: &str) -> Option<Value> {
        self.components.get(name).map(|schema| schema.defaults.clone())
    }

    pub fn register_script(&mut self, name: impl Into<String>, info: ScriptInfo) {
        self.scripts.insert(name.into(), info);
    }

    pub fn script(&self, name: &str) -> Option<&ScriptInfo> {
        self.scripts.get(name)
    }

    /// Whether the current project uses the legacy scripting system. Paste
    /// drops the script component outright when source and destination
    /// disagree; the two generations cannot be reconciled.
    pub fn legacy_scripts(&self) -> bool {
        self.legacy_scripts
    }

    pub fn set_legacy_scripts(&mut self, legacy: bool) {
        self.legacy_scripts = legacy;
    }

    /// Concrete entity-reference paths present in `data` for a component.
    pub fn entity_reference_paths(&self, component: &str, data: &Value) -> Vec<KeyPath> {
        if component == "script" {
            return self.script_attribute_paths(data, AttributeKind::Entity);
        }
        let Some(schema) = self.components.get(component) else {
            log::debug!("no schema for component '{component}', skipping reference scan");
            return Vec::new();
        };
        schema.entity_fields.iter().flat_map(|pattern| pattern.expand(data)).collect()
    }

    /// Concrete asset-reference paths present in `data` for a component.
    pub fn asset_reference_paths(&self, component: &str, data: &Value) -> Vec<KeyPath> {
        if component == "script" {
            return self.script_attribute_paths(data, AttributeKind::Asset);
        }
        let Some(schema) = self.components.get(component) else {
            return Vec::new();
        };
        schema.asset_fields.iter().flat_map(|pattern| pattern.expand(data)).collect()
    }

    /// Walks `scripts.<name>.attributes.<attr>` for every script instance in
    /// a script component, expanding array-valued attributes per element.
    fn script_attribute_paths(&self, data: &Value, kind: AttributeKind) -> Vec<KeyPath> {
        let mut paths = Vec::new();
        let Some(Value::Object(scripts)) = data.get("scripts") else {
            return paths;
        };
        for (script_name, _instance) in scripts {
            let Some(info) = self.scripts.get(script_name) else {
                log::debug!("no script metadata for '{script_name}', skipping attributes");
                continue;
            };
            for attribute in info.attributes.iter().filter(|attribute| attribute.kind == kind) {
                let base = format!("scripts.{script_name}.attributes.{}", attribute.name);
                let pattern = if attribute.array {
                    PathPattern::parse(&format!("{base}.*"))
                } else {
                    PathPattern::parse(&base)
                };
                paths.extend(pattern.expand(data));
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_button_declares_image_entity() {
        let schema = SchemaSet::with_builtin_components();
        let data = json!({ "imageEntity": "guid-1", "active": true });
        let paths = schema.entity_reference_paths("button", &data);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].to_string(), "imageEntity");
    }

    #[test]
    fn script_attributes_expand_arrays() {
        let mut schema = SchemaSet::with_builtin_components();
        schema.register_script(
            "patrol",
            ScriptInfo {
                asset_id: "42".to_string(),
                attributes: vec![ScriptAttribute {
                    name: "waypoints".to_string(),
                    kind: AttributeKind::Entity,
                    array: true,
                }],
            },
        );
        let data = json!({
            "order": ["patrol"],
            "scripts": { "patrol": { "attributes": { "waypoints": ["a", "b"] } } }
        });
        let mut paths: Vec<String> =
            schema.entity_reference_paths("script", &data).iter().map(|p| p.to_string()).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec!["scripts.patrol.attributes.waypoints.0", "scripts.patrol.attributes.waypoints.1"]
        );
    }

    #[test]
    fn unknown_component_scans_to_nothing() {
        let schema = SchemaSet::with_builtin_components();
        assert!(schema.entity_reference_paths("mystery", &json!({ "ref": "x" })).is_empty());
    }
}
