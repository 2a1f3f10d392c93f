//! Schemas, enums and registries declared in a YAML/JSON document.
//!
//! ```yaml
//! enums:
//!   OptType: { sgd: sgd, adam: adam }
//! registries:
//!   Scheduler: { step: StepLR, cosine: CosineLR }
//! schemas:
//!   Optimizer:
//!     opt_type: OptType
//!     learning_rate: { type: float, default: 0.1, help: step size }
//!   StepLR: { step_size: int }
//!   CosineLR: { t_max: int }
//!   Trainer:
//!     optimizer: Optimizer
//!     scheduler: Scheduler
//!     num_epochs: List[int]
//! root: Trainer
//! ```
//!
//! Enums are declared first, then schemas in document order, on top of the
//! built-in namespace (so `RuntimeConfig` is always available). A registry
//! is declared as soon as all of its variant schemas are.
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use crate::builtin;
use crate::error::{Error, Result};
use crate::loader;
use crate::registry::Namespace;
use crate::schema::{Schema, SchemaDecl};
use crate::typed::from_plain_with_path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    /// Enum name → member name → value.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub enums: IndexMap<String, IndexMap<String, Json>>,
    /// Registry name → variant name → schema name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub registries: IndexMap<String, IndexMap<String, String>>,
    /// Schema name → field name → field.
    #[serde(default)]
    pub schemas: IndexMap<String, IndexMap<String, FieldSpec>>,
    /// Schema the binary binds configs against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// `learning_rate: float`
    Annotation(String),
    /// `learning_rate: { type: float, default: 0.1, help: ... }`
    Full {
        #[serde(rename = "type")]
        ty: String,
        // `default: null` is a default; a missing key is not
        #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
        default: Option<Json>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        help: Option<String>,
    },
}

fn present<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Option<Json>, D::Error> {
    Json::deserialize(de).map(Some)
}

impl SchemaDocument {
    /// Read a document; `_base_` inheritance applies as for configs.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        from_plain_with_path(loader::load(path)?)
    }

    pub fn from_plain(plain: Json) -> Result<Self> {
        from_plain_with_path(plain)
    }

    /// Declare everything into a fresh namespace.
    pub fn declare(&self) -> Result<Namespace> {
        let mut ns = builtin::namespace()?;
        for (name, members) in &self.enums {
            ns.declare_enum(name.clone(), members.clone())?;
        }
        let mut pending: Vec<_> = self.registries.iter().collect();
        declare_ready_registries(&mut ns, &mut pending)?;
        for (name, fields) in &self.schemas {
            let mut decl = SchemaDecl::new(name.clone());
            for (field, spec) in fields {
                decl = match spec {
                    FieldSpec::Annotation(ty) => decl.field(field.clone(), ty.clone()),
                    FieldSpec::Full { ty, default, help } => {
                        let decl = match default {
                            Some(default) => decl.field_default(field.clone(), ty.clone(), default.clone()),
                            None => decl.field(field.clone(), ty.clone()),
                        };
                        match help {
                            Some(help) => decl.help(help.clone()),
                            None => decl,
                        }
                    }
                };
            }
            ns.declare(decl)?;
            debug!(schema = %name, fields = fields.len(), "declared");
            declare_ready_registries(&mut ns, &mut pending)?;
        }
        if let Some(missing) = pending.iter().flat_map(|(_, variants)| variants.values()).find(|s| ns.schema(s).is_none()) {
            return Err(Error::UnknownSchema { name: missing.clone() });
        }
        Ok(ns)
    }

    /// The schema to bind against: `name` if given, else the document's
    /// `root`, else its last schema.
    pub fn root_schema(&self, ns: &Namespace, name: Option<&str>) -> Result<Schema> {
        let name = name
            .or(self.root.as_deref())
            .or_else(|| self.schemas.keys().last().map(String::as_str))
            .ok_or_else(|| Error::UnknownSchema { name: "<root>".into() })?;
        ns.schema(name).cloned().ok_or_else(|| Error::UnknownSchema { name: name.to_string() })
    }
}

fn declare_ready_registries(ns: &mut Namespace, pending: &mut Vec<(&String, &IndexMap<String, String>)>) -> Result<()> {
    let mut at = 0;
    while at < pending.len() {
        let (name, variants) = pending[at];
        if variants.values().all(|schema| ns.schema(schema).is_some()) {
            ns.declare_registry(name.clone(), variants.iter())?;
            debug!(registry = %name, variants = variants.len(), "declared");
            pending.remove(at);
        } else {
            at += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    const DOC: &str = r#"
enums:
  OptType: { sgd: sgd, adam: adam }
schemas:
  Optimizer:
    opt_type: OptType
    learning_rate: { type: float, default: 0.1, help: step size }
    clip: { type: "Optional[float]", default: null }
  Trainer:
    optimizer: Optimizer
    num_epochs: List[int]
    runtime: { type: RuntimeConfig, default: {} }
root: Trainer
"#;

    fn doc() -> SchemaDocument {
        let plain = loader::parse_str(DOC, loader::Format::Yaml, Path::new("doc.yml")).unwrap();
        SchemaDocument::from_plain(plain).unwrap()
    }

    #[test]
    fn parses_both_field_forms() {
        let doc = doc();
        let opt = &doc.schemas["Optimizer"];
        assert_eq!(opt["opt_type"], FieldSpec::Annotation("OptType".into()));
        assert_eq!(
            opt["learning_rate"],
            FieldSpec::Full { ty: "float".into(), default: Some(json!(0.1)), help: Some("step size".into()) }
        );
        // explicit null default is kept
        assert_eq!(opt["clip"], FieldSpec::Full { ty: "Optional[float]".into(), default: Some(Json::Null), help: None });
    }

    #[test]
    fn declares_and_binds() {
        let doc = doc();
        let ns = doc.declare().unwrap();
        let trainer = doc.root_schema(&ns, None).unwrap();
        assert_eq!(trainer.name(), "Trainer");
        assert!(trainer.field("optimizer").unwrap().required());
        assert_eq!(trainer.field("runtime").map(|f| f.required()), Some(false));

        let inst = trainer
            .fromdict(&json!({"optimizer": {"opt_type": "sgd"}, "num_epochs": [1, "2"]}))
            .unwrap();
        assert_eq!(inst.lookup("optimizer.learning_rate").unwrap().as_f64(), Some(0.1));
        assert_eq!(inst.lookup("optimizer.clip"), Some(&Value::Null));
        assert_eq!(inst.lookup("num_epochs.1"), Some(&Value::Int(2)));
        assert_eq!(inst.lookup("runtime.seed"), Some(&Value::Int(42)));
        assert_eq!(
            ns.schema("Optimizer").unwrap().field("learning_rate").unwrap().help.as_deref(),
            Some("step size")
        );
    }

    #[test]
    fn forward_references_and_unknown_roots_fail() {
        let doc = SchemaDocument::from_plain(json!({
            "schemas": {"A": {"b": "B"}, "B": {"x": "int"}}
        }))
        .unwrap();
        assert!(matches!(doc.declare(), Err(Error::UnsupportedType { .. })));

        let doc = SchemaDocument::from_plain(json!({"schemas": {"A": {"x": "int"}}, "root": "Nope"})).unwrap();
        let ns = doc.declare().unwrap();
        assert!(matches!(doc.root_schema(&ns, None), Err(Error::UnknownSchema { .. })));
        assert_eq!(doc.root_schema(&ns, Some("A")).unwrap().name(), "A");
    }

    #[test]
    fn registries_are_declared_once_their_variants_exist() {
        let doc = SchemaDocument::from_plain(json!({
            "registries": {"Scheduler": {"step": "StepLR", "cosine": "CosineLR"}},
            "schemas": {
                "StepLR": {"step_size": "int", "gamma": {"type": "float", "default": 0.1}},
                "CosineLR": {"t_max": "int"},
                "Trainer": {"scheduler": "Scheduler", "warmup": {"type": "Optional[Scheduler]", "default": null}},
            },
        }))
        .unwrap();
        let ns = doc.declare().unwrap();
        assert_eq!(ns.registry("Scheduler").unwrap().choices(), ["step", "cosine"]);

        let trainer = doc.root_schema(&ns, None).unwrap();
        let inst = trainer.fromdict(&json!({"scheduler": {"type": "step", "step_size": 3}})).unwrap();
        assert_eq!(inst.lookup("scheduler.gamma").unwrap().as_f64(), Some(0.1));
        assert_eq!(inst.get("warmup"), Some(&Value::Null));
        assert_eq!(
            inst.asdict(),
            json!({"scheduler": {"type": "step", "step_size": 3, "gamma": 0.1}, "warmup": null})
        );

        let dangling = SchemaDocument::from_plain(json!({
            "registries": {"Head": {"mlp": "Mlp"}},
            "schemas": {"A": {"x": "int"}},
        }))
        .unwrap();
        assert!(matches!(dangling.declare(), Err(Error::UnknownSchema { name }) if name == "Mlp"));
    }

    #[test]
    fn malformed_documents_report_a_path() {
        let err = SchemaDocument::from_plain(json!({"schemas": {"A": {"x": 3}}})).unwrap_err();
        assert!(matches!(err, Error::Deserialize { .. }));
        let err = SchemaDocument::from_plain(json!({"schema": {}})).unwrap_err();
        assert!(matches!(err, Error::Deserialize { .. }));
    }
}
