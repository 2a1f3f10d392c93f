//! Mapping data → [`Instance`].
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::convert::{self, Ctx, Segment};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::schema::Schema;
use crate::ty::Ty;
use crate::value::Value;

/// Reserved key carrying free-form notes; never a field.
pub const META_KEY: &str = "_meta";

/// Binding options. Schemas are fail-closed by default: keys that match no
/// field are an error unless [`Binder::allow_unknown`] is set, in which case
/// they are kept on the instance and written back by `asdict`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Binder {
    allow_unknown: bool,
}

/// One argument of direct construction.
#[derive(Debug, Clone)]
pub enum Arg {
    Plain(Json),
    Typed(Value),
}

impl From<Json> for Arg {
    fn from(plain: Json) -> Self { Arg::Plain(plain) }
}
impl From<Value> for Arg {
    fn from(value: Value) -> Self { Arg::Typed(value) }
}
impl From<Instance> for Arg {
    fn from(inst: Instance) -> Self { Arg::Typed(Value::from(inst)) }
}

impl Binder {
    pub fn new() -> Self { Self::default() }

    pub fn allow_unknown(mut self, yes: bool) -> Self {
        self.allow_unknown = yes;
        self
    }

    pub fn allows_unknown(&self) -> bool { self.allow_unknown }

    pub fn bind(&self, schema: &Schema, plain: &Json) -> Result<Instance> {
        let mut ctx = Ctx::new(self);
        self.bind_in(&mut ctx, schema, plain)
    }

    /// Convert plain data against a descriptor.
    pub fn convert(&self, plain: &Json, ty: &Ty) -> Result<Value> {
        convert::convert(&mut Ctx::new(self), plain, ty)
    }

    /// Convert an already-typed value against a descriptor.
    pub fn coerce(&self, value: Value, ty: &Ty) -> Result<Value> {
        convert::coerce(&mut Ctx::new(self), value, ty)
    }

    pub(crate) fn bind_in(&self, ctx: &mut Ctx<'_>, schema: &Schema, plain: &Json) -> Result<Instance> {
        let Json::Object(map) = plain else {
            return Err(ctx.mismatch(&Ty::nested(schema), plain, "expected a mapping"));
        };

        let mut values = IndexMap::with_capacity(schema.len());
        for field in schema.fields() {
            let value = match (map.get(&field.name), &field.default) {
                (Some(v), _) => ctx.onto(Segment::Field(field.name.clone()), |ctx| {
                    convert::convert(ctx, v, &field.ty)
                })?,
                // defaults are plain data too and go through the same conversion
                (None, Some(default)) => ctx.onto(Segment::Field(field.name.clone()), |ctx| {
                    convert::convert(ctx, default, &field.ty)
                })?,
                (None, None) => {
                    return Err(Error::MissingField {
                        schema: schema.name().to_string(),
                        field: field.name.clone(),
                        path: ctx.path(),
                    });
                }
            };
            values.insert(field.name.clone(), value);
        }

        let mut extra = IndexMap::new();
        let mut unknown = Vec::new();
        for (key, v) in map {
            if key == META_KEY || schema.field(key).is_some() {
                continue;
            }
            if self.allow_unknown {
                extra.insert(key.clone(), v.clone());
            } else {
                unknown.push(key.clone());
            }
        }
        if !unknown.is_empty() {
            return Err(Error::UnknownField { schema: schema.name().to_string(), fields: unknown, path: ctx.path() });
        }

        let inst = Instance::new(schema.clone(), values, extra, map.get(META_KEY).cloned());
        validate(schema, &inst)?;
        Ok(inst)
    }

    pub fn construct<P, K>(&self, schema: &Schema, positional: P, keyword: K) -> Result<Instance>
    where
        P: IntoIterator<Item = Arg>,
        K: IntoIterator<Item = (String, Arg)>,
    {
        let positional: Vec<Arg> = positional.into_iter().collect();
        if positional.len() > schema.len() {
            return Err(Error::TooManyArguments {
                schema: schema.name().to_string(),
                expected: schema.len(),
                given: positional.len(),
            });
        }
        let mut args: IndexMap<String, Arg> = IndexMap::new();
        for (field, arg) in schema.fields().zip(positional) {
            args.insert(field.name.clone(), arg);
        }
        for (name, arg) in keyword {
            if args.contains_key(&name) {
                return Err(Error::DuplicateArgument { schema: schema.name().to_string(), field: name });
            }
            args.insert(name, arg);
        }

        // Typed arguments keep their identity; plain ones join the mapping.
        let mut plain = serde_json::Map::new();
        let mut typed: IndexMap<String, Value> = IndexMap::new();
        for (name, arg) in args {
            match arg {
                Arg::Plain(p) => { plain.insert(name, p); }
                Arg::Typed(v) => {
                    plain.insert(name.clone(), v.to_plain());
                    typed.insert(name, v);
                }
            }
        }

        let mut inst = self.bind(schema, &Json::Object(plain))?;
        if typed.is_empty() {
            return Ok(inst);
        }
        let mut ctx = Ctx::new(self);
        for (name, v) in typed {
            // bind() already rejected unknown names unless passthrough is on
            let Some(field) = schema.field(&name) else { continue };
            let value = ctx.onto(Segment::Field(name.clone()), |ctx| convert::coerce(ctx, v, &field.ty))?;
            inst.set(&name, value)?;
        }
        validate(schema, &inst)?;
        Ok(inst)
    }
}

fn validate(schema: &Schema, inst: &Instance) -> Result<()> {
    for check in schema.validators() {
        check(inst).map_err(|message| Error::Validation { schema: schema.name().to_string(), message })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Namespace;
    use crate::schema::SchemaDecl;
    use serde_json::json;

    fn trainer_ns() -> (Namespace, Schema) {
        let mut ns = Namespace::new();
        ns.declare_enum("OptType", [("sgd", "sgd"), ("adam", "adam")]).unwrap();
        ns.declare(
            SchemaDecl::new("Optimizer")
                .field("opt_type", "OptType")
                .field_default("learning_rate", "float", 0.01)
                .field_default("momentum", "Optional[float]", Json::Null),
        )
        .unwrap();
        let trainer = ns
            .declare(
                SchemaDecl::new("Trainer")
                    .field("optimizer", "Optimizer")
                    .field("num_epochs", "List[int]")
                    .field_default("batch_size", "int", 32)
                    .field_default("tags", "Dict[str, Any]", json!({})),
            )
            .unwrap();
        (ns, trainer)
    }

    #[test]
    fn binds_nested_schemas_with_defaults() {
        let (_, trainer) = trainer_ns();
        let inst = trainer
            .fromdict(&json!({
                "optimizer": {"opt_type": "adam", "learning_rate": 0.1},
                "num_epochs": [10, "20"],
            }))
            .unwrap();
        assert_eq!(inst.lookup("optimizer.opt_type").unwrap().as_enum().unwrap().name(), "adam");
        assert_eq!(inst.lookup("optimizer.learning_rate").unwrap().as_f64(), Some(0.1));
        assert_eq!(inst.lookup("optimizer.momentum"), Some(&Value::Null));
        assert_eq!(inst.lookup("num_epochs.1"), Some(&Value::Int(20)));
        assert_eq!(inst.get("batch_size"), Some(&Value::Int(32)));
    }

    #[test]
    fn unknown_enum_value_is_a_conversion_error() {
        let (_, trainer) = trainer_ns();
        let err = trainer
            .fromdict(&json!({"optimizer": {"opt_type": "rmsprop"}, "num_epochs": []}))
            .unwrap_err();
        match err {
            Error::Conversion(e) => assert_eq!(e.path, "optimizer.opt_type"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_required_field() {
        let (_, trainer) = trainer_ns();
        let err = trainer.fromdict(&json!({"optimizer": {}, "num_epochs": []})).unwrap_err();
        match err {
            Error::MissingField { schema, field, path } => {
                assert_eq!((schema.as_str(), field.as_str(), path.as_str()), ("Optimizer", "opt_type", "optimizer"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn optional_type_without_default_is_still_required() {
        let mut ns = Namespace::new();
        let s = ns.declare(SchemaDecl::new("S").field("x", "Optional[int]")).unwrap();
        assert!(matches!(s.fromdict(&json!({})), Err(Error::MissingField { .. })));
        assert_eq!(s.fromdict(&json!({"x": null})).unwrap().get("x"), Some(&Value::Null));
    }

    #[test]
    fn unknown_keys_fail_closed_unless_allowed() {
        let (_, trainer) = trainer_ns();
        let plain = json!({
            "optimizer": {"opt_type": "sgd"},
            "num_epochs": [1],
            "seed": 3,
            "_meta": {"note": "ignored"},
        });
        match trainer.fromdict(&plain) {
            Err(Error::UnknownField { fields, .. }) => assert_eq!(fields, ["seed"]),
            other => panic!("unexpected {other:?}"),
        }

        let inst = Binder::new().allow_unknown(true).bind(&trainer, &plain).unwrap();
        assert_eq!(inst.extra().get("seed"), Some(&json!(3)));
        assert_eq!(inst.meta(), Some(&json!({"note": "ignored"})));
        assert_eq!(inst.asdict()["seed"], json!(3));
        assert!(inst.asdict().get("_meta").is_none());
    }

    #[test]
    fn asdict_then_bind_is_stable() {
        let (_, trainer) = trainer_ns();
        let first = trainer
            .fromdict(&json!({
                "optimizer": {"opt_type": "adam", "learning_rate": "0.5"},
                "num_epochs": [1.0, 2],
                "tags": {"a": [1, {"b": null}]},
            }))
            .unwrap();
        let second = trainer.fromdict(&first.asdict()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.asdict(),
            json!({
                "optimizer": {"opt_type": "adam", "learning_rate": 0.5, "momentum": null},
                "num_epochs": [1, 2],
                "batch_size": 32,
                "tags": {"a": [1, {"b": null}]},
            })
        );
    }

    #[test]
    fn construct_mixes_positional_keyword_and_typed() {
        let (ns, trainer) = trainer_ns();
        let optimizer = ns.schema("Optimizer").unwrap();
        let opt = optimizer.fromdict(&json!({"opt_type": "sgd"})).unwrap();
        let inst = trainer
            .construct(
                [Arg::from(opt.clone()), Arg::from(json!([3]))],
                [("batch_size".to_string(), Arg::from(Value::from("64")))],
            )
            .unwrap();
        assert_eq!(inst.get("optimizer").unwrap().as_instance(), Some(&opt));
        assert_eq!(inst.get("batch_size"), Some(&Value::Int(64)));

        assert!(matches!(
            trainer.construct(vec![Arg::from(json!({})); 5], Vec::<(String, Arg)>::new()),
            Err(Error::TooManyArguments { given: 5, .. })
        ));
        assert!(matches!(
            trainer.construct([Arg::from(opt.clone())], [("optimizer".to_string(), Arg::from(opt))]),
            Err(Error::DuplicateArgument { .. })
        ));
    }

    #[test]
    fn set_is_unchecked() {
        let (_, trainer) = trainer_ns();
        let mut inst = trainer.fromdict(&json!({"optimizer": {"opt_type": "sgd"}, "num_epochs": []})).unwrap();
        let old = inst.set("batch_size", "not a number").unwrap();
        assert_eq!(old, Value::Int(32));
        assert_eq!(inst.get("batch_size"), Some(&Value::from("not a number")));
        assert!(inst.set("nope", 1i64).is_err());
    }

    #[test]
    fn validators_run_after_binding() {
        let mut ns = Namespace::new();
        let s = ns
            .declare(SchemaDecl::new("Range").field("lo", "int").field("hi", "int").validate(|inst| {
                let lo = inst.get("lo").and_then(Value::as_i64).unwrap_or_default();
                let hi = inst.get("hi").and_then(Value::as_i64).unwrap_or_default();
                if lo <= hi { Ok(()) } else { Err(format!("lo ({lo}) > hi ({hi})")) }
            }))
            .unwrap();
        assert!(s.fromdict(&json!({"lo": 1, "hi": 2})).is_ok());
        assert!(matches!(s.fromdict(&json!({"lo": 3, "hi": 2})), Err(Error::Validation { .. })));
    }
}
