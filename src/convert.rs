//! Type-directed conversion of plain mapping data.
//!
//! Coercion rules per descriptor:
//! - `int`: ints; floats with no fractional part; integer text. Never bools.
//! - `float`: ints, floats, numeric text. Never bools.
//! - `str`, `Path`: text only, numbers are not stringified.
//! - `bool`: bools and `"true"`/`"false"` in any case.
//! - `Any`: anything, untouched.
//! - containers recurse, unions try their arms in order, enums match by
//!   value, nested schemas bind mappings, registries bind the mapping's
//!   `type` variant.
use serde_json::Value as Json;
use tracing::trace;

use crate::binder::Binder;
use crate::error::{ConversionError, Error, Result};
use crate::plain::describe;
use crate::registry::TYPE_KEY;
use crate::ty::{Prim, Ty};
use crate::value::Value;

#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Field(String),
    Index(usize),
    Key(String),
}

/// Where the converter currently is, for error messages.
pub(crate) struct Ctx<'b> {
    pub(crate) binder: &'b Binder,
    path: Vec<Segment>,
}

impl<'b> Ctx<'b> {
    pub(crate) fn new(binder: &'b Binder) -> Self {
        Self { binder, path: Vec::new() }
    }

    /// Run `f` one level deeper; the level is popped whatever `f` returns.
    pub(crate) fn onto<T>(&mut self, seg: Segment, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.path.push(seg);
        let out = f(self);
        self.path.pop();
        out
    }

    pub(crate) fn path(&self) -> String {
        if self.path.is_empty() {
            return "<root>".into();
        }
        let mut out = String::new();
        for seg in &self.path {
            match seg {
                Segment::Field(name) | Segment::Key(name) => {
                    if !out.is_empty() { out.push('.'); }
                    out.push_str(name);
                }
                Segment::Index(i) => out.push_str(&format!("[{i}]")),
            }
        }
        out
    }

    pub(crate) fn mismatch(&self, ty: &Ty, plain: &Json, reason: impl Into<String>) -> Error {
        Error::Conversion(ConversionError {
            path: self.path(),
            expected: ty.to_string(),
            found: describe(plain),
            reason: reason.into(),
            candidates: Vec::new(),
        })
    }
}

pub(crate) fn convert(ctx: &mut Ctx<'_>, plain: &Json, ty: &Ty) -> Result<Value> {
    match ty {
        Ty::Prim(p) => convert_prim(ctx, plain, *p, ty),
        Ty::Any => Ok(Value::Any(plain.clone())),
        Ty::Optional(inner) => match plain {
            Json::Null => Ok(Value::Null),
            other => convert(ctx, other, inner),
        },
        Ty::List(inner) => {
            let Json::Array(items) = plain else {
                return Err(ctx.mismatch(ty, plain, "expected a list"));
            };
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(ctx.onto(Segment::Index(i), |ctx| convert(ctx, item, inner))?);
            }
            Ok(Value::List(out))
        }
        Ty::Tuple(tys) => {
            let Json::Array(items) = plain else {
                return Err(ctx.mismatch(ty, plain, "expected a list"));
            };
            if items.len() != tys.len() {
                return Err(ctx.mismatch(
                    ty,
                    plain,
                    format!("expected exactly {} items, found {}", tys.len(), items.len()),
                ));
            }
            let mut out = Vec::with_capacity(items.len());
            for (i, (item, item_ty)) in items.iter().zip(tys).enumerate() {
                out.push(ctx.onto(Segment::Index(i), |ctx| convert(ctx, item, item_ty))?);
            }
            Ok(Value::Tuple(out))
        }
        Ty::Dict(key_ty, value_ty) => {
            let Json::Object(map) = plain else {
                return Err(ctx.mismatch(ty, plain, "expected a mapping"));
            };
            let mut out: Vec<(Value, Value)> = Vec::with_capacity(map.len());
            for (k, v) in map {
                let key = ctx.onto(Segment::Key(format!("(key){k}")), |ctx| {
                    convert(ctx, &Json::String(k.clone()), key_ty)
                })?;
                let value = ctx.onto(Segment::Key(k.clone()), |ctx| convert(ctx, v, value_ty))?;
                match out.iter_mut().find(|(existing, _)| *existing == key) {
                    Some(slot) => slot.1 = value,
                    None => out.push((key, value)),
                }
            }
            Ok(Value::Dict(out))
        }
        Ty::Union(arms) => {
            let mut failures = Vec::with_capacity(arms.len());
            for arm in arms {
                match convert(ctx, plain, arm) {
                    Ok(v) => return Ok(v),
                    Err(e) => {
                        trace!(path = %ctx.path(), arm = %arm, "union arm rejected: {e}");
                        failures.push(format!("{arm}: {e}"));
                    }
                }
            }
            Err(Error::Conversion(ConversionError {
                path: ctx.path(),
                expected: ty.to_string(),
                found: describe(plain),
                reason: "no member of the union accepts it".into(),
                candidates: failures,
            }))
        }
        Ty::Enum(e) => e
            .from_value(plain)
            .map(Value::Enum)
            .ok_or_else(|| ctx.mismatch(ty, plain, format!("expected one of {}", e.choices().join(", ")))),
        Ty::Nested(schema) => match plain {
            Json::Object(_) => {
                let binder = ctx.binder;
                binder.bind_in(ctx, schema, plain).map(|i| Value::Instance(Box::new(i)))
            }
            other => Err(ctx.mismatch(ty, other, "expected a mapping")),
        },
        Ty::Registry(registry) => {
            let Json::Object(map) = plain else {
                return Err(ctx.mismatch(ty, plain, format!("expected a mapping with a `{TYPE_KEY}` key")));
            };
            let choices = || registry.choices().join(", ");
            let Some(tag) = map.get(TYPE_KEY).and_then(Json::as_str) else {
                return Err(ctx.mismatch(ty, plain, format!("`{TYPE_KEY}` must name one of {}", choices())));
            };
            let Some(schema) = registry.get(tag) else {
                return Err(ctx.mismatch(ty, plain, format!("`{tag}` is not registered; expected one of {}", choices())));
            };
            let mut fields = map.clone();
            fields.shift_remove(TYPE_KEY);
            let binder = ctx.binder;
            binder
                .bind_in(ctx, schema, &Json::Object(fields))
                .map(|i| Value::Instance(Box::new(i.with_tag(Some(tag.to_string())))))
        }
    }
}

fn convert_prim(ctx: &mut Ctx<'_>, plain: &Json, prim: Prim, ty: &Ty) -> Result<Value> {
    match (prim, plain) {
        (Prim::Int, Json::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::Int(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(Value::Int(f as i64))
                }
                Some(f) if f.is_finite() && f.fract() == 0.0 => {
                    Err(ctx.mismatch(ty, plain, "out of range for a 64-bit integer"))
                }
                _ => Err(ctx.mismatch(ty, plain, "cannot implicitly cast a float with a fractional part to int")),
            }
        }
        (Prim::Int, Json::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ctx.mismatch(ty, plain, "not an integer literal")),

        (Prim::Float, Json::Number(n)) => n
            .as_f64()
            .map(Value::from)
            .ok_or_else(|| ctx.mismatch(ty, plain, "not representable as a float")),
        (Prim::Float, Json::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| ctx.mismatch(ty, plain, "not a float literal")),

        (Prim::Str, Json::String(s)) => Ok(Value::Str(s.clone())),
        (Prim::Path, Json::String(s)) => Ok(Value::Path(s.into())),

        (Prim::Bool, Json::Bool(b)) => Ok(Value::Bool(*b)),
        (Prim::Bool, Json::String(s)) => {
            if s.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if s.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(ctx.mismatch(ty, plain, "expected `true` or `false`"))
            }
        }

        (Prim::Int | Prim::Float, Json::Bool(_)) => {
            Err(ctx.mismatch(ty, plain, "booleans are not numbers here"))
        }
        _ => Err(ctx.mismatch(ty, plain, "incompatible kind")),
    }
}

/// Like [`convert`], but starting from a typed value: instances of the right
/// schema and members of the right enum pass through unchanged, `Any` keeps
/// whatever it is given, everything else round-trips through plain data.
pub(crate) fn coerce(ctx: &mut Ctx<'_>, value: Value, ty: &Ty) -> Result<Value> {
    match (ty, value) {
        (Ty::Any, v) => Ok(v),
        (Ty::Optional(_), Value::Null) => Ok(Value::Null),
        (Ty::Optional(inner), v) => coerce(ctx, v, inner),
        (Ty::Nested(schema), Value::Instance(inst)) if inst.schema() == schema => {
            Ok(Value::Instance(Box::new((*inst).with_tag(None))))
        }
        (Ty::Registry(registry), Value::Instance(inst)) => {
            // keep the instance's own variant name when it still points at its schema
            let tag = inst
                .tag()
                .filter(|tag| registry.get(tag) == Some(inst.schema()))
                .or_else(|| registry.name_of(inst.schema()))
                .map(str::to_string);
            match tag {
                Some(tag) => Ok(Value::Instance(Box::new((*inst).with_tag(Some(tag))))),
                None => convert(ctx, &inst.asdict(), ty),
            }
        }
        (Ty::Enum(e), Value::Enum(m)) if m.enum_type() == e => Ok(Value::Enum(m)),
        (Ty::List(inner), Value::List(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                out.push(ctx.onto(Segment::Index(i), |ctx| coerce(ctx, item, inner))?);
            }
            Ok(Value::List(out))
        }
        (Ty::Tuple(tys), Value::Tuple(items) | Value::List(items)) if items.len() == tys.len() => {
            let mut out = Vec::with_capacity(items.len());
            for (i, (item, item_ty)) in items.into_iter().zip(tys).enumerate() {
                out.push(ctx.onto(Segment::Index(i), |ctx| coerce(ctx, item, item_ty))?);
            }
            Ok(Value::Tuple(out))
        }
        (Ty::Union(arms), v) => {
            for arm in arms {
                if let Ok(out) = coerce(ctx, v.clone(), arm) {
                    return Ok(out);
                }
            }
            // Report through the plain path so every arm's failure is listed.
            convert(ctx, &v.to_plain(), ty)
        }
        (_, v) => convert(ctx, &v.to_plain(), ty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::EnumType;
    use serde_json::json;

    fn conv(plain: Json, ty: &Ty) -> Result<Value> {
        Binder::new().convert(&plain, ty)
    }

    fn conversion_err(r: Result<Value>) -> ConversionError {
        match r {
            Err(Error::Conversion(e)) => e,
            other => panic!("expected a conversion error, got {other:?}"),
        }
    }

    #[test]
    fn int_coercion() {
        assert_eq!(conv(json!("10"), &Ty::INT).unwrap(), Value::Int(10));
        assert_eq!(conv(json!(10.0), &Ty::INT).unwrap(), Value::Int(10));
        assert_eq!(conv(json!(7), &Ty::INT).unwrap(), Value::Int(7));
        conversion_err(conv(json!(10.5), &Ty::INT));
        conversion_err(conv(json!(true), &Ty::INT));
        conversion_err(conv(json!("10.0"), &Ty::INT));
        conversion_err(conv(json!(null), &Ty::INT));
    }

    #[test]
    fn float_str_bool_coercion() {
        assert_eq!(conv(json!(3), &Ty::FLOAT).unwrap(), Value::from(3.0));
        assert_eq!(conv(json!("1e-4"), &Ty::FLOAT).unwrap(), Value::from(1e-4));
        conversion_err(conv(json!(false), &Ty::FLOAT));

        assert_eq!(conv(json!("abc"), &Ty::STR).unwrap(), Value::from("abc"));
        conversion_err(conv(json!(3), &Ty::STR));

        assert_eq!(conv(json!("TRUE"), &Ty::BOOL).unwrap(), Value::Bool(true));
        assert_eq!(conv(json!("false"), &Ty::BOOL).unwrap(), Value::Bool(false));
        conversion_err(conv(json!("yes"), &Ty::BOOL));
        conversion_err(conv(json!(1), &Ty::BOOL));
    }

    #[test]
    fn non_finite_floats_survive_asdict() {
        for text in ["inf", "-inf", "nan", "Infinity"] {
            let v = conv(json!(text), &Ty::FLOAT).unwrap();
            let plain = v.to_plain();
            assert!(plain.is_string(), "{text}");
            assert_eq!(conv(plain, &Ty::FLOAT).unwrap(), v, "{text}");
        }
        assert_eq!(Value::from(0.5).to_plain(), json!(0.5));
    }

    #[test]
    fn union_order_breaks_ties() {
        let int_first = Ty::Union(vec![Ty::INT, Ty::FLOAT]);
        let float_first = Ty::Union(vec![Ty::FLOAT, Ty::INT]);
        assert_eq!(conv(json!("3"), &int_first).unwrap(), Value::Int(3));
        assert_eq!(conv(json!("3"), &float_first).unwrap(), Value::from(3.0));
    }

    #[test]
    fn union_failure_lists_every_arm() {
        let ty = Ty::Union(vec![Ty::INT, Ty::BOOL]);
        let err = conversion_err(conv(json!([1]), &ty));
        assert_eq!(err.candidates.len(), 2);
        assert!(err.candidates[0].starts_with("int:"));
        assert!(err.candidates[1].starts_with("bool:"));
    }

    #[test]
    fn optional_accepts_null_and_inner() {
        let ty = Ty::optional(Ty::INT);
        assert_eq!(conv(json!(null), &ty).unwrap(), Value::Null);
        assert_eq!(conv(json!("4"), &ty).unwrap(), Value::Int(4));
    }

    #[test]
    fn list_errors_carry_the_index() {
        let err = conversion_err(conv(json!([1, 2, "x"]), &Ty::list(Ty::INT)));
        assert_eq!(err.path, "[2]");
        conversion_err(conv(json!({"a": 1}), &Ty::list(Ty::INT)));
    }

    #[test]
    fn tuple_arity_is_exact() {
        let ty = Ty::tuple(vec![Ty::INT, Ty::STR]);
        assert_eq!(
            conv(json!([1, "a"]), &ty).unwrap(),
            Value::Tuple(vec![Value::Int(1), Value::from("a")])
        );
        conversion_err(conv(json!([1]), &ty));
        conversion_err(conv(json!([1, "a", 2]), &ty));
    }

    #[test]
    fn dict_converts_keys_and_values() {
        let ty = Ty::dict(Ty::INT, Ty::FLOAT);
        let v = conv(json!({"1": 2, "3": "0.5"}), &ty).unwrap();
        assert_eq!(
            v,
            Value::Dict(vec![(Value::Int(1), Value::from(2.0)), (Value::Int(3), Value::from(0.5))])
        );
        let err = conversion_err(conv(json!({"x": 1}), &ty));
        assert_eq!(err.path, "(key)x");
    }

    #[test]
    fn enums_match_by_value() {
        let e = EnumType::new("OptType", [("sgd", "sgd"), ("adam", "adam")]).unwrap();
        let ty = Ty::enumeration(&e);
        assert_eq!(conv(json!("adam"), &ty).unwrap(), Value::Enum(e.member("adam").unwrap()));
        let err = conversion_err(conv(json!("rmsprop"), &ty));
        assert!(err.reason.contains("sgd, adam"));
    }

    fn backbones() -> Ty {
        let mut ns = crate::registry::Namespace::new();
        ns.declare(crate::schema::SchemaDecl::new("ResNet").field("depth", "int").field_default("pretrained", "bool", true))
            .unwrap();
        ns.declare(crate::schema::SchemaDecl::new("ViT").field("patch", "int")).unwrap();
        ns.declare_registry("Backbone", [("resnet", "ResNet"), ("vit", "ViT")]).unwrap();
        ns.resolve("Backbone").unwrap()
    }

    #[test]
    fn registries_bind_the_named_variant() {
        let ty = backbones();
        let v = conv(json!({"type": "resnet", "depth": "50"}), &ty).unwrap();
        let Value::Instance(inst) = &v else { panic!("expected an instance, got {v:?}") };
        assert_eq!(inst.schema().name(), "ResNet");
        assert_eq!(inst.tag(), Some("resnet"));
        assert_eq!(inst.get("depth"), Some(&Value::Int(50)));
        assert_eq!(v.to_plain(), json!({"type": "resnet", "depth": 50, "pretrained": true}));
        assert_eq!(conv(v.to_plain(), &ty).unwrap(), v);

        let missing = conversion_err(conv(json!({"depth": 50}), &ty));
        assert!(missing.reason.contains("resnet, vit"), "{}", missing.reason);
        let unknown = conversion_err(conv(json!({"type": "swin"}), &ty));
        assert!(unknown.reason.contains("`swin` is not registered"));
        assert!(matches!(conv(json!({"type": "vit", "depth": 50}), &ty), Err(Error::UnknownField { .. })));
    }

    #[test]
    fn registry_instances_coerce_by_schema() {
        let ty = backbones();
        let Ty::Registry(registry) = &ty else { unreachable!() };
        let vit = Binder::new().bind(registry.get("vit").unwrap(), &json!({"patch": 16})).unwrap();
        assert_eq!(vit.tag(), None);
        let coerced = Binder::new().coerce(Value::from(vit.clone()), &ty).unwrap();
        assert_eq!(coerced.to_plain(), json!({"type": "vit", "patch": 16}));

        // a tagged instance placed in a plain nested slot loses the tag
        let back = Binder::new().coerce(coerced, &Ty::nested(vit.schema())).unwrap();
        assert_eq!(back, Value::from(vit));
    }

    #[test]
    fn any_passes_through() {
        let plain = json!({"anything": [1, "two", null]});
        assert_eq!(conv(plain.clone(), &Ty::Any).unwrap(), Value::Any(plain));
    }
}
