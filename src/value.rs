//! Typed values produced by conversion.
use std::path::PathBuf;

use ordered_float::OrderedFloat;
use serde_json::{Map, Value as Json};

use crate::enums::EnumMember;
use crate::instance::Instance;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Path(PathBuf),
    /// Untouched data of an `Any` field.
    Any(Json),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Insertion-ordered; keys are unique.
    Dict(Vec<(Value, Value)>),
    Enum(EnumMember),
    Instance(Box<Instance>),
}

impl Value {
    /// Structural inverse of conversion: plain mapping data that converts
    /// back to an equal value.
    pub fn to_plain(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) if f.0.is_finite() => Json::from(f.0),
            // JSON has no inf/nan; their text (`inf`, `-inf`, `NaN`) converts back
            Value::Float(f) => Json::String(f.0.to_string()),
            Value::Str(s) => Json::String(s.clone()),
            Value::Path(p) => Json::String(p.to_string_lossy().into_owned()),
            Value::Any(plain) => plain.clone(),
            Value::List(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_plain).collect())
            }
            Value::Dict(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (k, v) in entries {
                    map.insert(k.key_string(), v.to_plain());
                }
                Json::Object(map)
            }
            Value::Enum(member) => member.value().clone(),
            Value::Instance(inst) => inst.asdict(),
        }
    }

    /// The string a dict key takes in mapping data.
    pub(crate) fn key_string(&self) -> String {
        match self.to_plain() {
            Json::String(s) => s,
            other => other.to_string(),
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    pub fn as_bool(&self) -> Option<bool> {
        match self { Value::Bool(b) => Some(*b), _ => None }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self { Value::Int(i) => Some(*i), _ => None }
    }

    /// Floats, and ints widened to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f.0),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self { Value::Str(s) => Some(s), _ => None }
    }

    pub fn as_path(&self) -> Option<&std::path::Path> {
        match self { Value::Path(p) => Some(p), _ => None }
    }

    /// Items of a list or a tuple.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumMember> {
        match self { Value::Enum(m) => Some(m), _ => None }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self { Value::Instance(inst) => Some(inst), _ => None }
    }

    pub fn dict_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Int(i) }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self { Value::Float(OrderedFloat(f)) }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.to_string()) }
}
impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(s) }
}
impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self { Value::Path(p) }
}
impl From<EnumMember> for Value {
    fn from(m: EnumMember) -> Self { Value::Enum(m) }
}
impl From<Instance> for Value {
    fn from(inst: Instance) -> Self { Value::Instance(Box::new(inst)) }
}
impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self { Value::List(items) }
}
