//! Enumerations matched by value.
//!
//! Each enum carries a `{value → member}` table built when it is declared,
//! so conversion is a single lookup.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{Error, Result};

#[derive(Clone)]
pub struct EnumType(Arc<EnumDef>);

struct EnumDef {
    name: String,
    members: Vec<(String, Json)>,
    by_value: IndexMap<String, usize>,
}

/// One member of an [`EnumType`].
#[derive(Clone)]
pub struct EnumMember {
    ty: EnumType,
    index: usize,
}

impl EnumType {
    /// Member values must be strings or integers, distinct by value and name.
    pub fn new<N, K, V, I>(name: N, members: I) -> Result<Self>
    where
        N: Into<String>,
        K: Into<String>,
        V: Into<Json>,
        I: IntoIterator<Item = (K, V)>,
    {
        let name = name.into();
        let invalid = |reason: String| Error::InvalidEnum { name: name.clone(), reason };

        let mut def = EnumDef { name: name.clone(), members: Vec::new(), by_value: IndexMap::new() };
        for (member, value) in members {
            let member = member.into();
            let value = value.into();
            let scalar = value.is_string() || value.is_i64() || value.is_u64();
            if !scalar {
                return Err(invalid(format!("member `{member}` has value {value}; expected a string or an integer")));
            }
            if def.members.iter().any(|(m, _)| *m == member) {
                return Err(invalid(format!("member `{member}` is declared twice")));
            }
            let key = value_key(&value);
            if def.by_value.contains_key(&key) {
                return Err(invalid(format!("value {value} is shared by two members")));
            }
            def.by_value.insert(key, def.members.len());
            def.members.push((member, value));
        }
        if def.members.is_empty() {
            return Err(invalid("an enum needs at least one member".into()));
        }
        Ok(EnumType(Arc::new(def)))
    }

    pub fn name(&self) -> &str { &self.0.name }

    pub fn len(&self) -> usize { self.0.members.len() }

    pub fn is_empty(&self) -> bool { self.0.members.is_empty() }

    pub fn members(&self) -> impl Iterator<Item = EnumMember> + '_ {
        (0..self.len()).map(|index| EnumMember { ty: self.clone(), index })
    }

    /// Look a member up by name (not by value).
    pub fn member(&self, name: &str) -> Option<EnumMember> {
        self.0.members.iter()
            .position(|(m, _)| m == name)
            .map(|index| EnumMember { ty: self.clone(), index })
    }

    /// Look a member up by its underlying value.
    ///
    /// Text also selects an integer-valued member whose value prints the same,
    /// which is how values typed on a command line reach integer enums.
    pub fn from_value(&self, value: &Json) -> Option<EnumMember> {
        let index = self.0.by_value.get(&value_key(value)).copied().or_else(|| {
            let text = value.as_str()?.trim();
            self.0.members.iter().position(|(_, v)| v.is_number() && v.to_string() == text)
        })?;
        Some(EnumMember { ty: self.clone(), index })
    }

    /// Underlying values rendered for help text and error messages.
    pub fn choices(&self) -> Vec<String> {
        self.0.members.iter()
            .map(|(_, v)| match v {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

// JSON text keeps `1` and `"1"` apart; integral floats key as integers.
fn value_key(value: &Json) -> String {
    match value {
        Json::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => (f as i64).to_string(),
            _ => value.to_string(),
        },
        _ => value.to_string(),
    }
}

impl EnumMember {
    pub fn name(&self) -> &str { &self.ty.0.members[self.index].0 }

    pub fn value(&self) -> &Json { &self.ty.0.members[self.index].1 }

    pub fn enum_type(&self) -> &EnumType { &self.ty }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}
impl Eq for EnumType {}

impl PartialEq for EnumMember {
    fn eq(&self, other: &Self) -> bool { self.ty == other.ty && self.index == other.index }
}
impl Eq for EnumMember {}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Enum({})", self.name())
    }
}

impl fmt::Debug for EnumMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.ty.name(), self.name())
    }
}
