//! Bound schema instances.
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};
use crate::registry::TYPE_KEY;
use crate::schema::Schema;
use crate::value::Value;

/// One value per declared field, in declaration order.
///
/// Instances only come out of the binder. [`Instance::set`] replaces a value
/// without re-validating it against the field's type.
#[derive(Clone, PartialEq, Eq)]
pub struct Instance {
    schema: Schema,
    values: IndexMap<String, Value>,
    extra: IndexMap<String, Json>,
    meta: Option<Json>,
    /// Registry variant this instance was bound as.
    tag: Option<String>,
}

impl Instance {
    pub(crate) fn new(
        schema: Schema,
        values: IndexMap<String, Value>,
        extra: IndexMap<String, Json>,
        meta: Option<Json>,
    ) -> Self {
        Self { schema, values, extra, meta, tag: None }
    }

    pub(crate) fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn schema(&self) -> &Schema { &self.schema }

    pub fn get(&self, field: &str) -> Option<&Value> { self.values.get(field) }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Follow a dotted path through nested instances, lists, tuples and dicts,
    /// e.g. `optimizer.learning_rate` or `milestones.1`.
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let mut cur = self.values.get(parts.next()?)?;
        for part in parts {
            cur = match cur {
                Value::Instance(inst) => inst.values.get(part)?,
                Value::List(items) | Value::Tuple(items) => items.get(part.parse::<usize>().ok()?)?,
                Value::Dict(entries) => entries.iter().find(|(k, _)| k.key_string() == part).map(|(_, v)| v)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Replace a field's value and return the old one.
    ///
    /// The new value is not checked against the field's type.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<Value> {
        match self.values.get_mut(field) {
            Some(slot) => Ok(std::mem::replace(slot, value.into())),
            None => Err(Error::UnknownField {
                schema: self.schema.name().to_string(),
                fields: vec![field.to_string()],
                path: "<root>".into(),
            }),
        }
    }

    /// Keys kept because the binder allowed unknown fields.
    pub fn extra(&self) -> &IndexMap<String, Json> { &self.extra }

    /// The `_meta` block of the source mapping, if any.
    pub fn meta(&self) -> Option<&Json> { self.meta.as_ref() }

    /// The variant name when bound through a registry field.
    pub fn tag(&self) -> Option<&str> { self.tag.as_deref() }

    /// Plain mapping data: the registry `type` (if any), declared fields in
    /// order, then passthrough keys.
    pub fn asdict(&self) -> Json {
        let mut map = Map::with_capacity(self.values.len() + self.extra.len() + 1);
        if let Some(tag) = &self.tag {
            map.insert(TYPE_KEY.to_string(), Json::String(tag.clone()));
        }
        for (name, value) in &self.values {
            map.insert(name.clone(), value.to_plain());
        }
        for (name, value) in &self.extra {
            map.insert(name.clone(), value.clone());
        }
        Json::Object(map)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.schema.name());
        if let Some(tag) = &self.tag {
            s.field(TYPE_KEY, tag);
        }
        for (name, value) in &self.values {
            s.field(name, value);
        }
        if !self.extra.is_empty() {
            s.field("..", &self.extra);
        }
        s.finish()
    }
}
