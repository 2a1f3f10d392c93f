//! Helpers over untyped mapping data (`serde_json::Value`).
use serde_json::{Map, Value as Json};

/// Key that makes an overlay mapping replace its base instead of merging.
pub const DELETE_KEY: &str = "_delete_";

/// One step of a path into mapping data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Key(String),
    Index(usize),
}

/// Merge `overlay` into `base`: mappings merge key by key, recursively;
/// anything else (lists included) replaces the base value.
pub fn merge(base: &mut Json, overlay: Json) {
    match (base, overlay) {
        (Json::Object(base_map), Json::Object(mut overlay_map)) => {
            let replace = overlay_map
                .shift_remove(DELETE_KEY)
                .is_some_and(|v| v == Json::Bool(true));
            if replace {
                *base_map = overlay_map;
                return;
            }
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base_map.insert(key, strip_delete(value));
                    }
                }
            }
        }
        (slot, overlay) => *slot = strip_delete(overlay),
    }
}

/// `_delete_` only means something while merging; never leak it into the result.
pub(crate) fn strip_delete(mut value: Json) -> Json {
    match &mut value {
        Json::Object(map) => {
            map.shift_remove(DELETE_KEY);
            for v in map.values_mut() {
                let taken = std::mem::take(v);
                *v = strip_delete(taken);
            }
        }
        Json::Array(items) => {
            for v in items.iter_mut() {
                let taken = std::mem::take(v);
                *v = strip_delete(taken);
            }
        }
        _ => {}
    }
    value
}

/// Write `value` at `path`, creating (or replacing non-mapping values with)
/// intermediate mappings for key steps. Index steps must land inside an
/// existing list.
pub fn set_path(root: &mut Json, path: &[Step], value: Json) -> Result<(), String> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };
    let mut cur = root;
    for step in parents {
        cur = descend_mut(cur, step)?;
    }
    match last {
        Step::Key(key) => {
            object_mut(cur).insert(key.clone(), value);
        }
        Step::Index(i) => {
            let slot = index_mut(cur, *i)?;
            *slot = value;
        }
    }
    Ok(())
}

pub fn get_path<'a>(root: &'a Json, path: &[Step]) -> Option<&'a Json> {
    path.iter().try_fold(root, |cur, step| match step {
        Step::Key(key) => cur.as_object()?.get(key),
        Step::Index(i) => cur.as_array()?.get(*i),
    })
}

fn descend_mut<'a>(cur: &'a mut Json, step: &Step) -> Result<&'a mut Json, String> {
    match step {
        Step::Key(key) => Ok(object_mut(cur).entry(key.clone()).or_insert(Json::Null)),
        Step::Index(i) => index_mut(cur, *i),
    }
}

fn object_mut(cur: &mut Json) -> &mut Map<String, Json> {
    if !cur.is_object() {
        *cur = Json::Object(Map::new());
    }
    match cur {
        Json::Object(map) => map,
        _ => unreachable!("just replaced with a mapping"),
    }
}

fn index_mut(cur: &mut Json, i: usize) -> Result<&mut Json, String> {
    match cur {
        Json::Array(items) => {
            let len = items.len();
            items.get_mut(i).ok_or_else(|| format!("index {i} is out of range for a list of length {len}"))
        }
        other => Err(format!("cannot index into {}", describe(other))),
    }
}

/// Short human description of a plain value for error messages.
pub fn describe(plain: &Json) -> String {
    const MAX: usize = 48;
    let kind = match plain {
        Json::Null => return "null".into(),
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_f64() => "float",
        Json::Number(_) => "int",
        Json::String(_) => "string",
        Json::Array(items) => return format!("a list of {} item(s)", items.len()),
        Json::Object(map) => return format!("a mapping with {} key(s)", map.len()),
    };
    let mut text = plain.to_string();
    if text.chars().count() > MAX {
        text = text.chars().take(MAX).collect::<String>() + "…";
    }
    format!("{kind} {text}")
}
