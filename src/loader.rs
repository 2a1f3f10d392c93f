//! JSON/YAML config files with `_base_` inheritance.
//!
//! A file may name one or more base files under `_base_`, relative to its own
//! directory. Bases merge in listed order, then the file's own content is
//! merged on top (see [`plain::merge`](crate::plain::merge)). Every file is
//! keyed by its canonical path: the chain of files currently being loaded is
//! checked for cycles, and finished files are cached so a shared ancestor is
//! read once.
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::plain;

pub const BASE_KEY: &str = "_base_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Ok(Format::Json),
            Some("yml" | "yaml") => Ok(Format::Yaml),
            _ => Err(Error::UnsupportedFormat { path: path.to_path_buf() }),
        }
    }
}

/// Load a config file and everything it inherits from.
pub fn load(path: impl AsRef<Path>) -> Result<Json> {
    Loader::default().load(path.as_ref())
}

/// Parse one document without resolving `_base_`.
pub fn parse_str(source: &str, format: Format, path: &Path) -> Result<Json> {
    if source.trim().is_empty() {
        return Ok(Json::Object(Map::new()));
    }
    let value = match format {
        Format::Json => serde_json::from_str::<Json>(source)
            .map_err(|source| Error::Json { path: path.to_path_buf(), source })?,
        Format::Yaml => serde_yaml::from_str::<Json>(source)
            .map_err(|source| Error::Yaml { path: path.to_path_buf(), source })?,
    };
    match value {
        // a YAML document with nothing but comments
        Json::Null => Ok(Json::Object(Map::new())),
        Json::Object(_) => Ok(value),
        _ => Err(Error::NotAMapping { path: path.to_path_buf() }),
    }
}

/// Serialize mapping data, picking JSON or YAML from the extension.
pub fn save(path: impl AsRef<Path>, plain: &Json) -> Result<()> {
    let path = path.as_ref();
    let text = to_string(plain, Format::from_path(path)?, path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Io { path: parent.to_path_buf(), source })?;
    }
    fs::write(path, text).map_err(|source| Error::Io { path: path.to_path_buf(), source })
}

pub fn to_string(plain: &Json, format: Format, path: &Path) -> Result<String> {
    match format {
        Format::Json => serde_json::to_string_pretty(plain)
            .map(|mut s| { s.push('\n'); s })
            .map_err(|source| Error::Json { path: path.to_path_buf(), source }),
        Format::Yaml => serde_yaml::to_string(plain)
            .map_err(|source| Error::Yaml { path: path.to_path_buf(), source }),
    }
}

#[derive(Default)]
pub struct Loader {
    /// Files being loaded right now, outermost first.
    chain: Vec<PathBuf>,
    /// Fully resolved files.
    loaded: IndexMap<PathBuf, Json>,
}

impl Loader {
    pub fn load(&mut self, path: &Path) -> Result<Json> {
        let canonical = fs::canonicalize(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;

        if let Some(done) = self.loaded.get(&canonical) {
            return Ok(done.clone());
        }
        if let Some(start) = self.chain.iter().position(|p| *p == canonical) {
            let mut chain = self.chain[start..].to_vec();
            chain.push(canonical);
            return Err(Error::CyclicInheritance { chain });
        }

        self.chain.push(canonical.clone());
        let out = self.load_uncached(&canonical);
        self.chain.pop();

        let out = out?;
        self.loaded.insert(canonical, out.clone());
        Ok(out)
    }

    fn load_uncached(&mut self, path: &Path) -> Result<Json> {
        debug!(path = %path.display(), "loading config");
        let source = fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        let mut own = parse_str(&source, Format::from_path(path)?, path)?;

        let bases = match own.as_object_mut().and_then(|m| m.shift_remove(BASE_KEY)) {
            None => return Ok(plain::strip_delete(own)),
            Some(Json::String(one)) => vec![one],
            Some(Json::Array(many)) => many
                .into_iter()
                .map(|v| match v {
                    Json::String(s) => Ok(s),
                    _ => Err(Error::InvalidBase { path: path.to_path_buf() }),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(Error::InvalidBase { path: path.to_path_buf() }),
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut merged = Json::Object(Map::new());
        for base in bases {
            let base_path = dir.join(&base);
            debug!(path = %path.display(), base = %base_path.display(), "inheriting");
            plain::merge(&mut merged, self.load(&base_path)?);
        }
        plain::merge(&mut merged, own);
        Ok(merged)
    }
}
