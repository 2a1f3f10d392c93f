//! Schema declarations.
//!
//! A [`SchemaDecl`] lists fields with either an explicit [`Ty`] or annotation
//! text. Declaring it through a [`Namespace`](crate::registry::Namespace)
//! resolves every field type and checks every default up front, so a schema
//! that exists is a schema that can bind.
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as Json;

use crate::binder::{Arg, Binder};
use crate::error::{Error, Result};
use crate::flags::Cli;
use crate::instance::Instance;
use crate::registry::Namespace;
use crate::ty::Ty;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Names that field and type names cannot take: `_meta` and `_base_` are
/// reserved keys in config files, the rest are annotation keywords.
const RESERVED: &[&str] = &[
    "_meta", "_base_", "_delete_", "int", "float", "str", "bool", "Path", "Any", "None",
    "Optional", "Union", "List", "Dict", "Tuple", "list", "dict", "tuple", "RegistryConfig",
];

pub(crate) fn check_name(name: &str) -> Result<()> {
    if !IDENTIFIER.is_match(name) || RESERVED.contains(&name) {
        return Err(Error::InvalidName { name: name.to_string() });
    }
    Ok(())
}

/// Runs after every field has been bound.
pub type Validator = Arc<dyn Fn(&Instance) -> std::result::Result<(), String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
    /// Plain mapping data, converted each time the default is used.
    pub default: Option<Json>,
    pub help: Option<String>,
}

impl Field {
    pub fn required(&self) -> bool { self.default.is_none() }
}

/// Shared handle to a declared schema. Equality is identity.
#[derive(Clone)]
pub struct Schema(Arc<SchemaDef>);

struct SchemaDef {
    name: String,
    fields: IndexMap<String, Field>,
    validators: Vec<Validator>,
}

impl Schema {
    pub fn name(&self) -> &str { &self.0.name }

    pub fn fields(&self) -> impl Iterator<Item = &Field> { self.0.fields.values() }

    pub fn field(&self, name: &str) -> Option<&Field> { self.0.fields.get(name) }

    pub fn len(&self) -> usize { self.0.fields.len() }

    pub fn is_empty(&self) -> bool { self.0.fields.is_empty() }

    pub(crate) fn validators(&self) -> &[Validator] { &self.0.validators }

    /// Bind mapping data with the default (fail-closed) binder.
    pub fn fromdict(&self, plain: &Json) -> Result<Instance> {
        Binder::new().bind(self, plain)
    }

    /// Load a JSON/YAML file (with `_base_` inheritance) and bind it.
    pub fn fromfile(&self, path: impl AsRef<Path>) -> Result<Instance> {
        let plain = crate::loader::load(path)?;
        self.fromdict(&plain)
    }

    /// Parse `argv` (program name first) as `CONFIG [--field.path VALUE]...`.
    pub fn fromcli<I, T>(&self, argv: I) -> Result<Instance>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::new(self).parse(argv)
    }

    /// [`fromcli`](Self::fromcli) that hands back the arguments it does not
    /// recognize instead of rejecting them.
    pub fn fromcli_with_rest<I, T>(&self, argv: I) -> Result<(Instance, Vec<OsString>)>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::new(self).parse_with_rest(argv)
    }

    /// Direct construction: positional arguments fill fields in declared order,
    /// keyword arguments by name.
    pub fn construct<P, K>(&self, positional: P, keyword: K) -> Result<Instance>
    where
        P: IntoIterator<Item = Arg>,
        K: IntoIterator<Item = (String, Arg)>,
    {
        Binder::new().construct(self, positional, keyword)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}
impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema({})", self.name())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATION
// ————————————————————————————————————————————————————————————————————————————

/// How a field's type was written down.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    Annotation(String),
    Ty(Ty),
}

impl From<&str> for TypeSpec {
    fn from(s: &str) -> Self { TypeSpec::Annotation(s.to_string()) }
}
impl From<String> for TypeSpec {
    fn from(s: String) -> Self { TypeSpec::Annotation(s) }
}
impl From<Ty> for TypeSpec {
    fn from(ty: Ty) -> Self { TypeSpec::Ty(ty) }
}

struct FieldDecl {
    name: String,
    ty: TypeSpec,
    default: Option<Json>,
    help: Option<String>,
}

pub struct SchemaDecl {
    name: String,
    fields: Vec<FieldDecl>,
    validators: Vec<Validator>,
}

impl SchemaDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new(), validators: Vec::new() }
    }

    pub fn name(&self) -> &str { &self.name }

    /// A required field.
    pub fn field(mut self, name: impl Into<String>, ty: impl Into<TypeSpec>) -> Self {
        self.fields.push(FieldDecl { name: name.into(), ty: ty.into(), default: None, help: None });
        self
    }

    /// A field that falls back to `default` when the key is absent.
    pub fn field_default(
        mut self,
        name: impl Into<String>,
        ty: impl Into<TypeSpec>,
        default: impl Into<Json>,
    ) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty: ty.into(),
            default: Some(default.into()),
            help: None,
        });
        self
    }

    /// Help text for the most recently declared field.
    pub fn help(mut self, text: impl Into<String>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.help = Some(text.into());
        }
        self
    }

    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Instance) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(f));
        self
    }

    pub(crate) fn resolve(self, ns: &Namespace) -> Result<Schema> {
        check_name(&self.name)?;

        let mut fields = IndexMap::with_capacity(self.fields.len());
        for decl in self.fields {
            check_name(&decl.name)?;
            if fields.contains_key(&decl.name) {
                return Err(Error::DuplicateField { schema: self.name.clone(), field: decl.name });
            }
            let ty = match decl.ty {
                TypeSpec::Ty(ty) => ty,
                TypeSpec::Annotation(text) => ns.resolve(&text)?,
            };
            ty.check()?;
            if let Some(default) = &decl.default {
                Binder::new().convert(default, &ty).map_err(|e| Error::InvalidDefault {
                    schema: self.name.clone(),
                    field: decl.name.clone(),
                    source: Box::new(e),
                })?;
            }
            fields.insert(decl.name.clone(), Field { name: decl.name, ty, default: decl.default, help: decl.help });
        }

        Ok(Schema(Arc::new(SchemaDef { name: self.name, fields, validators: self.validators })))
    }
}
