//! Declared schemas, enums and registries.
//!
//! A [`Namespace`] is where annotation text finds the names it refers to.
//! Schemas can only refer to names declared before them, which keeps the
//! schema graph acyclic. The process-wide namespace behind [`declare`] and
//! friends is written while schemas are declared and only read afterwards.
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::Value as Json;

use crate::enums::EnumType;
use crate::error::{Error, Result};
use crate::schema::{check_name, Schema, SchemaDecl};
use crate::ty::{annotation, Ty};

/// Key of a registry mapping that names the variant to bind.
pub const TYPE_KEY: &str = "type";

/// Named alternatives for one field, picked by the data itself:
/// `{"type": "resnet", "depth": 50}` binds the `resnet` variant's schema.
/// Equality is identity.
#[derive(Clone)]
pub struct Registry(Arc<RegistryDef>);

struct RegistryDef {
    name: String,
    variants: IndexMap<String, Schema>,
}

impl Registry {
    pub fn new<N, K, I>(name: N, variants: I) -> Result<Self>
    where
        N: Into<String>,
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        let name = name.into();
        let invalid = |reason: String| Error::InvalidRegistry { name: name.clone(), reason };

        let mut table = IndexMap::new();
        for (variant, schema) in variants {
            let variant = variant.into();
            if variant.is_empty() {
                return Err(invalid("variant names cannot be empty".into()));
            }
            if schema.field(TYPE_KEY).is_some() {
                return Err(invalid(format!("{} declares a `{TYPE_KEY}` field, which selects the variant", schema.name())));
            }
            if table.insert(variant.clone(), schema).is_some() {
                return Err(invalid(format!("variant `{variant}` is registered twice")));
            }
        }
        if table.is_empty() {
            return Err(invalid("a registry needs at least one variant".into()));
        }
        Ok(Registry(Arc::new(RegistryDef { name, variants: table })))
    }

    pub fn name(&self) -> &str { &self.0.name }

    pub fn get(&self, variant: &str) -> Option<&Schema> { self.0.variants.get(variant) }

    pub fn variants(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.0.variants.iter().map(|(k, s)| (k.as_str(), s))
    }

    /// First variant name registered for `schema`.
    pub fn name_of(&self, schema: &Schema) -> Option<&str> {
        self.variants().find(|(_, s)| *s == schema).map(|(k, _)| k)
    }

    pub fn choices(&self) -> Vec<&str> { self.0.variants.keys().map(String::as_str).collect() }
}

impl PartialEq for Registry {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}
impl Eq for Registry {}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registry({}: {})", self.name(), self.choices().join(", "))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Namespace {
    schemas: IndexMap<String, Schema>,
    enums: IndexMap<String, EnumType>,
    registries: IndexMap<String, Registry>,
}

impl Namespace {
    pub fn new() -> Self { Self::default() }

    pub fn declare_enum<N, K, V, I>(&mut self, name: N, members: I) -> Result<EnumType>
    where
        N: Into<String>,
        K: Into<String>,
        V: Into<Json>,
        I: IntoIterator<Item = (K, V)>,
    {
        let e = EnumType::new(name, members)?;
        self.claim(e.name())?;
        self.enums.insert(e.name().to_string(), e.clone());
        Ok(e)
    }

    /// Register an enum built elsewhere, e.g. one shared by several namespaces.
    pub fn add_enum(&mut self, e: &EnumType) -> Result<()> {
        self.claim(e.name())?;
        self.enums.insert(e.name().to_string(), e.clone());
        Ok(())
    }

    /// Resolve every field of `decl` and register the schema under its name.
    pub fn declare(&mut self, decl: SchemaDecl) -> Result<Schema> {
        self.claim(decl.name())?;
        let schema = decl.resolve(self)?;
        self.schemas.insert(schema.name().to_string(), schema.clone());
        Ok(schema)
    }

    /// Register a schema built elsewhere.
    pub fn add_schema(&mut self, schema: &Schema) -> Result<()> {
        self.claim(schema.name())?;
        self.schemas.insert(schema.name().to_string(), schema.clone());
        Ok(())
    }

    /// Group already declared schemas under variant names, e.g.
    /// `declare_registry("Backbone", [("resnet", "ResNet"), ("vit", "ViT")])`.
    pub fn declare_registry<N, K, S, I>(&mut self, name: N, variants: I) -> Result<Registry>
    where
        N: Into<String>,
        K: Into<String>,
        S: AsRef<str>,
        I: IntoIterator<Item = (K, S)>,
    {
        let name = name.into();
        self.claim(&name)?;
        let variants = variants
            .into_iter()
            .map(|(variant, schema)| {
                let schema = schema.as_ref();
                match self.schemas.get(schema) {
                    Some(s) => Ok((variant, s.clone())),
                    None => Err(Error::UnknownSchema { name: schema.to_string() }),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let registry = Registry::new(name, variants)?;
        self.registries.insert(registry.name().to_string(), registry.clone());
        Ok(registry)
    }

    /// Register a registry built elsewhere.
    pub fn add_registry(&mut self, registry: &Registry) -> Result<()> {
        self.claim(registry.name())?;
        self.registries.insert(registry.name().to_string(), registry.clone());
        Ok(())
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> { self.schemas.get(name) }

    pub fn registry(&self, name: &str) -> Option<&Registry> { self.registries.get(name) }

    pub fn registries(&self) -> impl Iterator<Item = &Registry> { self.registries.values() }

    pub fn enumeration(&self, name: &str) -> Option<&EnumType> { self.enums.get(name) }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> { self.schemas.values() }

    pub fn enums(&self) -> impl Iterator<Item = &EnumType> { self.enums.values() }

    pub fn resolve(&self, annotation: &str) -> Result<Ty> {
        annotation::parse(annotation, self)
    }

    fn claim(&self, name: &str) -> Result<()> {
        check_name(name)?;
        if self.schemas.contains_key(name) || self.enums.contains_key(name) || self.registries.contains_key(name) {
            return Err(Error::DuplicateDeclaration { name: name.to_string() });
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PROCESS-WIDE REGISTRY
// ————————————————————————————————————————————————————————————————————————————

static GLOBAL: Lazy<RwLock<Namespace>> = Lazy::new(|| RwLock::new(Namespace::new()));

pub fn declare(decl: SchemaDecl) -> Result<Schema> {
    GLOBAL.write().unwrap_or_else(PoisonError::into_inner).declare(decl)
}

pub fn declare_enum<N, K, V, I>(name: N, members: I) -> Result<EnumType>
where
    N: Into<String>,
    K: Into<String>,
    V: Into<Json>,
    I: IntoIterator<Item = (K, V)>,
{
    GLOBAL.write().unwrap_or_else(PoisonError::into_inner).declare_enum(name, members)
}

pub fn declare_registry<N, K, S, I>(name: N, variants: I) -> Result<Registry>
where
    N: Into<String>,
    K: Into<String>,
    S: AsRef<str>,
    I: IntoIterator<Item = (K, S)>,
{
    GLOBAL.write().unwrap_or_else(PoisonError::into_inner).declare_registry(name, variants)
}

pub fn lookup_registry(name: &str) -> Option<Registry> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner).registry(name).cloned()
}

pub fn lookup_schema(name: &str) -> Option<Schema> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner).schema(name).cloned()
}

pub fn lookup_enum(name: &str) -> Option<EnumType> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner).enumeration(name).cloned()
}

pub fn resolve(annotation: &str) -> Result<Ty> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner).resolve(annotation)
}
