//! Normalized type descriptors.
//!
//! A `Ty` is the resolved shape of one field: what the converter accepts and
//! what kind of flag the CLI synthesizer generates for it. Descriptors are
//! built once at declaration time, either directly with the constructors
//! below or from annotation text via [`annotation::parse`], and never hold
//! unresolved names.
pub mod annotation;

use std::fmt;

use crate::enums::EnumType;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    Int,
    Float,
    Str,
    Bool,
    Path,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Prim(Prim),
    Any,
    Optional(Box<Ty>),
    List(Box<Ty>),
    Dict(Box<Ty>, Box<Ty>),
    Tuple(Vec<Ty>),          // exact arity
    Union(Vec<Ty>),          // ordered; first match wins
    Enum(EnumType),
    Nested(Schema),
    Registry(Registry),      // variant picked by the `type` key
}

impl Ty {
    pub const INT: Ty = Ty::Prim(Prim::Int);
    pub const FLOAT: Ty = Ty::Prim(Prim::Float);
    pub const STR: Ty = Ty::Prim(Prim::Str);
    pub const BOOL: Ty = Ty::Prim(Prim::Bool);
    pub const PATH: Ty = Ty::Prim(Prim::Path);

    pub fn optional(inner: Ty) -> Ty {
        match inner {
            // Optional[Optional[T]] is just Optional[T]
            Ty::Optional(_) => inner,
            other => Ty::Optional(Box::new(other)),
        }
    }
    pub fn list(inner: Ty) -> Ty { Ty::List(Box::new(inner)) }
    pub fn dict(key: Ty, value: Ty) -> Ty { Ty::Dict(Box::new(key), Box::new(value)) }
    pub fn tuple(items: Vec<Ty>) -> Ty { Ty::Tuple(items) }
    pub fn enumeration(ty: &EnumType) -> Ty { Ty::Enum(ty.clone()) }
    pub fn nested(schema: &Schema) -> Ty { Ty::Nested(schema.clone()) }
    pub fn registry(registry: &Registry) -> Ty { Ty::Registry(registry.clone()) }

    /// Build a union, flattening nested unions and lifting optional arms
    /// into a single outer `Optional`. A union with no arm besides `None`
    /// has no values and is refused.
    pub fn union(arms: Vec<Ty>) -> Result<Ty> {
        simplify_union(arms, false).ok_or_else(|| Error::unsupported("Union[None]", "a union needs at least one type besides `None`"))
    }

    /// The structural rules annotation parsing enforces, for descriptors
    /// assembled by hand: dict keys must be hashable, unions need two or
    /// more flat arms, tuples need an item type, `Optional` does not nest.
    pub fn check(&self) -> Result<()> {
        let bad = |reason: &str| -> Result<()> { Err(Error::unsupported(self.to_string(), reason)) };
        match self {
            Ty::Prim(_) | Ty::Any | Ty::Enum(_) | Ty::Nested(_) | Ty::Registry(_) => Ok(()),
            Ty::Optional(inner) if inner.is_optional() => bad("`Optional` cannot wrap another `Optional`"),
            Ty::Optional(inner) | Ty::List(inner) => inner.check(),
            Ty::Dict(key, _) if !key.is_hashable() => bad("dict keys must be a primitive or an enum"),
            Ty::Dict(key, value) => {
                key.check()?;
                value.check()
            }
            Ty::Tuple(items) if items.is_empty() => bad("a tuple needs at least one item type"),
            Ty::Union(arms) if arms.len() < 2 => bad("a union needs at least two distinct types"),
            Ty::Union(arms) if arms.iter().any(|a| matches!(a, Ty::Optional(_) | Ty::Union(_))) => {
                bad("union arms must be flat; build it with `Ty::union` to lift `None`")
            }
            Ty::Tuple(items) | Ty::Union(items) => items.iter().try_for_each(Ty::check),
        }
    }

    /// Primitive or enum, possibly behind `Optional`.
    pub fn is_leaf(&self) -> bool {
        matches!(self.strip_optional(), Ty::Prim(_) | Ty::Enum(_))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Ty::Optional(_))
    }

    pub fn strip_optional(&self) -> &Ty {
        match self {
            Ty::Optional(inner) => inner,
            other => other,
        }
    }

    /// Types that can key a `Dict`: their values have a faithful string form.
    pub fn is_hashable(&self) -> bool {
        matches!(self, Ty::Prim(_) | Ty::Enum(_))
    }
}

/// Collapse the arms of a union: `X ∪ None → Optional(X)`.
///
/// Returns `None` when nothing but `None` was given.
pub(crate) fn simplify_union(arms: Vec<Ty>, mut had_null: bool) -> Option<Ty> {
    let mut flat: Vec<Ty> = Vec::with_capacity(arms.len());
    let mut stack: Vec<Ty> = arms.into_iter().rev().collect();
    while let Some(arm) = stack.pop() {
        match arm {
            Ty::Optional(inner) => {
                had_null = true;
                stack.push(*inner);
            }
            Ty::Union(inner) => stack.extend(inner.into_iter().rev()),
            other => {
                if !flat.contains(&other) {
                    flat.push(other);
                }
            }
        }
    }

    let core = match flat.len() {
        0 => return None,
        1 => flat.remove(0),
        _ => Ty::Union(flat),
    };

    Some(if had_null { Ty::Optional(Box::new(core)) } else { core })
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Prim::Int => "int",
            Prim::Float => "float",
            Prim::Str => "str",
            Prim::Bool => "bool",
            Prim::Path => "Path",
        })
    }
}

/// Prints the annotation spelling, which [`annotation::parse`] accepts back.
impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, tys: &[Ty]) -> fmt::Result {
            for (i, ty) in tys.iter().enumerate() {
                if i > 0 { f.write_str(", ")?; }
                write!(f, "{ty}")?;
            }
            Ok(())
        }
        match self {
            Ty::Prim(p) => write!(f, "{p}"),
            Ty::Any => f.write_str("Any"),
            Ty::Optional(inner) => write!(f, "Optional[{inner}]"),
            Ty::List(inner) => write!(f, "List[{inner}]"),
            Ty::Dict(k, v) => write!(f, "Dict[{k}, {v}]"),
            Ty::Tuple(items) => {
                f.write_str("Tuple[")?;
                join(f, items)?;
                f.write_str("]")
            }
            Ty::Union(arms) => {
                f.write_str("Union[")?;
                join(f, arms)?;
                f.write_str("]")
            }
            Ty::Enum(e) => f.write_str(e.name()),
            Ty::Nested(s) => f.write_str(s.name()),
            Ty::Registry(r) => write!(f, "RegistryConfig[{}]", r.name()),
        }
    }
}
