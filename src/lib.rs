//! Typed configuration binding.
//!
//! Declare a [`Schema`] (fields with types and defaults), then bind JSON or
//! YAML files, mapping data or command-line arguments into an [`Instance`]
//! whose values have been converted to the declared types.
//!
//! ```ignore
//! let mut ns = Namespace::new();
//! ns.declare_enum("OptType", [("sgd", "sgd"), ("adam", "adam")])?;
//! let optimizer = ns.declare(
//!     SchemaDecl::new("Optimizer")
//!         .field("opt_type", "OptType")
//!         .field_default("learning_rate", "float", 0.1),
//! )?;
//! let opt = optimizer.fromfile("exp/opt.yml")?;
//! ```
pub mod binder;
pub mod builtin;
pub mod document;
pub mod enums;
pub mod error;
pub mod flags;
pub mod instance;
pub mod loader;
pub mod plain;
pub mod registry;
pub mod schema;
pub mod ty;
pub mod typed;
pub mod value;

mod convert;

pub use binder::{Arg, Binder, META_KEY};
pub use builtin::RuntimeConfig;
pub use document::{FieldSpec, SchemaDocument};
pub use enums::{EnumMember, EnumType};
pub use error::{ConversionError, Error, Result};
pub use flags::{Cli, Flag, FlagKind, FlagSet};
pub use instance::Instance;
pub use loader::{load, save, BASE_KEY};
pub use plain::DELETE_KEY;
pub use registry::{Namespace, Registry, TYPE_KEY};
pub use schema::{Field, Schema, SchemaDecl, TypeSpec};
pub use ty::{Prim, Ty};
pub use typed::ConfigClass;
pub use value::Value;
