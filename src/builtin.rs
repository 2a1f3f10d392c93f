//! Schemas shipped with the crate.
use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::Result;
use crate::registry::Namespace;
use crate::schema::{Schema, SchemaDecl};
use crate::typed::ConfigClass;

static RUNTIME: Lazy<Schema> =
    Lazy::new(|| declare_runtime(&mut Namespace::new()).expect("built-in RuntimeConfig is well-formed"));

fn declare_runtime(ns: &mut Namespace) -> Result<Schema> {
    ns.declare(
        SchemaDecl::new("RuntimeConfig")
            .field_default("seed", "int", 42)
            .help("random seed")
            .field_default("output_dir", "Optional[Path]", Json::Null)
            .help("where run artifacts go")
            .field_default("checkpoint_dir", "Optional[Path]", Json::Null)
            .field_default("tb_log_dir", "Optional[Path]", Json::Null)
            .help("tensorboard log directory")
            .field_default("debug", "bool", false)
            .field_default("use_cuda", "bool", true),
    )
}

/// The shared `RuntimeConfig` schema: seed, output locations, debug and
/// device switches.
pub fn runtime_config() -> &'static Schema { &RUNTIME }

/// Namespace pre-populated with the built-in schemas.
pub fn namespace() -> Result<Namespace> {
    let mut ns = Namespace::new();
    ns.add_schema(runtime_config())?;
    Ok(ns)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub seed: i64,
    pub output_dir: Option<PathBuf>,
    pub checkpoint_dir: Option<PathBuf>,
    pub tb_log_dir: Option<PathBuf>,
    pub debug: bool,
    pub use_cuda: bool,
}

impl ConfigClass for RuntimeConfig {
    fn schema() -> &'static Schema { runtime_config() }
}
