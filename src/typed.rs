//! Bound instances as ordinary `serde` structs.
//!
//! The schema stays the source of truth for conversion and validation; the
//! struct only mirrors it. Binding goes plain → [`Instance`] → plain →
//! `T`, so a struct that disagrees with its schema fails with the JSON path
//! of the first mismatch instead of a bare serde message.
use std::ffi::OsString;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::schema::Schema;

/// Deserialize with JSON-path context in error messages.
pub fn from_plain_with_path<T: DeserializeOwned>(plain: Json) -> Result<T> {
    serde_path_to_error::deserialize::<_, T>(plain).map_err(|err| Error::Deserialize {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

/// A Rust type backed by a [`Schema`].
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Optimizer { opt_type: String, learning_rate: f64 }
///
/// impl ConfigClass for Optimizer {
///     fn schema() -> &'static Schema { &OPTIMIZER }
/// }
///
/// let opt = Optimizer::fromfile("exp/opt.yml")?;
/// ```
pub trait ConfigClass: Serialize + DeserializeOwned {
    fn schema() -> &'static Schema;

    fn from_instance(instance: &Instance) -> Result<Self> {
        from_plain_with_path(instance.asdict())
    }

    fn fromdict(plain: &Json) -> Result<Self> {
        Self::from_instance(&Self::schema().fromdict(plain)?)
    }

    fn fromfile(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_instance(&Self::schema().fromfile(path)?)
    }

    fn fromcli<I, T>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::from_instance(&Self::schema().fromcli(argv)?)
    }

    /// Re-bind the struct's own data against its schema.
    fn instance(&self) -> Result<Instance> {
        let plain = serde_json::to_value(self).map_err(|e| Error::Deserialize {
            path: ".".into(),
            message: e.to_string(),
        })?;
        Self::schema().fromdict(&plain)
    }

    fn asdict(&self) -> Result<Json> {
        Ok(self.instance()?.asdict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Namespace;
    use crate::schema::SchemaDecl;
    use once_cell::sync::Lazy;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum OptType {
        Sgd,
        Adam,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Optimizer {
        opt_type: OptType,
        learning_rate: f64,
        betas: Option<(f64, f64)>,
    }

    static OPTIMIZER: Lazy<Schema> = Lazy::new(|| {
        let mut ns = Namespace::new();
        ns.declare_enum("OptType", [("sgd", "sgd"), ("adam", "adam")]).unwrap();
        ns.declare(
            SchemaDecl::new("Optimizer")
                .field("opt_type", "OptType")
                .field_default("learning_rate", "float", 0.1)
                .field_default("betas", "Optional[Tuple[float, float]]", Json::Null),
        )
        .unwrap()
    });

    impl ConfigClass for Optimizer {
        fn schema() -> &'static Schema { &OPTIMIZER }
    }

    #[test]
    fn binds_through_the_schema() {
        let opt = Optimizer::fromdict(&json!({"opt_type": "adam", "learning_rate": "1e-3", "betas": [0.9, 1]})).unwrap();
        assert_eq!(opt, Optimizer { opt_type: OptType::Adam, learning_rate: 1e-3, betas: Some((0.9, 1.0)) });
        assert_eq!(opt.asdict().unwrap(), json!({"opt_type": "adam", "learning_rate": 0.001, "betas": [0.9, 1.0]}));
    }

    #[test]
    fn schema_errors_come_first() {
        assert!(matches!(
            Optimizer::fromdict(&json!({"opt_type": "rmsprop"})),
            Err(Error::Conversion(_))
        ));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "lowercase")]
    enum Scheduler {
        Step { step_size: u32, gamma: f64 },
        Cosine { t_max: u32 },
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Schedule {
        scheduler: Scheduler,
    }

    static SCHEDULE: Lazy<Schema> = Lazy::new(|| {
        let mut ns = Namespace::new();
        ns.declare(SchemaDecl::new("StepLR").field("step_size", "int").field_default("gamma", "float", 0.1)).unwrap();
        ns.declare(SchemaDecl::new("CosineLR").field("t_max", "int")).unwrap();
        ns.declare_registry("Scheduler", [("step", "StepLR"), ("cosine", "CosineLR")]).unwrap();
        ns.declare(SchemaDecl::new("Schedule").field("scheduler", "Scheduler")).unwrap()
    });

    impl ConfigClass for Schedule {
        fn schema() -> &'static Schema { &SCHEDULE }
    }

    #[test]
    fn registry_variants_map_to_tagged_enums() {
        let s = Schedule::fromdict(&json!({"scheduler": {"type": "step", "step_size": "4"}})).unwrap();
        assert_eq!(s, Schedule { scheduler: Scheduler::Step { step_size: 4, gamma: 0.1 } });
        let cosine = Schedule { scheduler: Scheduler::Cosine { t_max: 10 } };
        assert_eq!(cosine.asdict().unwrap(), json!({"scheduler": {"type": "cosine", "t_max": 10}}));
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Strict {
        inner: Inner,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Inner {
        count: u8,
    }

    #[test]
    fn mismatched_structs_report_the_path() {
        match from_plain_with_path::<Strict>(json!({"inner": {"count": 300}})) {
            Err(Error::Deserialize { path, .. }) => assert_eq!(path, "inner.count"),
            other => panic!("unexpected {other:?}"),
        }
        match from_plain_with_path::<Strict>(json!({"inner": {}})) {
            Err(Error::Deserialize { path, message }) => {
                assert_eq!(path, "inner");
                assert!(message.contains("count"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
