//! Error taxonomy shared by declaration, conversion, binding, loading and
//! the generated command line.
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    // ———— declaration time ————
    #[error("unsupported type `{annotation}`: {reason}")]
    UnsupportedType { annotation: String, reason: String },

    #[error("{schema}: field `{field}` is declared more than once")]
    DuplicateField { schema: String, field: String },

    #[error("`{name}` is already declared")]
    DuplicateDeclaration { name: String },

    #[error("invalid name `{name}`: expected an identifier")]
    InvalidName { name: String },

    #[error("enum {name}: {reason}")]
    InvalidEnum { name: String, reason: String },

    #[error("registry {name}: {reason}")]
    InvalidRegistry { name: String, reason: String },

    #[error("no schema named `{name}` is declared")]
    UnknownSchema { name: String },

    #[error("{schema}: default of field `{field}` does not match its type: {source}")]
    InvalidDefault {
        schema: String,
        field: String,
        #[source]
        source: Box<Error>,
    },

    // ———— binding ————
    #[error("{schema}: `{field}` is expected, but it is not set (at {path})")]
    MissingField { schema: String, field: String, path: String },

    #[error("{schema}: unrecognized fields {} (at {path})", .fields.join(", "))]
    UnknownField { schema: String, fields: Vec<String>, path: String },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("{schema}: validation failed: {message}")]
    Validation { schema: String, message: String },

    #[error("{schema}: takes {expected} positional arguments but {given} were given")]
    TooManyArguments { schema: String, expected: usize, given: usize },

    #[error("{schema}: got multiple values for argument `{field}`")]
    DuplicateArgument { schema: String, field: String },

    // ———— file loading ————
    #[error("cyclic inheritance: {}", format_chain(.chain))]
    CyclicInheritance { chain: Vec<PathBuf> },

    #[error("{}: unsupported config format (expected .json, .yml or .yaml)", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("{}: config root must be a mapping", .path.display())]
    NotAMapping { path: PathBuf },

    #[error("{}: `_base_` must be a path or a list of paths", .path.display())]
    InvalidBase { path: PathBuf },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    // ———— command line ————
    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error("--{flag}: {reason}")]
    InvalidOverride { flag: String, reason: String },

    // ———— typed bridge ————
    #[error("at path {path} → {message}")]
    Deserialize { path: String, message: String },
}

impl Error {
    pub(crate) fn unsupported(annotation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnsupportedType { annotation: annotation.into(), reason: reason.into() }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> ")
}

/// A value that does not fit its descriptor.
///
/// `candidates` is only filled for unions: one line per alternative that was
/// tried, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionError {
    pub path: String,
    pub expected: String,
    pub found: String,
    pub reason: String,
    pub candidates: Vec<String>,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot convert {} to {} at {}: {}",
            self.found, self.expected, self.path, self.reason
        )?;
        for candidate in &self.candidates {
            write!(f, "\n  - {candidate}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConversionError {}
