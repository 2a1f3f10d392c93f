//! `configclass` binary: load | check | run
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value as Json;
use tracing::{info, warn};

use configclass::loader::{self, Format};
use configclass::{Binder, Cli, Error, Schema, SchemaDocument};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// bind JSON/YAML experiment configs against declared schemas
#[derive(Parser, Debug)]
#[command(name = "configclass", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// resolve `_base_` inheritance and print the merged config
    Load(LoadCmd),
    /// bind each config against a schema and report what fails
    Check(CheckCmd),
    /// the generated command line of a schema: CONFIG [--field.path VALUE]...
    Run(RunCmd),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema document (.json/.yml) declaring enums and schemas
    #[arg(long)]
    schema: PathBuf,

    /// schema to bind against (defaults to the document's `root`)
    #[arg(long)]
    root: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(clap::Parser, Debug)]
struct LoadCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// jq filter applied to each merged config
    #[arg(long)]
    query: Option<String>,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// keep unrecognized keys instead of rejecting them
    #[arg(long)]
    allow_unknown: bool,

    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct RunCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// extra long option for a flag, e.g. `lr=optimizer.learning_rate`
    #[arg(long = "shortcut", value_parser = parse_shortcut)]
    shortcuts: Vec<(String, String)>,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// report unrecognized arguments instead of failing on them
    #[arg(long)]
    allow_rest: bool,

    /// CONFIG followed by overrides, after `--`
    #[arg(last = true, num_args = 0..)]
    args: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Yaml => Format::Yaml,
        }
    }
}

impl SchemaSettings {
    fn load(&self) -> Result<Schema> {
        let doc = SchemaDocument::load(&self.schema)
            .with_context(|| format!("failed to read schema document {}", self.schema.display()))?;
        let ns = doc.declare().with_context(|| format!("invalid schema document {}", self.schema.display()))?;
        Ok(doc.root_schema(&ns, self.root.as_deref())?)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Load(target) => target.run(),
            Command::Check(target) => target.run(),
            Command::Run(target) => target.run(),
        }
    }
}

impl LoadCmd {
    fn run(&self) -> Result<()> {
        let mut docs = Vec::new();
        for path in resolve_file_path_patterns(&self.input_settings.input)? {
            let plain = loader::load(&path).with_context(|| format!("failed to load {}", path.display()))?;
            match self.query.as_deref() {
                None => docs.push(plain),
                Some(query) => docs.extend(
                    crate::query::run(query, &plain)
                        .with_context(|| format!("jq filter failed on {}", path.display()))?,
                ),
            }
        }
        let plain = match docs.len() {
            1 => docs.remove(0),
            _ => Json::Array(docs),
        };
        emit(&plain, self.format, self.out.as_deref())
    }
}

impl CheckCmd {
    fn run(&self) -> Result<()> {
        let schema = self.schema_settings.load()?;
        let binder = Binder::new().allow_unknown(self.allow_unknown);
        let paths = resolve_file_path_patterns(&self.input_settings.input)?;

        let results: Vec<(PathBuf, std::result::Result<(), String>)> = paths
            .into_par_iter()
            .map(|path| {
                let outcome = loader::load(&path)
                    .and_then(|plain| binder.bind(&schema, &plain))
                    .map(|_| ())
                    .map_err(|e| e.to_string());
                (path, outcome)
            })
            .collect();

        let mut failed = 0;
        for (path, outcome) in &results {
            match outcome {
                Ok(()) => println!("{} {}", "ok".green().bold(), path.display()),
                Err(error) => {
                    failed += 1;
                    println!("{} {}\n    {}", "FAIL".red().bold(), path.display(), error.replace('\n', "\n    "));
                }
            }
        }
        info!(checked = results.len(), failed, schema = schema.name(), "check finished");
        if failed > 0 {
            bail!("{failed} of {} config(s) do not bind to {}", results.len(), schema.name());
        }
        Ok(())
    }
}

impl RunCmd {
    fn run(&self) -> Result<()> {
        let schema = self.schema_settings.load()?;
        let mut cli = Cli::new(&schema).name("configclass run");
        for (alias, target) in &self.shortcuts {
            cli = cli.shortcut(alias.clone(), target.clone());
        }

        let argv = std::iter::once("configclass run".to_string()).chain(self.args.iter().cloned());
        let parsed = match self.allow_rest {
            true => cli.parse_with_rest(argv),
            false => cli.parse(argv).map(|instance| (instance, Vec::new())),
        };
        let instance = match parsed {
            Ok((instance, rest)) => {
                if !rest.is_empty() {
                    warn!(rest = ?rest, "ignoring unrecognized arguments");
                }
                instance
            }
            Err(Error::Cli(e)) => e.exit(),
            Err(e) => return Err(e.into()),
        };
        emit(&instance.asdict(), self.format, self.out.as_deref())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn emit(plain: &Json, format: OutputFormat, out: Option<&Path>) -> Result<()> {
    match out {
        Some(out) => {
            loader::save(out, plain).with_context(|| format!("failed to write {}", out.display()))?;
        }
        None => {
            let text = loader::to_string(plain, format.into(), Path::new("<stdout>"))?;
            print!("{text}");
        }
    }
    Ok(())
}

fn parse_shortcut(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(alias, target)| (alias.trim().to_string(), target.trim().to_string()))
        .filter(|(alias, target)| !alias.is_empty() && !target.is_empty())
        .ok_or_else(|| format!("expected ALIAS=FIELD.PATH, got `{raw}`"))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern: {pattern}"))? {
                matched_any = true;
                out.push(entry?);
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
