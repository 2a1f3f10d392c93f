//! Command-line overrides synthesized from a schema.
//!
//! ```text
//! prog exp.yml --optimizer.learning_rate 1e-4 --num_epochs "[1, 2, 3]" --num_epochs.0 5
//! ```
//!
//! Leaf fields (primitives and enums, at any depth) get a scalar flag whose
//! value goes through the same conversion as file data. Composite fields get
//! a flag taking JSON text. Lists and tuples that the base config already
//! fills also get one flag per element (`--field.INDEX`), which is why the
//! flag set depends on the loaded config and not only on the schema. For the
//! same reason a registry field exposes the flags of the variant its base
//! config selects with `type`.
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::binder::Binder;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::loader;
use crate::plain::{self, Step};
use crate::registry::TYPE_KEY;
use crate::schema::Schema;
use crate::ty::{Prim, Ty};

const CONFIG_ID: &str = "__config";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Integer,
    Float,
    String,
    Bool,
    Json,
}

impl FlagKind {
    fn of(ty: &Ty) -> FlagKind {
        match ty.strip_optional() {
            Ty::Prim(Prim::Int) => FlagKind::Integer,
            Ty::Prim(Prim::Float) => FlagKind::Float,
            Ty::Prim(Prim::Str | Prim::Path) | Ty::Enum(_) => FlagKind::String,
            Ty::Prim(Prim::Bool) => FlagKind::Bool,
            _ => FlagKind::Json,
        }
    }

    pub fn value_name(&self) -> &'static str {
        match self {
            FlagKind::Integer => "INTEGER",
            FlagKind::Float => "FLOAT",
            FlagKind::String => "STRING",
            FlagKind::Bool => "BOOL",
            FlagKind::Json => "JSON",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Flag {
    /// Dotted path, also the long option name.
    pub name: String,
    pub path: Vec<Step>,
    pub kind: FlagKind,
    pub ty: Ty,
    pub help: String,
}

impl Flag {
    fn new(path: Vec<Step>, ty: &Ty, doc: Option<&str>) -> Self {
        let name = path
            .iter()
            .map(|s| match s {
                Step::Key(k) => k.clone(),
                Step::Index(i) => i.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".");
        let kind = FlagKind::of(ty);

        let mut help = match doc {
            Some(doc) => format!("{doc} ({ty})"),
            None => ty.to_string(),
        };
        if let Ty::Enum(e) = ty.strip_optional() {
            help.push_str(&format!("; one of: {}", e.choices().join(", ")));
        }
        if kind == FlagKind::Json {
            help.push_str("; raw JSON text");
        } else if ty.is_optional() {
            help.push_str("; `null` clears it");
        }

        Self { name, path, kind, ty: ty.clone(), help }
    }

    /// Turn the raw command-line text into plain data for the config.
    pub fn parse(&self, raw: &str) -> Result<Json> {
        let invalid = |reason: String| Error::InvalidOverride { flag: self.name.clone(), reason };
        if self.kind == FlagKind::Json {
            return serde_json::from_str(raw).map_err(|e| invalid(format!("invalid JSON: {e}")));
        }
        if self.ty.is_optional() && (raw.eq_ignore_ascii_case("null") || raw.eq_ignore_ascii_case("none")) {
            return Ok(Json::Null);
        }
        Binder::new()
            .convert(&Json::String(raw.to_string()), &self.ty)
            .map(|v| v.to_plain())
            .map_err(|e| invalid(e.to_string()))
    }
}

/// Every flag a schema accepts, given its base config.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    flags: Vec<Flag>,
}

impl FlagSet {
    pub fn synthesize(schema: &Schema, base: &Json) -> Self {
        let mut out = FlagSet::default();
        walk(schema, &mut Vec::new(), Some(base), &mut out.flags);
        out
    }

    pub fn flags(&self) -> &[Flag] { &self.flags }

    pub fn get(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// The clap surface: `CONFIG` positional plus one option per flag.
    pub fn command(&self, name: &str, shortcuts: &IndexMap<String, String>) -> Command {
        let mut cmd = Command::new(name.to_string())
            .about("Load a config file and override any of its fields")
            .arg(
                Arg::new(CONFIG_ID)
                    .value_name("CONFIG")
                    .help("Experiment config file (JSON or YAML)")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            );
        for flag in &self.flags {
            let mut arg = Arg::new(flag.name.clone())
                .long(flag.name.clone())
                .value_name(flag.kind.value_name())
                .help(flag.help.clone())
                .action(ArgAction::Set)
                .num_args(1)
                // `-3`, `-foo` and `-inf` are values, whatever the flag's kind
                .allow_hyphen_values(true)
                .value_parser(value_parser!(String));
            for (alias, _) in shortcuts.iter().filter(|(_, target)| **target == flag.name) {
                arg = arg.visible_alias(alias.clone());
            }
            cmd = cmd.arg(arg);
        }
        cmd
    }

    /// Values given on the command line, shallow paths first so that a whole
    /// field set from JSON can still be refined by deeper flags.
    pub fn overrides(&self, matches: &ArgMatches) -> Result<Vec<(&Flag, Json)>> {
        let mut out = Vec::new();
        for flag in &self.flags {
            if let Some(raw) = matches.get_one::<String>(&flag.name) {
                out.push((flag, flag.parse(raw)?));
            }
        }
        out.sort_by_key(|(flag, _)| flag.path.len());
        Ok(out)
    }
}

fn walk(schema: &Schema, prefix: &mut Vec<Step>, base: Option<&Json>, out: &mut Vec<Flag>) {
    for field in schema.fields() {
        if prefix.is_empty() && field.name == "help" {
            warn!(schema = schema.name(), "field `help` is shadowed by --help and gets no flag");
            continue;
        }
        prefix.push(Step::Key(field.name.clone()));
        let sub = base.and_then(|b| b.get(&field.name));
        out.push(Flag::new(prefix.clone(), &field.ty, field.help.as_deref()));

        match field.ty.strip_optional() {
            Ty::Nested(inner) => walk(inner, prefix, sub, out),
            Ty::Registry(registry) => {
                let selected = sub.and_then(|s| s.get(TYPE_KEY)).and_then(Json::as_str);
                if let Some(variant) = selected.and_then(|name| registry.get(name)) {
                    walk(variant, prefix, sub, out);
                }
            }
            Ty::List(item) => {
                let len = sub.and_then(Json::as_array).map_or(0, Vec::len);
                for i in 0..len {
                    out.push(element_flag(prefix, i, item));
                }
            }
            Ty::Tuple(items) => {
                let len = sub.and_then(Json::as_array).map_or(0, Vec::len);
                for (i, item) in items.iter().enumerate().take(len) {
                    out.push(element_flag(prefix, i, item));
                }
            }
            _ => {}
        }
        prefix.pop();
    }
}

fn element_flag(prefix: &[Step], index: usize, ty: &Ty) -> Flag {
    let mut path = prefix.to_vec();
    path.push(Step::Index(index));
    Flag::new(path, ty, None)
}

// ————————————————————————————————————————————————————————————————————————————
// FRONT API
// ————————————————————————————————————————————————————————————————————————————

/// `CONFIG [--dotted.path VALUE]...` for one schema.
pub struct Cli<'s> {
    schema: &'s Schema,
    binder: Binder,
    shortcuts: IndexMap<String, String>,
    name: Option<String>,
}

impl<'s> Cli<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema, binder: Binder::new(), shortcuts: IndexMap::new(), name: None }
    }

    pub fn binder(mut self, binder: Binder) -> Self {
        self.binder = binder;
        self
    }

    /// Make `--alias` an alternative spelling of `--target`,
    /// e.g. `shortcut("lr", "optimizer.learning_rate")`.
    pub fn shortcut(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.shortcuts.insert(alias.into(), target.into());
        self
    }

    /// Program name shown in usage and help.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn parse<I, T>(&self, argv: I) -> Result<Instance>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let plain = self.overlay(argv)?;
        self.binder.bind(self.schema, &plain)
    }

    /// Like [`parse`](Self::parse), but arguments the generated command line
    /// does not know are returned, in order, instead of failing. An unknown
    /// `--flag` takes the next argument with it unless written `--flag=value`;
    /// everything after `--` (and after the config, if it follows `--`) is
    /// passed back untouched.
    pub fn parse_with_rest<I, T>(&self, argv: I) -> Result<(Instance, Vec<OsString>)>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let (plain, rest) = self.overlay_with(argv, true)?;
        debug!(count = rest.len(), "unrecognized arguments passed through");
        Ok((self.binder.bind(self.schema, &plain)?, rest))
    }

    /// The base config with every command-line override applied, unbound.
    pub fn overlay<I, T>(&self, argv: I) -> Result<Json>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        self.overlay_with(argv, false).map(|(plain, _)| plain)
    }

    fn overlay_with<I, T>(&self, argv: I, keep_rest: bool) -> Result<(Json, Vec<OsString>)>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();

        let config = find_config(&argv);
        let mut base = match config {
            Some(at) => loader::load(&argv[at])?,
            // No config given: let clap report it (or print help).
            None => Json::Null,
        };

        let flags = FlagSet::synthesize(self.schema, &base);
        self.check_shortcuts(&flags)?;
        let (argv, rest) = match keep_rest {
            true => self.split_rest(&flags, argv, config),
            false => (argv, Vec::new()),
        };
        let matches = self.command_for(&flags).try_get_matches_from(&argv)?;

        for (flag, value) in flags.overrides(&matches)? {
            debug!(flag = %flag.name, value = %value, "override");
            plain::set_path(&mut base, &flag.path, value)
                .map_err(|reason| Error::InvalidOverride { flag: flag.name.clone(), reason })?;
        }
        Ok((base, rest))
    }

    /// Separate what the generated command line understands from the rest.
    /// Tokens are consumed the way [`find_config`] reads them.
    fn split_rest(&self, flags: &FlagSet, argv: Vec<OsString>, config: Option<usize>) -> (Vec<OsString>, Vec<OsString>) {
        let known = |name: &str| flags.get(name).is_some() || self.shortcuts.contains_key(name);
        let mut kept = Vec::with_capacity(argv.len());
        let mut rest = Vec::new();
        let mut iter = argv.into_iter().enumerate();
        if let Some((_, program)) = iter.next() {
            kept.push(program);
        }

        while let Some((at, arg)) = iter.next() {
            let text = arg.to_string_lossy().into_owned();
            if Some(at) == config || text == "-h" || text == "--help" {
                kept.push(arg);
                continue;
            }
            if text == "--" {
                if config == Some(at + 1) {
                    kept.push(arg);
                    kept.extend(iter.next().map(|(_, path)| path));
                }
                rest.extend(iter.by_ref().map(|(_, a)| a));
                break;
            }
            let flag = match text.strip_prefix("--") {
                Some(long) => Some(long.split_once('=').map_or((long, false), |(name, _)| (name, true))),
                None if text.starts_with('-') && text.len() > 1 => Some(("", false)),
                None => None,
            };
            match flag {
                Some((name, inline)) => {
                    let into = if !name.is_empty() && known(name) { &mut kept } else { &mut rest };
                    into.push(arg);
                    if !inline {
                        into.extend(iter.next().map(|(_, value)| value));
                    }
                }
                None => rest.push(arg),
            }
        }
        (kept, rest)
    }

    /// The clap command for a given base config, e.g. to render help.
    pub fn command(&self, base: &Json) -> Result<Command> {
        let flags = FlagSet::synthesize(self.schema, base);
        self.check_shortcuts(&flags)?;
        Ok(self.command_for(&flags))
    }

    fn command_for(&self, flags: &FlagSet) -> Command {
        let name = self.name.clone().unwrap_or_else(|| self.schema.name().to_lowercase());
        flags.command(&name, &self.shortcuts)
    }

    fn check_shortcuts(&self, flags: &FlagSet) -> Result<()> {
        for (alias, target) in &self.shortcuts {
            let invalid = |reason: String| Error::InvalidOverride { flag: alias.clone(), reason };
            if flags.get(alias).is_some() || alias == "help" {
                return Err(invalid("shortcut shadows an existing flag".into()));
            }
            // element flags only exist when the base config has the list
            let known = flags.get(target).is_some()
                || FlagSet::synthesize(self.schema, &Json::Null).get(target).is_some();
            if !known {
                return Err(invalid(format!("shortcut target `{target}` is not a flag")));
            }
        }
        Ok(())
    }
}

/// Index of the first positional argument. Every generated flag takes
/// exactly one value, so anything after a `--flag` without `=` is that
/// flag's value.
fn find_config(argv: &[OsString]) -> Option<usize> {
    let mut iter = argv.iter().enumerate().skip(1);
    while let Some((at, arg)) = iter.next() {
        let text = arg.to_string_lossy();
        if text == "--" {
            return iter.next().map(|(at, _)| at);
        }
        if text == "-h" || text == "--help" || (text.starts_with("--") && text.contains('=')) {
            continue;
        }
        if text.starts_with('-') && text.len() > 1 {
            iter.next();
            continue;
        }
        return Some(at);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Namespace;
    use crate::schema::SchemaDecl;
    use crate::value::Value;
    use serde_json::json;
    use std::path::Path;

    fn schema() -> Schema {
        let mut ns = Namespace::new();
        ns.declare_enum("OptType", [("sgd", "sgd"), ("adam", "adam")]).unwrap();
        ns.declare(
            SchemaDecl::new("Optimizer")
                .field("opt_type", "OptType")
                .field_default("learning_rate", "float", 0.01)
                .help("step size")
                .field_default("betas", "Optional[Tuple[float, float]]", Json::Null),
        )
        .unwrap();
        ns.declare(
            SchemaDecl::new("Trainer")
                .field("optimizer", "Optimizer")
                .field("num_epochs", "List[int]")
                .field_default("batch_size", "int", 32)
                .field_default("debug", "bool", false)
                .field_default("note", "Optional[str]", Json::Null)
                .field_default("extra", "Dict[str, Any]", json!({})),
        )
        .unwrap()
    }

    fn write_base(dir: &Path) -> PathBuf {
        let path = dir.join("exp.yml");
        std::fs::write(
            &path,
            "optimizer:\n  opt_type: sgd\n  learning_rate: 0.1\nnum_epochs: [10, 20]\nbatch_size: 16\n",
        )
        .unwrap();
        path
    }

    fn names(flags: &FlagSet) -> Vec<&str> {
        flags.flags().iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn synthesizes_leaf_composite_and_index_flags() {
        let s = schema();
        let static_flags = FlagSet::synthesize(&s, &Json::Null);
        assert_eq!(
            names(&static_flags),
            [
                "optimizer", "optimizer.opt_type", "optimizer.learning_rate", "optimizer.betas",
                "num_epochs", "batch_size", "debug", "note", "extra",
            ]
        );

        let flags = FlagSet::synthesize(&s, &json!({"num_epochs": [1, 2], "optimizer": {"betas": [0.9, 0.99]}}));
        let kinds: Vec<_> = flags.flags().iter().map(|f| (f.name.as_str(), f.kind)).collect();
        assert!(kinds.contains(&("num_epochs.0", FlagKind::Integer)));
        assert!(kinds.contains(&("num_epochs.1", FlagKind::Integer)));
        assert!(kinds.contains(&("optimizer.betas.1", FlagKind::Float)));
        assert!(kinds.contains(&("optimizer.opt_type", FlagKind::String)));
        assert!(kinds.contains(&("num_epochs", FlagKind::Json)));
        assert!(kinds.contains(&("debug", FlagKind::Bool)));
        assert!(kinds.contains(&("extra", FlagKind::Json)));
    }

    #[test]
    fn no_overrides_keeps_the_base() {
        let dir = tempfile::tempdir().unwrap();
        let exp = write_base(dir.path());
        let inst = schema().fromcli(["prog", exp.to_str().unwrap()]).unwrap();
        assert_eq!(inst.get("batch_size"), Some(&Value::Int(16)));
        assert_eq!(inst.lookup("optimizer.learning_rate").unwrap().as_f64(), Some(0.1));
    }

    #[test]
    fn json_flag_replaces_a_list() {
        let dir = tempfile::tempdir().unwrap();
        let exp = write_base(dir.path());
        let inst = schema()
            .fromcli(["prog", exp.to_str().unwrap(), "--num_epochs", "[1, 2, 3]"])
            .unwrap();
        assert_eq!(
            inst.get("num_epochs"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
        assert_eq!(inst.get("batch_size"), Some(&Value::Int(16)));
        assert_eq!(inst.lookup("optimizer.opt_type").unwrap().as_enum().unwrap().name(), "sgd");
    }

    #[test]
    fn scalar_flags_convert_like_file_data() {
        let dir = tempfile::tempdir().unwrap();
        let exp = write_base(dir.path());
        let inst = schema()
            .fromcli([
                "prog",
                "--optimizer.learning_rate", "-0.0001",
                exp.to_str().unwrap(),
                "--optimizer.opt_type", "adam",
                "--debug", "TRUE",
                "--num_epochs.1", "7",
                "--note=hello",
            ])
            .unwrap();
        assert_eq!(inst.lookup("optimizer.learning_rate").unwrap().as_f64(), Some(-0.0001));
        assert_eq!(inst.lookup("optimizer.opt_type").unwrap().as_enum().unwrap().name(), "adam");
        assert_eq!(inst.get("debug"), Some(&Value::Bool(true)));
        assert_eq!(inst.lookup("num_epochs.1"), Some(&Value::Int(7)));
        assert_eq!(inst.get("note"), Some(&Value::from("hello")));
    }

    #[test]
    fn deeper_flags_apply_after_their_parent() {
        let dir = tempfile::tempdir().unwrap();
        let exp = write_base(dir.path());
        let inst = schema()
            .fromcli([
                "prog",
                exp.to_str().unwrap(),
                "--optimizer.learning_rate", "0.5",
                "--optimizer", r#"{"opt_type": "adam"}"#,
            ])
            .unwrap();
        assert_eq!(inst.lookup("optimizer.opt_type").unwrap().as_enum().unwrap().name(), "adam");
        assert_eq!(inst.lookup("optimizer.learning_rate").unwrap().as_f64(), Some(0.5));
    }

    #[test]
    fn bad_values_are_reported_per_flag() {
        let dir = tempfile::tempdir().unwrap();
        let exp = write_base(dir.path());
        let s = schema();
        let exp = exp.to_str().unwrap();
        assert!(matches!(
            s.fromcli(["prog", exp, "--batch_size", "1.5"]),
            Err(Error::InvalidOverride { flag, .. }) if flag == "batch_size"
        ));
        assert!(matches!(
            s.fromcli(["prog", exp, "--num_epochs", "[1,"]),
            Err(Error::InvalidOverride { .. })
        ));
        assert!(matches!(s.fromcli(["prog", exp, "--nope", "1"]), Err(Error::Cli(_))));
        assert!(matches!(
            s.fromcli(["prog", exp, "--num_epochs", "[1]", "--num_epochs.1", "3"]),
            Err(Error::InvalidOverride { .. })
        ));
    }

    #[test]
    fn shortcuts_alias_long_flags() {
        let dir = tempfile::tempdir().unwrap();
        let exp = write_base(dir.path());
        let s = schema();
        let inst = Cli::new(&s)
            .shortcut("lr", "optimizer.learning_rate")
            .parse(["prog", exp.to_str().unwrap(), "--lr", "3"])
            .unwrap();
        assert_eq!(inst.lookup("optimizer.learning_rate").unwrap().as_f64(), Some(3.0));

        let clash = Cli::new(&s).shortcut("debug", "batch_size").parse(["prog", exp.to_str().unwrap()]);
        assert!(matches!(clash, Err(Error::InvalidOverride { .. })));
    }

    #[test]
    fn help_lists_every_flag_with_its_kind() {
        let s = schema();
        let mut cmd = Cli::new(&s).command(&json!({"num_epochs": [1]})).unwrap();
        let help = cmd.render_long_help().to_string();
        for needle in [
            "--optimizer.learning_rate <FLOAT>",
            "--optimizer.opt_type <STRING>",
            "--num_epochs <JSON>",
            "--num_epochs.0 <INTEGER>",
            "--debug <BOOL>",
            "one of: sgd, adam",
            "step size",
        ] {
            assert!(help.contains(needle), "missing `{needle}` in:\n{help}");
        }

        let err = s.fromcli(["prog", "--help"]).unwrap_err();
        match err {
            Error::Cli(e) => assert_eq!(e.kind(), clap::error::ErrorKind::DisplayHelp),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn finds_the_config_among_flags() {
        let argv: Vec<OsString> = ["p", "--a", "1", "--b=2", "-h", "cfg.yml", "--c", "x"]
            .into_iter()
            .map(OsString::from)
            .collect();
        assert_eq!(find_config(&argv), Some(5));
        let argv: Vec<OsString> = ["p", "--", "-odd.yml"].into_iter().map(OsString::from).collect();
        assert_eq!(find_config(&argv), Some(2));
    }

    #[test]
    fn registry_fields_expose_the_selected_variant() {
        let mut ns = Namespace::new();
        ns.declare(SchemaDecl::new("StepLR").field("step_size", "int").field_default("gamma", "float", 0.1)).unwrap();
        ns.declare(SchemaDecl::new("CosineLR").field("t_max", "int")).unwrap();
        ns.declare_registry("Scheduler", [("step", "StepLR"), ("cosine", "CosineLR")]).unwrap();
        let s = ns.declare(SchemaDecl::new("Run").field("scheduler", "Scheduler")).unwrap();

        assert_eq!(names(&FlagSet::synthesize(&s, &Json::Null)), ["scheduler"]);
        let base = json!({"scheduler": {"type": "step", "step_size": 3}});
        assert_eq!(
            names(&FlagSet::synthesize(&s, &base)),
            ["scheduler", "scheduler.step_size", "scheduler.gamma"]
        );

        let dir = tempfile::tempdir().unwrap();
        let exp = dir.path().join("run.json");
        std::fs::write(&exp, base.to_string()).unwrap();
        let exp = exp.to_str().unwrap();
        let inst = s.fromcli(["prog", exp, "--scheduler.gamma", "0.5"]).unwrap();
        assert_eq!(inst.asdict(), json!({"scheduler": {"type": "step", "step_size": 3, "gamma": 0.5}}));

        let swapped = s.fromcli(["prog", exp, "--scheduler", r#"{"type": "cosine", "t_max": 9}"#]).unwrap();
        assert_eq!(swapped.lookup("scheduler.t_max"), Some(&Value::Int(9)));
        assert!(matches!(s.fromcli(["prog", exp, "--scheduler.t_max", "9"]), Err(Error::Cli(_))));
    }

    #[test]
    fn hyphen_leading_values_are_not_flags() {
        let mut ns = Namespace::new();
        let s = ns
            .declare(
                SchemaDecl::new("Knobs")
                    .field_default("x", "Union[int, str]", 0)
                    .field_default("name", "str", "a")
                    .field_default("scale", "float", 1.0),
            )
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let exp = dir.path().join("knobs.json");
        std::fs::write(&exp, "{}").unwrap();
        let inst = s
            .fromcli(["prog", exp.to_str().unwrap(), "--x", "-3", "--name", "-foo", "--scale", "-inf"])
            .unwrap();
        assert_eq!(inst.get("x"), Some(&Value::Int(-3)));
        assert_eq!(inst.get("name"), Some(&Value::from("-foo")));
        assert_eq!(inst.get("scale").and_then(Value::as_f64), Some(f64::NEG_INFINITY));
        let plain = inst.asdict();
        assert_eq!(s.fromdict(&plain).unwrap(), inst);
    }

    #[test]
    fn unknown_arguments_are_handed_back() {
        let dir = tempfile::tempdir().unwrap();
        let exp = write_base(dir.path());
        let exp = exp.to_str().unwrap();
        let s = schema();
        let argv = ["prog", "--local_rank", "3", exp, "--batch_size", "8", "--seed=1", "notes.txt", "-v", "2", "--", "tail"];

        let (inst, rest) = Cli::new(&s).shortcut("bs", "batch_size").parse_with_rest(argv).unwrap();
        assert_eq!(inst.get("batch_size"), Some(&Value::Int(8)));
        assert_eq!(rest, ["--local_rank", "3", "--seed=1", "notes.txt", "-v", "2", "tail"]);
        assert!(matches!(s.fromcli(argv), Err(Error::Cli(_))));

        let (inst, rest) = Cli::new(&s).parse_with_rest(["prog", "--bs", "4", "--", exp, "--debug", "true"]).unwrap();
        assert_eq!(inst.get("batch_size"), Some(&Value::Int(16)));
        assert_eq!(rest, ["--bs", "4", "--debug", "true"]);
    }
}
