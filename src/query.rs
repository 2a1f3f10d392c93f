//! jq filters over loaded configs.
use anyhow::{anyhow, Result};
use std::fmt::Debug;

use jaq_core::{load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value as Json;

/// Run `filter_src` on `input`, one JSON value per filter output.
pub fn run(filter_src: &str, input: &Json) -> Result<Vec<Json>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(|errs| filter_errors("cannot parse", errs))?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| filter_errors("undefined names", errs))?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for item in outputs {
        let v = item.map_err(|e| anyhow!("jq: {e:?}"))?;
        // Val prints as JSON text
        out.push(serde_json::from_str(&v.to_string())?);
    }
    Ok(out)
}

// Loading and compiling both fail per source file.
fn filter_errors<E: Debug>(what: &str, errs: Vec<(load::File<&str, ()>, E)>) -> anyhow::Error {
    let details: Vec<String> = errs.iter().map(|(file, err)| format!("`{}`: {err:?}", file.code)).collect();
    anyhow!("jq filter {what}: {}", details.join("; "))
}
