use anyhow::{Result, anyhow};
use jaq_core::{Compiler, Ctx, RcIter, compile::Undefined, load};
use jaq_json::Val;
use serde_json::Value;

/// Run a jaq filter over one normalized document. Filters may produce
/// zero, one, or many outputs; callers decide how to serialize that.
pub fn apply_filter(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File {
        code: filter_src,
        path: (),
    };

    let modules = loader.load(&arena, program).map_err(format_parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let results = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for item in results {
        let val = item.map_err(|e| anyhow!("jq filter failed: {e:?}"))?;
        // Val renders as JSON text; round-trip back into a Value.
        out.push(serde_json::from_str(&format!("{val}"))?);
    }

    Ok(out)
}

fn format_parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> anyhow::Error {
    let mut s = String::new();
    for (file, err) in errs {
        s.push_str(&format!("jq parse error: {err:?} in `{}`\n", file.code));
    }
    anyhow!(s)
}

fn format_undefined_errors(
    errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>,
) -> anyhow::Error {
    let mut s = String::new();
    for (file, list) in errs {
        for (name, undef) in list {
            s.push_str(&format!(
                "jq filter references undefined `{name}`: {undef:?} in `{}`\n",
                file.code
            ));
        }
    }
    anyhow!(s)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_filter_passes_through() {
        let input = json!({"a": 1, "b": [2, 3]});
        let out = apply_filter(".", &input).expect("identity filter");
        assert_eq!(out, vec![input]);
    }

    #[test]
    fn filter_can_select_and_multiply_outputs() {
        let input = json!({"items": [1, 2, 3]});
        let out = apply_filter(".items[]", &input).expect("spread filter");
        assert_eq!(out, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn bad_filter_is_an_error() {
        assert!(apply_filter(".items[", &json!({})).is_err());
    }
}
