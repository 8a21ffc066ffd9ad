//! CLI: read instance-tree dumps, normalize, write JSON.
use crate::flatten::RootSelector;
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde_json::Value as Json;
use std::fs;
use std::path::{Path, PathBuf};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// flatten typed instance-tree dumps into minimal, de-noised JSON
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// flatten the whole document, or a single root value with --value
    Flatten(FlattenArgs),
    /// extract one root field as an ordered list of records
    Records(RecordsArgs),
}

#[derive(Args, Debug, Clone)]
struct IoSettings {
    /// one or more inputs; literal paths or quoted glob patterns
    #[arg(num_args = 1.., required = true)]
    input: Vec<String>,

    /// output file; treated as a directory when several inputs resolve
    #[arg(short, long, default_value = "output.json")]
    out: PathBuf,

    /// jq filter applied to each normalized document before writing
    #[arg(long)]
    jq: Option<String>,

    /// single-line output instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

#[derive(Args, Debug)]
struct FlattenArgs {
    #[command(flatten)]
    io: IoSettings,

    /// flatten only the root value at this field index
    #[arg(long)]
    value: Option<usize>,
}

#[derive(Args, Debug)]
struct RecordsArgs {
    #[command(flatten)]
    io: IoSettings,

    /// field index of the record list on the root instance
    #[arg(long, default_value_t = 0)]
    field: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        let (io, selector) = match &self.cmd {
            Command::Flatten(args) => {
                let selector = match args.value {
                    Some(index) => RootSelector::Value { index },
                    None => RootSelector::Document,
                };
                (&args.io, selector)
            }
            Command::Records(args) => (&args.io, RootSelector::Records { field: args.field }),
        };

        io.run(selector)
    }
}

impl IoSettings {
    fn run(&self, selector: RootSelector) -> Result<()> {
        let inputs = resolve_file_path_patterns(&self.input)?;

        match inputs.as_slice() {
            [] => bail!("no input files were given"),
            [single] => self.extract(single, &self.out, selector),
            many => {
                // Several inputs: `out` becomes a directory, one JSON
                // document per input, extracted in parallel.
                ensure_unique_output_names(many)?;

                fs::create_dir_all(&self.out)
                    .with_context(|| format!("could not create {}", self.out.display()))?;

                many.par_iter().try_for_each(|input| {
                    let out = self.out.join(output_name(input));
                    self.extract(input, &out, selector)
                })
            }
        }
    }

    fn extract(&self, input: &Path, out: &Path, selector: RootSelector) -> Result<()> {
        let doc = crate::reader::read_root(input)
            .with_context(|| format!("could not read instance tree {}", input.display()))?;

        let value = crate::flatten::normalize(&doc, selector)
            .with_context(|| format!("could not normalize {}", input.display()))?;

        let value = match self.jq.as_deref() {
            None => value,
            Some(expr) => {
                let mut results = crate::jq::apply_filter(expr, &value)
                    .with_context(|| format!("could not filter {}", input.display()))?;
                if results.len() == 1 {
                    results.remove(0)
                } else {
                    Json::Array(results)
                }
            }
        };

        let rendered = if self.compact {
            serde_json::to_string(&value)?
        } else {
            serde_json::to_string_pretty(&value)?
        };

        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(out, rendered).with_context(|| format!("could not write {}", out.display()))?;

        log::debug!("Wrote {}", out.display());

        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for pattern in patterns {
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }

        let mut matched_any = false;

        for entry in glob::glob(pattern)? {
            out.push(entry?);
            matched_any = true;
        }

        // An explicit glob that matches nothing is an error; a typo'd
        // literal path fails at read time instead.
        if !matched_any {
            bail!("glob pattern matched no files: {pattern}");
        }
    }

    Ok(out)
}

fn output_name(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    PathBuf::from(stem).with_extension("json")
}

// Batch outputs are named by stem; two inputs sharing a stem would race
// to write the same file.
fn ensure_unique_output_names(inputs: &[PathBuf]) -> Result<()> {
    let mut seen = std::collections::HashMap::<PathBuf, &PathBuf>::new();

    for input in inputs {
        if let Some(previous) = seen.insert(output_name(input), input) {
            bail!(
                "inputs {} and {} would both be written to {}; rename one or extract them separately",
                previous.display(),
                input.display(),
                output_name(input).display()
            );
        }
    }

    Ok(())
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through_unresolved() {
        let paths =
            resolve_file_path_patterns(&["a/b.json".to_string(), "c.json".to_string()]).unwrap();
        assert_eq!(paths, [PathBuf::from("a/b.json"), PathBuf::from("c.json")]);
    }

    #[test]
    fn unmatched_glob_is_an_error() {
        let result = resolve_file_path_patterns(&["no/such/dir/*.json".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn output_names_swap_the_extension() {
        assert_eq!(
            output_name(Path::new("dumps/ArmorData.user.json")),
            PathBuf::from("ArmorData.user.json")
        );
        assert_eq!(
            output_name(Path::new("dumps/plain")),
            PathBuf::from("plain.json")
        );
    }

    #[test]
    fn colliding_batch_output_names_are_rejected() {
        let inputs = [PathBuf::from("a/foo.json"), PathBuf::from("b/foo.json")];
        let err = ensure_unique_output_names(&inputs).expect_err("same stem must collide");
        assert!(err.to_string().contains("foo.json"), "message was {err}");

        let distinct = [PathBuf::from("a/foo.json"), PathBuf::from("a/bar.json")];
        assert!(ensure_unique_output_names(&distinct).is_ok());
    }

    #[test]
    fn end_to_end_flatten_writes_minimal_json() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let in_path = dir.path().join("sample.json");
        let out_path = dir.path().join("out.json");

        let mut file = fs::File::create(&in_path).unwrap();
        file.write_all(
            br#"{"instances": [{"name": "t", "fields": [
                {"name": "_Values", "value": {"array": [
                    {"object": {"name": "e", "fields": [{"name": "_Value", "value": {"s32": 4}}]}},
                    {"object": {"name": "e", "fields": [{"name": "_Value", "value": {"s32": 5}}]}}
                ]}}
            ]}]}"#,
        )
        .unwrap();

        let io = IoSettings {
            input: vec![in_path.to_string_lossy().into_owned()],
            out: out_path.clone(),
            jq: None,
            compact: true,
        };
        io.run(RootSelector::Document).unwrap();

        let written = fs::read_to_string(&out_path).unwrap();
        assert_eq!(written, "[4,5]");
    }
}
