//! Recursive flatten/collapse over the typed instance tree.
//!
//! Rewrites an [crate::model::Instance] tree into a minimal JSON value:
//! - one-field wrapper instances collapse to their value (transitively)
//! - singleton lists collapse at the per-field boundary (policy, see
//!   [ListCollapse])
//! - vectors expand to named `{x, y, z}` components
//! - fields whose processed value is empty are omitted (`omit-empty`)
//!
//! The pass is pure and stateless; running it twice over the same tree
//! yields identical output.

use crate::model::{Document, Instance, Value, Vec3};
use serde_json::{Map, Number, Value as Json};

pub type Result<T> = std::result::Result<T, Error>;

// Domain trees are a handful of levels deep; anything past this is a
// malformed or hostile dump, and recursing into it would blow the stack.
const MAX_DEPTH: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("document contains no root instance")]
    MissingRoot,

    #[error("value index {index} is out of range; the root has {len} field(s)")]
    ValueIndexOutOfRange { index: usize, len: usize },

    #[error("field index {index} is out of range; the root has {len} field(s)")]
    FieldIndexOutOfRange { index: usize, len: usize },

    #[error("field \"{0}\" does not hold an array and cannot be split into records")]
    NotARecordList(String),

    #[error("instance tree is nested deeper than {0} levels")]
    TooDeep(usize),
}

/// What to do with a one-element array produced inside [flatten].
///
/// The per-field pass always collapses singleton lists at the field
/// boundary; whether `flatten` itself also does so depends on the entry
/// point: whole-document extraction keeps lists intact inside `flatten`,
/// single-value extraction folds the collapse in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListCollapse {
    Preserve,
    Singleton,
}

/// Which part of the root instance to normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootSelector {
    /// Field-by-field extraction of the whole root instance.
    Document,
    /// One value of the root, by field index, with singleton-list
    /// collapse folded into the flatten step.
    Value { index: usize },
    /// Treat the value at `field` as a list of sibling record
    /// instances and extract each one.
    Records { field: usize },
}

/// Shared entry point for every selector. Selector bounds are checked
/// before any output is produced.
pub fn normalize(doc: &Document, selector: RootSelector) -> Result<Json> {
    let root = doc.root().ok_or(Error::MissingRoot)?;

    log::debug!(
        "Normalizing root \"{}\" ({} field(s)) with selector {selector:?}",
        root.name,
        root.fields.len()
    );

    match selector {
        RootSelector::Document => Ok(collapse_map(process_instance_at(root, 0)?)),
        RootSelector::Value { index } => {
            let field = root.fields.get(index).ok_or(Error::ValueIndexOutOfRange {
                index,
                len: root.fields.len(),
            })?;
            flatten_at(&field.value, ListCollapse::Singleton, 0)
        }
        RootSelector::Records { field } => {
            let selected = root.fields.get(field).ok_or(Error::FieldIndexOutOfRange {
                index: field,
                len: root.fields.len(),
            })?;
            let Value::Array(items) = &selected.value else {
                return Err(Error::NotARecordList(selected.name.clone()));
            };
            extract_records(items)
        }
    }
}

/// Reduce one node to its minimal JSON representation. The match is
/// the value classifier: total over the closed union, one branch per
/// variant, no unknown arm. Fails only on nesting past `MAX_DEPTH`.
pub fn flatten(value: &Value, lists: ListCollapse) -> Result<Json> {
    flatten_at(value, lists, 0)
}

fn flatten_at(value: &Value, lists: ListCollapse, depth: usize) -> Result<Json> {
    if depth > MAX_DEPTH {
        return Err(Error::TooDeep(MAX_DEPTH));
    }

    Ok(match value {
        Value::Object(inst) => match inst.single_field() {
            // Unwrap a single-field box; recursion makes this transitive.
            Some(field) => flatten_at(&field.value, lists, depth + 1)?,
            None => collapse_map(structural_map(inst, lists, depth)?),
        },
        Value::Array(items) => {
            let mut flat: Vec<Json> = items
                .iter()
                .map(|v| flatten_at(v, lists, depth + 1))
                .collect::<Result<_>>()?;
            if lists == ListCollapse::Singleton && flat.len() == 1 {
                flat.remove(0)
            } else {
                Json::Array(flat)
            }
        }
        Value::Vec3(v) => vec3_map(v),
        Value::Bool(v) => Json::Bool(*v),
        Value::S8(v) => Json::from(*v),
        Value::S16(v) => Json::from(*v),
        Value::S32(v) => Json::from(*v),
        Value::S64(v) => Json::from(*v),
        Value::U8(v) => Json::from(*v),
        Value::U16(v) => Json::from(*v),
        Value::U32(v) => Json::from(*v),
        Value::U64(v) => Json::from(*v),
        Value::F32(v) => float_json_f32(*v),
        Value::F64(v) => float_json(*v),
        Value::String(v) => Json::String(v.clone()),
        Value::Bytes(v) => Json::Array(v.iter().map(|b| Json::from(*b)).collect()),
    })
}

/// Field-by-field mapping of a record instance, with the `omit-empty`
/// rule applied: a field whose processed value is empty contributes
/// nothing, no explicit null is emitted.
pub fn process_instance(inst: &Instance) -> Result<Map<String, Json>> {
    process_instance_at(inst, 0)
}

fn process_instance_at(inst: &Instance, depth: usize) -> Result<Map<String, Json>> {
    let mut out = Map::new();

    for field in &inst.fields {
        let element = process_value_at(&field.value, depth + 1)?;

        if is_empty(&element) {
            continue;
        }

        out.insert(field.name.clone(), element);
    }

    Ok(out)
}

/// Per-field recursion: singleton lists collapse here, at the field
/// boundary, not inside `flatten`.
pub fn process_value(value: &Value) -> Result<Json> {
    process_value_at(value, 0)
}

fn process_value_at(value: &Value, depth: usize) -> Result<Json> {
    if depth > MAX_DEPTH {
        return Err(Error::TooDeep(MAX_DEPTH));
    }

    Ok(match value {
        Value::Array(items) => {
            let mut flat: Vec<Json> = items
                .iter()
                .map(|v| flatten_at(v, ListCollapse::Preserve, depth + 1))
                .collect::<Result<_>>()?;
            if flat.len() == 1 {
                flat.remove(0)
            } else {
                Json::Array(flat)
            }
        }
        Value::Object(child) => match child.single_field() {
            // A wrapper around a bare list: recurse so nested
            // single-value lists unwrap before flattening.
            Some(field) if matches!(field.value, Value::Array(_)) => {
                process_value_at(&field.value, depth + 1)?
            }
            _ => collapse_map(process_instance_at(child, depth + 1)?),
        },
        other => flatten_at(other, ListCollapse::Preserve, depth)?,
    })
}

/// Root-list extraction: one structural mapping per sibling instance,
/// empty records dropped, order preserved. No singleton collapse and no
/// one-entry-map collapse; records stay objects.
fn extract_records(items: &[Value]) -> Result<Json> {
    let mut records = Vec::new();

    for item in items {
        let Value::Object(inst) = item else {
            continue;
        };

        let map = structural_map(inst, ListCollapse::Preserve, 1)?;

        if !map.is_empty() {
            records.push(Json::Object(map));
        }
    }

    Ok(Json::Array(records))
}

fn structural_map(inst: &Instance, lists: ListCollapse, depth: usize) -> Result<Map<String, Json>> {
    inst.fields
        .iter()
        .map(|f| Ok((f.name.clone(), flatten_at(&f.value, lists, depth + 1)?)))
        .collect()
}

// A one-entry mapping collapses to its entry. This catches mappings
// produced by nested collapses, not just raw one-field instances.
fn collapse_map(map: Map<String, Json>) -> Json {
    match map.len() {
        1 => map.into_iter().next().map(|(_, v)| v).unwrap(),
        _ => Json::Object(map),
    }
}

// omit-empty: null, or an object that lost all of its fields.
fn is_empty(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn vec3_map(v: &Vec3) -> Json {
    let mut map = Map::new();
    map.insert("x".into(), float_json_f32(v.x));
    map.insert("y".into(), float_json_f32(v.y));
    map.insert("z".into(), float_json_f32(v.z));
    Json::Object(map)
}

// Widening f32 with `as f64` leaks binary noise into the rendering
// (0.1f32 becomes 0.10000000149011612); round-trip through the shortest
// decimal form so single-precision values print as written.
fn float_json_f32(v: f32) -> Json {
    v.to_string().parse::<f64>().map_or(Json::Null, float_json)
}

// Non-finite floats have no JSON representation; serialize as null.
fn float_json(v: f64) -> Json {
    Number::from_f64(v).map(Json::Number).unwrap_or(Json::Null)
}

// ------------------------------- Tests ------------------------------------ //
