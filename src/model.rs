// Typed instance-tree model. No serde_json::Value here; the closed
// union is decided once at deserialization, dispatch is a plain match.

use serde::Deserialize;

/// A root container: the ordered top-level instances of one document.
/// The first instance is the entry point for normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub instances: Vec<Instance>,
}

impl Document {
    pub fn root(&self) -> Option<&Instance> {
        self.instances.first()
    }
}

/// One typed node: a source type name plus ordered named fields.
/// Field order is declaration order and is never sorted.
#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub name: String,
    pub fields: Vec<Field>,
}

impl Instance {
    /// The single field of a one-field wrapper, if this is one.
    pub fn single_field(&self) -> Option<&Field> {
        match self.fields.as_slice() {
            [field] => Some(field),
            _ => None,
        }
    }
}

/// A named slot. Keeping the name and value paired makes a
/// name/value count mismatch unrepresentable.
#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

/// Closed value union. Externally tagged on the wire with lowercase
/// variant names, e.g. `{"s32": 5}`, `{"array": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    S8(i8),
    S16(i16),
    S32(i32),
    S64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Vec3(Vec3),
    Array(Vec<Value>),
    Object(Instance),
}

/// Compound numeric: a fixed-arity spatial vector with no field
/// metadata, only positional components.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

// ------------------------------- Tests ------------------------------------ //
