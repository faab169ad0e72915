//! Tagged value model.
//!
//! Every argument and return value decoded from a trace is one of these
//! variants. Aggregate variants reference their signature descriptors via
//! `Arc`, shared with the parser's interning tables.

use std::fmt;
use std::sync::Arc;

use crate::sig::{BitmaskSig, EnumSig, StructSig};

/// A decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Signed integer, wire-encoded as the negation of an unsigned varint.
    SInt(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    /// Raw bytes, conventionally text but not guaranteed NUL-free.
    String(Vec<u8>),
    Enum(Arc<EnumSig>),
    /// Bitmask descriptor plus the runtime value.
    Bitmask(Arc<BitmaskSig>, u64),
    Array(Vec<Value>),
    /// Struct descriptor plus one value per member in declaration order.
    Struct(Arc<StructSig>, Vec<Value>),
    Blob(Vec<u8>),
    /// Address-like handle preserved without interpretation.
    Pointer(u64),
}

impl Value {
    /// Coerce to a signed integer, as enum signature bodies require.
    pub fn to_sint(&self) -> Option<i64> {
        match self {
            Value::SInt(v) => Some(*v),
            Value::UInt(v) => Some(*v as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Coerce to an unsigned integer.
    pub fn to_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::SInt(v) => Some(*v as u64),
            Value::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::SInt(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(bytes) => write!(f, "\"{}\"", String::from_utf8_lossy(bytes)),
            Value::Enum(sig) => write!(f, "{}", sig.name),
            Value::Bitmask(sig, value) => write_bitmask(f, sig, *value),
            Value::Array(values) => {
                write!(f, "{{")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "}}")
            }
            Value::Struct(sig, members) => {
                write!(f, "{{")?;
                for (i, value) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match sig.member_names.get(i) {
                        Some(name) => write!(f, "{name} = {value}")?,
                        None => write!(f, "{value}")?,
                    }
                }
                write!(f, "}}")
            }
            Value::Blob(bytes) => write!(f, "blob({})", bytes.len()),
            Value::Pointer(0) => write!(f, "NULL"),
            Value::Pointer(addr) => write!(f, "{addr:#x}"),
        }
    }
}

/// Render a bitmask as `FLAG_A | FLAG_B`, with any bits not covered by the
/// declared flags appended in hex.
fn write_bitmask(f: &mut fmt::Formatter<'_>, sig: &BitmaskSig, value: u64) -> fmt::Result {
    if value == 0 {
        if let Some(zero) = sig.flags.iter().find(|flag| flag.value == 0) {
            return write!(f, "{}", zero.name);
        }
        return write!(f, "0");
    }

    let mut remaining = value;
    let mut first = true;
    for flag in &sig.flags {
        if flag.value != 0 && remaining & flag.value == flag.value {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{}", flag.name)?;
            remaining &= !flag.value;
            first = false;
        }
    }
    if remaining != 0 {
        if !first {
            write!(f, " | ")?;
        }
        write!(f, "{remaining:#x}")?;
    }
    Ok(())
}
