//! Interned signature descriptors.
//!
//! Each kind of signature lives in its own id namespace and is transmitted
//! in full only once per stream; later references carry just the id. The
//! parser shares descriptors via `Arc`, so every value decoded against the
//! same id points at the same descriptor.

use serde::{Deserialize, Serialize};

/// Descriptor of a recorded function: name plus argument names in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSig {
    pub id: u64,
    pub name: String,
    pub arg_names: Vec<String>,
}

/// Descriptor of a struct value: member names in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructSig {
    pub id: u64,
    pub name: String,
    pub member_names: Vec<String>,
}

/// Descriptor binding one named enum constant to its signed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumSig {
    pub id: u64,
    pub name: String,
    pub value: i64,
}

/// One named flag of a bitmask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitmaskFlag {
    pub name: String,
    pub value: u64,
}

/// Descriptor of a bitmask: its flags in declaration order.
///
/// A flag whose value is zero is expected to come first so that rendering
/// a zero bitmask can name it; violations are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitmaskSig {
    pub id: u64,
    pub flags: Vec<BitmaskFlag>,
}
