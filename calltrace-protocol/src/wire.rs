//! Wire-level constants of the call trace stream.
//!
//! A trace file is a compressed container around a byte stream of
//! `version (varint)` followed by events. Every tag below is a single byte
//! on the wire; the numeric assignments are part of the format and must
//! not change.

/// Newest stream format version this crate understands.
///
/// The version is the first varint of the decompressed stream and is
/// checked once at open time.
pub const MAX_VERSION: u64 = 1;

/// Leading magic bytes of the container flavors.
pub mod magic {
    /// Deflate flavor: a standard gzip member wraps the whole stream.
    pub const GZIP: [u8; 2] = [0x1f, 0x8b];
    /// Block-compressed flavor: a sequence of length-prefixed snappy chunks.
    pub const SNAPPY: [u8; 2] = *b"at";
}

/// Top-level event tags.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTag {
    /// A call begins: function signature reference plus call details.
    Enter = 0,
    /// A call ends: call number plus call details.
    Leave = 1,
}

impl EventTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Enter),
            1 => Some(Self::Leave),
            _ => None,
        }
    }
}

/// Tags of the call-detail stream nested inside ENTER and LEAVE events.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDetailTag {
    /// Terminates the detail stream.
    End = 0,
    /// `(index: varint, value)` pair; indices may arrive in any order.
    Arg = 1,
    /// A single return value.
    Ret = 2,
}

impl CallDetailTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::End),
            1 => Some(Self::Arg),
            2 => Some(Self::Ret),
            _ => None,
        }
    }
}

/// Leading tag byte of every encoded value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    Null = 0,
    False = 1,
    True = 2,
    /// Negated unsigned varint.
    SInt = 3,
    UInt = 4,
    /// 4 raw bytes, little-endian IEEE-754 binary32.
    Float = 5,
    /// 8 raw bytes, little-endian IEEE-754 binary64.
    Double = 6,
    /// Length-prefixed bytes, conventionally text.
    String = 7,
    /// Length-prefixed opaque bytes.
    Blob = 8,
    /// Enum signature reference.
    Enum = 9,
    /// Bitmask signature reference followed by the runtime value.
    Bitmask = 10,
    /// Length-prefixed sequence of values.
    Array = 11,
    /// Struct signature reference followed by one value per member.
    Struct = 12,
    /// 64-bit address-like handle.
    Opaque = 13,
}

impl ValueTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Null),
            1 => Some(Self::False),
            2 => Some(Self::True),
            3 => Some(Self::SInt),
            4 => Some(Self::UInt),
            5 => Some(Self::Float),
            6 => Some(Self::Double),
            7 => Some(Self::String),
            8 => Some(Self::Blob),
            9 => Some(Self::Enum),
            10 => Some(Self::Bitmask),
            11 => Some(Self::Array),
            12 => Some(Self::Struct),
            13 => Some(Self::Opaque),
            _ => None,
        }
    }
}
