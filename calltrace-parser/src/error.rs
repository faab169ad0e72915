//! Error types for the trace decoding library.

/// Decoding failures that stop the parser.
///
/// Tag-level variants are fatal because stream framing is lost once an
/// unknown tag is read; advisory conditions (incomplete calls, bitmask
/// flag ordering) are logged instead of surfaced here.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unrecognized container magic {0:#04x} {1:#04x}")]
    UnknownMagic(u8, u8),

    #[error("unsupported trace format version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u64, supported: u64 },

    #[error("unknown event tag {0:#04x}")]
    UnknownEvent(u8),

    #[error("unknown call detail tag {tag:#04x} in {function}")]
    UnknownCallDetail { tag: u8, function: String },

    #[error("unknown value tag {0:#04x}")]
    UnknownValueTag(u8),

    #[error("value nesting exceeds {0} levels")]
    ValueTooDeep(usize),
}

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, ParseError>;
