//! Streaming decoder for compressed call trace files.
//!
//! A trace file records a stream of API calls captured from an
//! instrumented host: interleaved ENTER/LEAVE events carrying varint-coded
//! arguments, return values and interned type signatures. [`Parser`]
//! consumes the decompressed byte stream forward-only and emits one
//! [`Call`](calltrace_protocol::Call) per LEAVE event.
//!
//! ```no_run
//! use calltrace_parser::Parser;
//!
//! # fn main() -> calltrace_parser::Result<()> {
//! let mut parser = Parser::open("app.trace".as_ref())?;
//! while let Some(call) = parser.parse_call()? {
//!     println!("{call}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod file;
mod parser;
mod reader;
mod sig_table;

pub use error::{ParseError, Result};
pub use file::{open_trace_file, Offset, TraceFile};
pub use parser::{Parser, SignatureCounts, MAX_VALUE_DEPTH};
