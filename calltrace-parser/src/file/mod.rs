//! Byte sources over the two compressed container flavors.
//!
//! Trace files are always compressed. The flavor is picked by sniffing the
//! leading magic bytes: a gzip member wraps the whole stream in the
//! deflate flavor, anything else must be the block-compressed flavor with
//! its own `b"at"` magic.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::debug;

use calltrace_protocol::wire::magic;

use crate::error::{ParseError, Result};

mod gzip;
mod snappy;

pub use gzip::GzipTraceFile;
pub use snappy::SnappyTraceFile;

/// Position in the decompressed stream.
///
/// Counts decompressed bytes consumed, so it is unique and monotone within
/// one parsing session. The signature tables use it as a dictionary key;
/// nothing promises stability across sessions.
pub type Offset = u64;

/// A forward-only reader over the decompressed trace stream.
pub trait TraceFile {
    /// Next byte, or `None` at end of stream.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Fill `dst` as far as the stream allows; short count means EOF.
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize>;

    /// Current position in the decompressed stream.
    fn offset(&self) -> Offset;
}

/// Open `path`, sniff the container magic and pick the decompressor.
pub fn open_trace_file(path: &Path) -> Result<Box<dyn TraceFile>> {
    let mut file = File::open(path)?;
    let mut head = [0u8; 2];
    let got = read_full(&mut file, &mut head)?;
    if got >= 2 && head == magic::GZIP {
        debug!("opening deflate-flavor trace: {}", path.display());
        return Ok(Box::new(GzipTraceFile::open(path)?));
    }
    if got >= 2 && head == magic::SNAPPY {
        debug!("opening block-compressed trace: {}", path.display());
        return Ok(Box::new(SnappyTraceFile::from_file(file)?));
    }
    Err(ParseError::UnknownMagic(head[0], head[1]))
}

/// Read until `dst` is full or the reader runs dry.
pub(crate) fn read_full(reader: &mut impl Read, dst: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < dst.len() {
        match reader.read(&mut dst[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
