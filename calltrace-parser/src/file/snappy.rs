//! Block-compressed container flavor.
//!
//! After the `b"at"` magic the file is a sequence of chunks, each a
//! `compressed_len: u32 LE` header followed by that many bytes of raw
//! snappy block data. Writers emit at most 1 MiB of uncompressed data per
//! chunk.

use std::fs::File;
use std::io::{self, BufReader};

use snap::raw::{decompress_len, Decoder};
use tracing::debug;

use super::{read_full, Offset, TraceFile};

/// Upper bound on a single decompressed chunk; larger headers mean a
/// corrupt file, not a bigger buffer.
const MAX_CHUNK_LEN: usize = 16 * 1024 * 1024;

/// Byte source over a block-compressed trace.
pub struct SnappyTraceFile {
    file: BufReader<File>,
    decoder: Decoder,
    /// Current decompressed chunk and the cursor into it.
    chunk: Vec<u8>,
    pos: usize,
    offset: Offset,
}

impl SnappyTraceFile {
    /// Takes a file already positioned past the two magic bytes.
    pub fn from_file(file: File) -> io::Result<Self> {
        Ok(Self {
            file: BufReader::new(file),
            decoder: Decoder::new(),
            chunk: Vec::new(),
            pos: 0,
            offset: 0,
        })
    }

    /// Load the next chunk. Returns false at a clean end of file.
    fn refill(&mut self) -> io::Result<bool> {
        let mut header = [0u8; 4];
        let got = read_full(&mut self.file, &mut header)?;
        if got == 0 {
            return Ok(false);
        }
        if got < header.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated chunk header",
            ));
        }
        let compressed_len = u32::from_le_bytes(header) as usize;
        let mut compressed = vec![0u8; compressed_len];
        if read_full(&mut self.file, &mut compressed)? < compressed_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated chunk body",
            ));
        }

        let uncompressed_len = decompress_len(&compressed)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if uncompressed_len > MAX_CHUNK_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("chunk claims {uncompressed_len} decompressed bytes"),
            ));
        }
        self.chunk = self
            .decoder
            .decompress_vec(&compressed)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.pos = 0;
        debug!(
            "loaded chunk: {} compressed -> {} bytes",
            compressed_len,
            self.chunk.len()
        );
        Ok(true)
    }

    fn remaining(&self) -> usize {
        self.chunk.len() - self.pos
    }
}

impl TraceFile for SnappyTraceFile {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        while self.remaining() == 0 {
            if !self.refill()? {
                return Ok(None);
            }
        }
        let byte = self.chunk[self.pos];
        self.pos += 1;
        self.offset += 1;
        Ok(Some(byte))
    }

    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            if self.remaining() == 0 && !self.refill()? {
                break;
            }
            let take = self.remaining().min(dst.len() - filled);
            dst[filled..filled + take].copy_from_slice(&self.chunk[self.pos..self.pos + take]);
            self.pos += take;
            filled += take;
        }
        self.offset += filled as Offset;
        Ok(filled)
    }

    fn offset(&self) -> Offset {
        self.offset
    }
}
