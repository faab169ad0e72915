//! Deflate container flavor: one gzip member around the whole stream.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

use super::{read_full, Offset, TraceFile};

/// Byte source over a gzip-compressed trace.
pub struct GzipTraceFile {
    inner: GzDecoder<BufReader<File>>,
    offset: Offset,
}

impl GzipTraceFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            inner: GzDecoder::new(BufReader::new(file)),
            offset: 0,
        })
    }
}

impl TraceFile for GzipTraceFile {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        if read_full(&mut self.inner, &mut byte)? == 0 {
            return Ok(None);
        }
        self.offset += 1;
        Ok(Some(byte[0]))
    }

    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let got = read_full(&mut self.inner, dst)?;
        self.offset += got as Offset;
        Ok(got)
    }

    fn offset(&self) -> Offset {
        self.offset
    }
}
