//! Shared test helpers: hand-encoded trace streams and on-disk containers.
#![allow(dead_code)]

use std::io::Write;

use calltrace_protocol::wire::{magic, CallDetailTag, EventTag, ValueTag};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

/// Builds the decompressed event stream byte by byte.
pub struct StreamBuilder {
    buf: Vec<u8>,
}

impl StreamBuilder {
    pub fn new(version: u64) -> Self {
        let mut builder = Self { buf: Vec::new() };
        builder.uv(version);
        builder
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn raw(&mut self, byte: u8) -> &mut Self {
        self.buf.push(byte);
        self
    }

    pub fn uv(&mut self, mut value: u64) -> &mut Self {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return self;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        self.uv(s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// ENTER with a full function signature body.
    pub fn enter_with_sig(&mut self, id: u64, name: &str, arg_names: &[&str]) -> &mut Self {
        self.raw(EventTag::Enter as u8).uv(id).string(name);
        self.uv(arg_names.len() as u64);
        for arg in arg_names {
            self.string(arg);
        }
        self
    }

    /// ENTER referencing an already-interned function signature.
    pub fn enter_ref(&mut self, id: u64) -> &mut Self {
        self.raw(EventTag::Enter as u8).uv(id)
    }

    pub fn leave(&mut self, no: u64) -> &mut Self {
        self.raw(EventTag::Leave as u8).uv(no)
    }

    pub fn call_end(&mut self) -> &mut Self {
        self.raw(CallDetailTag::End as u8)
    }

    /// Argument header; the value is appended by the caller.
    pub fn call_arg(&mut self, index: u64) -> &mut Self {
        self.raw(CallDetailTag::Arg as u8).uv(index)
    }

    /// Return-value header; the value is appended by the caller.
    pub fn call_ret(&mut self) -> &mut Self {
        self.raw(CallDetailTag::Ret as u8)
    }

    pub fn value_null(&mut self) -> &mut Self {
        self.raw(ValueTag::Null as u8)
    }

    pub fn value_bool(&mut self, b: bool) -> &mut Self {
        let tag = if b { ValueTag::True } else { ValueTag::False };
        self.raw(tag as u8)
    }

    pub fn value_uint(&mut self, v: u64) -> &mut Self {
        self.raw(ValueTag::UInt as u8).uv(v)
    }

    /// Wire stores the negation of an unsigned varint.
    pub fn value_sint(&mut self, v: i64) -> &mut Self {
        self.raw(ValueTag::SInt as u8).uv(v.wrapping_neg() as u64)
    }

    pub fn value_float(&mut self, v: f32) -> &mut Self {
        self.raw(ValueTag::Float as u8);
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn value_double(&mut self, v: f64) -> &mut Self {
        self.raw(ValueTag::Double as u8);
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn value_string(&mut self, s: &str) -> &mut Self {
        self.raw(ValueTag::String as u8).string(s)
    }

    pub fn value_blob(&mut self, bytes: &[u8]) -> &mut Self {
        self.raw(ValueTag::Blob as u8).uv(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn value_pointer(&mut self, addr: u64) -> &mut Self {
        self.raw(ValueTag::Opaque as u8).uv(addr)
    }

    /// Array header; `len` element values are appended by the caller.
    pub fn value_array(&mut self, len: u64) -> &mut Self {
        self.raw(ValueTag::Array as u8).uv(len)
    }

    /// Enum with a full signature body; the bound value is appended by the
    /// caller.
    pub fn value_enum_new(&mut self, id: u64, name: &str) -> &mut Self {
        self.raw(ValueTag::Enum as u8).uv(id).string(name)
    }

    pub fn value_enum_ref(&mut self, id: u64) -> &mut Self {
        self.raw(ValueTag::Enum as u8).uv(id)
    }

    /// Bitmask with a full signature body plus the runtime value.
    pub fn value_bitmask_new(&mut self, id: u64, flags: &[(&str, u64)], value: u64) -> &mut Self {
        self.raw(ValueTag::Bitmask as u8).uv(id);
        self.uv(flags.len() as u64);
        for (name, flag_value) in flags {
            self.string(name).uv(*flag_value);
        }
        self.uv(value)
    }

    pub fn value_bitmask_ref(&mut self, id: u64, value: u64) -> &mut Self {
        self.raw(ValueTag::Bitmask as u8).uv(id).uv(value)
    }

    /// Struct with a full signature body; member values are appended by
    /// the caller.
    pub fn value_struct_new(&mut self, id: u64, name: &str, members: &[&str]) -> &mut Self {
        self.raw(ValueTag::Struct as u8).uv(id).string(name);
        self.uv(members.len() as u64);
        for member in members {
            self.string(member);
        }
        self
    }

    pub fn value_struct_ref(&mut self, id: u64) -> &mut Self {
        self.raw(ValueTag::Struct as u8).uv(id)
    }
}

/// Write `stream` into a gzip-flavor trace file.
pub fn gzip_file(stream: &[u8]) -> NamedTempFile {
    let file = NamedTempFile::new().expect("create temp file");
    let mut encoder = GzEncoder::new(file.reopen().expect("reopen"), Compression::default());
    encoder.write_all(stream).expect("compress");
    encoder.finish().expect("finish gzip member");
    file
}

/// Write `stream` into a block-compressed trace file, splitting it into
/// chunks of at most `chunk_len` decompressed bytes.
pub fn snappy_file(stream: &[u8], chunk_len: usize) -> NamedTempFile {
    let file = NamedTempFile::new().expect("create temp file");
    let mut out = file.reopen().expect("reopen");
    out.write_all(&magic::SNAPPY).expect("magic");
    let mut encoder = snap::raw::Encoder::new();
    for chunk in stream.chunks(chunk_len.max(1)) {
        let compressed = encoder.compress_vec(chunk).expect("compress chunk");
        out.write_all(&(compressed.len() as u32).to_le_bytes())
            .expect("chunk header");
        out.write_all(&compressed).expect("chunk body");
    }
    file
}
