//! The streaming parser: event loop, enter/leave correlation and the
//! recursive value decoder.
//!
//! Calls are recorded as two separate events so that overlapping calls
//! from concurrent captors can interleave: ENTER carries the function
//! signature and arguments, LEAVE carries the call number and usually the
//! return value. A call is only emitted once its LEAVE is seen, so
//! emission order is LEAVE order, not call-number order.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use calltrace_protocol::sig::{BitmaskFlag, BitmaskSig, EnumSig, FunctionSig, StructSig};
use calltrace_protocol::wire::{CallDetailTag, EventTag, ValueTag, MAX_VERSION};
use calltrace_protocol::{Call, Value};

use crate::error::{ParseError, Result};
use crate::file::{open_trace_file, TraceFile};
use crate::reader::TraceReader;
use crate::sig_table::SigTable;

/// Hard bound on value nesting. Framing can no longer be trusted past
/// this, and unbounded recursion would overflow the stack first.
pub const MAX_VALUE_DEPTH: usize = 128;

/// Number of signatures interned so far in each namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignatureCounts {
    pub functions: usize,
    pub structs: usize,
    pub enums: usize,
    pub bitmasks: usize,
}

/// Streaming decoder over one trace file.
///
/// Forward-only and single-threaded; signature tables grow for the
/// parser's lifetime and decoded calls are owned by the caller.
pub struct Parser {
    reader: TraceReader,
    version: u64,
    next_call_no: u32,
    /// Calls whose ENTER has been seen but whose LEAVE has not.
    pending: Vec<Call>,
    functions: SigTable<FunctionSig>,
    structs: SigTable<StructSig>,
    enums: SigTable<EnumSig>,
    bitmasks: SigTable<BitmaskSig>,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("version", &self.version)
            .field("next_call_no", &self.next_call_no)
            .finish_non_exhaustive()
    }
}

impl Parser {
    /// Open a trace file, sniffing the container flavor and checking the
    /// stream version.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_file(open_trace_file(path)?)
    }

    /// Start parsing an already-opened byte source.
    pub fn from_file(file: Box<dyn TraceFile>) -> Result<Self> {
        let mut reader = TraceReader::new(file);
        let version = reader.read_uint()?;
        if version > MAX_VERSION {
            return Err(ParseError::UnsupportedVersion {
                found: version,
                supported: MAX_VERSION,
            });
        }
        debug!("opened trace stream, format version {}", version);
        Ok(Self {
            reader,
            version,
            next_call_no: 0,
            pending: Vec::new(),
            functions: SigTable::new(),
            structs: SigTable::new(),
            enums: SigTable::new(),
            bitmasks: SigTable::new(),
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Decode events until a call completes.
    ///
    /// Returns `Ok(None)` at end of stream; once that happens every later
    /// invocation reports end of stream as well. Calls still pending at
    /// EOF are logged and dropped.
    pub fn parse_call(&mut self) -> Result<Option<Call>> {
        loop {
            let Some(tag) = self.reader.read_byte()? else {
                self.drain_pending();
                return Ok(None);
            };
            match EventTag::from_u8(tag) {
                Some(EventTag::Enter) => self.parse_enter()?,
                Some(EventTag::Leave) => {
                    if let Some(call) = self.parse_leave()? {
                        return Ok(Some(call));
                    }
                }
                None => return Err(ParseError::UnknownEvent(tag)),
            }
        }
    }

    /// Explicit teardown; dropping the parser does the same.
    pub fn close(self) {}

    pub fn functions(&self) -> impl Iterator<Item = &Arc<FunctionSig>> {
        self.functions.iter()
    }

    pub fn structs(&self) -> impl Iterator<Item = &Arc<StructSig>> {
        self.structs.iter()
    }

    pub fn enums(&self) -> impl Iterator<Item = &Arc<EnumSig>> {
        self.enums.iter()
    }

    pub fn bitmasks(&self) -> impl Iterator<Item = &Arc<BitmaskSig>> {
        self.bitmasks.iter()
    }

    pub fn signature_counts(&self) -> SignatureCounts {
        SignatureCounts {
            functions: self.functions.len(),
            structs: self.structs.len(),
            enums: self.enums.len(),
            bitmasks: self.bitmasks.len(),
        }
    }

    /// ENTER: intern the function signature, number the call, and collect
    /// its details. The call is not emitted here; it waits for its LEAVE.
    fn parse_enter(&mut self) -> Result<()> {
        let Some(sig) = self.parse_function_sig()? else {
            return Ok(());
        };
        let mut call = Call::new(sig, self.next_call_no);
        self.next_call_no = self.next_call_no.wrapping_add(1);
        if self.parse_call_details(&mut call)? {
            debug!("enter #{} {}", call.no, call.name());
            self.pending.push(call);
        }
        Ok(())
    }

    /// LEAVE: match the call number against the pending registry, fold in
    /// the remaining details and emit.
    ///
    /// `Ok(None)` means nothing to emit yet: either the details were cut
    /// short by EOF or the matching ENTER was never seen. The event loop
    /// just keeps going; a truncated stream terminates on the next read.
    fn parse_leave(&mut self) -> Result<Option<Call>> {
        let call_no = self.reader.read_uint()?;
        let Some(index) = self
            .pending
            .iter()
            .position(|call| u64::from(call.no) == call_no)
        else {
            warn!("leave event for unknown call #{}, skipping", call_no);
            let sig = Arc::new(FunctionSig {
                id: u64::MAX,
                name: "<unmatched>".to_string(),
                arg_names: Vec::new(),
            });
            let mut orphan = Call::new(sig, call_no as u32);
            self.parse_call_details(&mut orphan)?;
            return Ok(None);
        };
        let mut call = self.pending.remove(index);
        if self.parse_call_details(&mut call)? {
            debug!("leave #{} {}", call.no, call.name());
            Ok(Some(call))
        } else {
            Ok(None)
        }
    }

    /// Detail stream shared by ENTER and LEAVE: `(index, value)` argument
    /// pairs and an optional return value, terminated by `CALL_END`.
    ///
    /// Returns false when EOF cut the details short; the caller discards
    /// the call.
    fn parse_call_details(&mut self, call: &mut Call) -> Result<bool> {
        loop {
            let Some(tag) = self.reader.read_byte()? else {
                return Ok(false);
            };
            match CallDetailTag::from_u8(tag) {
                Some(CallDetailTag::End) => return Ok(true),
                Some(CallDetailTag::Arg) => {
                    let index = self.reader.read_uint()?;
                    let Some(value) = self.parse_value(0)? else {
                        return Ok(false);
                    };
                    call.set_arg(index as usize, value);
                }
                Some(CallDetailTag::Ret) => {
                    let Some(value) = self.parse_value(0)? else {
                        return Ok(false);
                    };
                    call.ret = Some(value);
                }
                None => {
                    return Err(ParseError::UnknownCallDetail {
                        tag,
                        function: call.name().to_string(),
                    })
                }
            }
        }
    }

    /// One tagged value. `Ok(None)` means EOF took the tag or part of the
    /// payload; only the enclosing call is lost.
    fn parse_value(&mut self, depth: usize) -> Result<Option<Value>> {
        if depth >= MAX_VALUE_DEPTH {
            return Err(ParseError::ValueTooDeep(MAX_VALUE_DEPTH));
        }
        let Some(tag) = self.reader.read_byte()? else {
            return Ok(None);
        };
        let Some(tag) = ValueTag::from_u8(tag) else {
            return Err(ParseError::UnknownValueTag(tag));
        };
        let value = match tag {
            ValueTag::Null => Value::Null,
            ValueTag::False => Value::Bool(false),
            ValueTag::True => Value::Bool(true),
            ValueTag::SInt => {
                let raw = self.reader.read_uint()?;
                Value::SInt((raw as i64).wrapping_neg())
            }
            ValueTag::UInt => Value::UInt(self.reader.read_uint()?),
            ValueTag::Float => {
                let Some(bytes) = self.reader.read_array::<4>()? else {
                    return Ok(None);
                };
                Value::Float(f32::from_le_bytes(bytes))
            }
            ValueTag::Double => {
                let Some(bytes) = self.reader.read_array::<8>()? else {
                    return Ok(None);
                };
                Value::Double(f64::from_le_bytes(bytes))
            }
            ValueTag::String => {
                let Some(bytes) = self.reader.read_string()? else {
                    return Ok(None);
                };
                Value::String(bytes)
            }
            ValueTag::Blob => {
                let len = self.reader.read_uint()?;
                let Some(bytes) = self.reader.read_bytes(len)? else {
                    return Ok(None);
                };
                Value::Blob(bytes)
            }
            ValueTag::Enum => {
                let Some(sig) = self.parse_enum_sig(depth)? else {
                    return Ok(None);
                };
                Value::Enum(sig)
            }
            ValueTag::Bitmask => {
                let Some(sig) = self.parse_bitmask_sig()? else {
                    return Ok(None);
                };
                let value = self.reader.read_uint()?;
                Value::Bitmask(sig, value)
            }
            ValueTag::Array => {
                let len = self.reader.read_uint()?;
                let mut values = Vec::with_capacity(len.min(1024) as usize);
                for _ in 0..len {
                    let Some(value) = self.parse_value(depth + 1)? else {
                        return Ok(None);
                    };
                    values.push(value);
                }
                Value::Array(values)
            }
            ValueTag::Struct => {
                let Some(sig) = self.parse_struct_sig()? else {
                    return Ok(None);
                };
                let mut members = Vec::with_capacity(sig.member_names.len());
                for _ in 0..sig.member_names.len() {
                    let Some(value) = self.parse_value(depth + 1)? else {
                        return Ok(None);
                    };
                    members.push(value);
                }
                Value::Struct(sig, members)
            }
            ValueTag::Opaque => Value::Pointer(self.reader.read_uint()?),
        };
        Ok(Some(value))
    }

    /// Function signature reference, interning a definition body when one
    /// is present (see `sig_table`).
    fn parse_function_sig(&mut self) -> Result<Option<Arc<FunctionSig>>> {
        let id = self.reader.read_uint()?;
        let existing = self.functions.lookup(id);
        let offset = self.reader.offset();
        if existing.is_none() || self.functions.defined_at(offset) {
            let Some(name) = self.read_name()? else {
                return Ok(None);
            };
            let num_args = self.reader.read_uint()?;
            let mut arg_names = Vec::new();
            for _ in 0..num_args {
                let Some(arg) = self.read_name()? else {
                    return Ok(None);
                };
                arg_names.push(arg);
            }
            return Ok(Some(match existing {
                Some(sig) => {
                    debug!("re-emitted signature for function {}, keeping first", id);
                    sig
                }
                None => {
                    let sig = Arc::new(FunctionSig {
                        id,
                        name,
                        arg_names,
                    });
                    self.functions.insert(id, sig.clone(), offset);
                    sig
                }
            }));
        }
        Ok(existing)
    }

    fn parse_struct_sig(&mut self) -> Result<Option<Arc<StructSig>>> {
        let id = self.reader.read_uint()?;
        let existing = self.structs.lookup(id);
        let offset = self.reader.offset();
        if existing.is_none() || self.structs.defined_at(offset) {
            let Some(name) = self.read_name()? else {
                return Ok(None);
            };
            let num_members = self.reader.read_uint()?;
            let mut member_names = Vec::new();
            for _ in 0..num_members {
                let Some(member) = self.read_name()? else {
                    return Ok(None);
                };
                member_names.push(member);
            }
            return Ok(Some(match existing {
                Some(sig) => {
                    debug!("re-emitted signature for struct {}, keeping first", id);
                    sig
                }
                None => {
                    let sig = Arc::new(StructSig {
                        id,
                        name,
                        member_names,
                    });
                    self.structs.insert(id, sig.clone(), offset);
                    sig
                }
            }));
        }
        Ok(existing)
    }

    /// Enum body: a name plus a full tagged value that is folded into the
    /// signed constant and dropped as an object.
    fn parse_enum_sig(&mut self, depth: usize) -> Result<Option<Arc<EnumSig>>> {
        let id = self.reader.read_uint()?;
        let existing = self.enums.lookup(id);
        let offset = self.reader.offset();
        if existing.is_none() || self.enums.defined_at(offset) {
            let Some(name) = self.read_name()? else {
                return Ok(None);
            };
            let Some(value) = self.parse_value(depth + 1)? else {
                return Ok(None);
            };
            let value = value.to_sint().unwrap_or_else(|| {
                warn!("enum {} bound to a non-integer value", name);
                0
            });
            return Ok(Some(match existing {
                Some(sig) => {
                    debug!("re-emitted signature for enum {}, keeping first", id);
                    sig
                }
                None => {
                    let sig = Arc::new(EnumSig { id, name, value });
                    self.enums.insert(id, sig.clone(), offset);
                    sig
                }
            }));
        }
        Ok(existing)
    }

    fn parse_bitmask_sig(&mut self) -> Result<Option<Arc<BitmaskSig>>> {
        let id = self.reader.read_uint()?;
        let existing = self.bitmasks.lookup(id);
        let offset = self.reader.offset();
        if existing.is_none() || self.bitmasks.defined_at(offset) {
            let num_flags = self.reader.read_uint()?;
            let mut flags = Vec::new();
            for i in 0..num_flags {
                let Some(name) = self.read_name()? else {
                    return Ok(None);
                };
                let value = self.reader.read_uint()?;
                if value == 0 && i != 0 {
                    warn!("bitmask flag {} is zero but is not first", name);
                }
                flags.push(BitmaskFlag { name, value });
            }
            return Ok(Some(match existing {
                Some(sig) => {
                    debug!("re-emitted signature for bitmask {}, keeping first", id);
                    sig
                }
                None => {
                    let sig = Arc::new(BitmaskSig { id, flags });
                    self.bitmasks.insert(id, sig.clone(), offset);
                    sig
                }
            }));
        }
        Ok(existing)
    }

    /// Wire strings are opaque bytes; signature names are conventionally
    /// text, so lossy-decode them once at intern time.
    fn read_name(&mut self) -> Result<Option<String>> {
        let Some(bytes) = self.reader.read_string()? else {
            return Ok(None);
        };
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn drain_pending(&mut self) {
        for call in self.pending.drain(..) {
            warn!(
                "incomplete call #{} {}: stream ended before its leave event",
                call.no,
                call.name()
            );
        }
    }
}

impl Drop for Parser {
    fn drop(&mut self) {
        self.drain_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::testing::MemTraceFile;

    fn uv(buf: &mut Vec<u8>, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                buf.push(byte);
                return;
            }
            buf.push(byte | 0x80);
        }
    }

    fn string(buf: &mut Vec<u8>, s: &str) {
        uv(buf, s.len() as u64);
        buf.extend_from_slice(s.as_bytes());
    }

    fn parser(bytes: Vec<u8>) -> Parser {
        Parser::from_file(Box::new(MemTraceFile::new(bytes))).unwrap()
    }

    /// `ENTER id "foo"() CALL_END LEAVE no CALL_END` with a full signature
    /// body.
    fn enter_leave_with_body(buf: &mut Vec<u8>, id: u64, no: u64) {
        buf.push(EventTag::Enter as u8);
        uv(buf, id);
        string(buf, "foo");
        uv(buf, 0);
        buf.push(CallDetailTag::End as u8);
        buf.push(EventTag::Leave as u8);
        uv(buf, no);
        buf.push(CallDetailTag::End as u8);
    }

    #[test]
    fn version_gate_rejects_future_streams() {
        let mut buf = Vec::new();
        uv(&mut buf, MAX_VERSION + 1);
        let err = Parser::from_file(Box::new(MemTraceFile::new(buf))).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnsupportedVersion { found, .. } if found == MAX_VERSION + 1
        ));
    }

    #[test]
    fn unknown_event_tag_is_fatal() {
        let mut buf = vec![0u8]; // version
        buf.push(0x7f);
        let err = parser(buf).parse_call().unwrap_err();
        assert!(matches!(err, ParseError::UnknownEvent(0x7f)));
    }

    #[test]
    fn reemitted_body_is_consumed_and_discarded() {
        let mut buf = vec![0u8]; // version
        enter_leave_with_body(&mut buf, 0, 0);
        // Second emission repeats the full body at a fresh offset.
        let second_body_offset = buf.len() as u64 + 2; // past ENTER tag and id
        enter_leave_with_body(&mut buf, 0, 1);

        let mut p = parser(buf);
        let first = p.parse_call().unwrap().unwrap();
        p.functions.mark_defined_at(second_body_offset);
        let second = p.parse_call().unwrap().unwrap();

        assert_eq!(first.no, 0);
        assert_eq!(second.no, 1);
        assert!(Arc::ptr_eq(&first.sig, &second.sig));
        assert_eq!(p.signature_counts().functions, 1);
    }

    #[test]
    fn interned_reference_reuses_signature() {
        let mut buf = vec![0u8]; // version
        enter_leave_with_body(&mut buf, 0, 0);
        // Body-less reference: just the id.
        buf.push(EventTag::Enter as u8);
        uv(&mut buf, 0);
        buf.push(CallDetailTag::End as u8);
        buf.push(EventTag::Leave as u8);
        uv(&mut buf, 1);
        buf.push(CallDetailTag::End as u8);

        let mut p = parser(buf);
        let first = p.parse_call().unwrap().unwrap();
        let second = p.parse_call().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first.sig, &second.sig));
        assert_eq!(second.no, 1);
    }

    #[test]
    fn nesting_limit_is_fatal_not_a_stack_overflow() {
        let mut buf = vec![0u8]; // version
        buf.push(EventTag::Enter as u8);
        uv(&mut buf, 0);
        string(&mut buf, "deep");
        uv(&mut buf, 0);
        buf.push(CallDetailTag::Arg as u8);
        uv(&mut buf, 0);
        for _ in 0..=MAX_VALUE_DEPTH {
            buf.push(ValueTag::Array as u8);
            uv(&mut buf, 1);
        }
        buf.push(ValueTag::Null as u8);

        let err = parser(buf).parse_call().unwrap_err();
        assert!(matches!(err, ParseError::ValueTooDeep(_)));
    }

    #[test]
    fn call_numbers_count_every_enter() {
        let mut buf = vec![0u8]; // version
        enter_leave_with_body(&mut buf, 0, 0);
        // Two overlapping body-less calls, left second then first.
        for _ in 0..2 {
            buf.push(EventTag::Enter as u8);
            uv(&mut buf, 0);
            buf.push(CallDetailTag::End as u8);
        }
        buf.push(EventTag::Leave as u8);
        uv(&mut buf, 2);
        buf.push(CallDetailTag::End as u8);
        buf.push(EventTag::Leave as u8);
        uv(&mut buf, 1);
        buf.push(CallDetailTag::End as u8);

        let mut p = parser(buf);
        let nos: Vec<u32> = std::iter::from_fn(|| p.parse_call().unwrap())
            .map(|call| call.no)
            .collect();
        assert_eq!(nos, vec![0, 2, 1]);
    }

    #[test]
    fn unmatched_leave_is_skipped() {
        let mut buf = vec![0u8]; // version
        buf.push(EventTag::Leave as u8);
        uv(&mut buf, 9);
        buf.push(CallDetailTag::End as u8);
        enter_leave_with_body(&mut buf, 0, 0);

        let mut p = parser(buf);
        let call = p.parse_call().unwrap().unwrap();
        assert_eq!(call.no, 0);
        assert_eq!(call.name(), "foo");
    }
}
