//! A single recorded invocation.

use std::fmt;
use std::sync::Arc;

use crate::sig::FunctionSig;
use crate::value::Value;

/// A completed call: sequence number, function signature, sparse argument
/// values and optional return value.
///
/// `args` is indexed by argument position. The wire format carries
/// `(index, value)` pairs, so positions never written stay `None`.
#[derive(Debug, Clone)]
pub struct Call {
    pub no: u32,
    pub sig: Arc<FunctionSig>,
    pub args: Vec<Option<Value>>,
    pub ret: Option<Value>,
}

impl Call {
    pub fn new(sig: Arc<FunctionSig>, no: u32) -> Self {
        Self {
            no,
            sig,
            args: Vec::new(),
            ret: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.sig.name
    }

    /// Argument at `index`, if that position was written.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index).and_then(Option::as_ref)
    }

    /// Store an argument at `index`, growing the sparse vector as needed.
    pub fn set_arg(&mut self, index: usize, value: Value) {
        if index >= self.args.len() {
            self.args.resize(index + 1, None);
        }
        self.args[index] = Some(value);
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.no, self.sig.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.sig.arg_names.get(i) {
                Some(name) => write!(f, "{name} = ")?,
                None => write!(f, "arg{i} = ")?,
            }
            match arg {
                Some(value) => write!(f, "{value}")?,
                None => write!(f, "?")?,
            }
        }
        write!(f, ")")?;
        if let Some(ret) = &self.ret {
            write!(f, " = {ret}")?;
        }
        Ok(())
    }
}
