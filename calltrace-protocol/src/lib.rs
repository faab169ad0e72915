//! Calltrace Protocol Library
//!
//! Defines the on-disk call trace format: the tag-byte constants of the
//! event stream, the interned signature descriptors, and the tagged value
//! model that decoded calls are made of.

pub mod call;
pub mod sig;
pub mod value;
pub mod wire;

pub use call::Call;
pub use sig::{BitmaskFlag, BitmaskSig, EnumSig, FunctionSig, StructSig};
pub use value::Value;
pub use wire::{CallDetailTag, EventTag, ValueTag, MAX_VERSION};
