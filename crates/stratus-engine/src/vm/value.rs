//! Runtime values
//!
//! Every integer width lives in a single `i64` on the operand stack; the
//! declared width only matters when a value is stored into object bytes.
//! Floats of both widths are carried as `f64`, with f32 operations
//! rounding their results.

use super::{VmError, VmResult};
use std::fmt;

/// Handle of a heap object
///
/// A non-owning reference: liveness is decided by the collector, never by
/// the value holding the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(pub u32);

impl ObjectRef {
    /// Encoding inside object bytes; 0 is reserved for null
    pub fn to_bits(self) -> u64 {
        u64::from(self.0) + 1
    }

    pub fn from_bits(bits: u64) -> Option<ObjectRef> {
        bits.checked_sub(1)
            .and_then(|h| u32::try_from(h).ok())
            .map(ObjectRef)
    }
}

/// A VM value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Object(ObjectRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Object(_) => "object",
        }
    }

    fn mismatch(&self, expected: &'static str) -> VmError {
        VmError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    pub fn as_int(&self) -> VmResult<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_float(&self) -> VmResult<f64> {
        match self {
            Value::Float(v) => Ok(*v),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_bool(&self) -> VmResult<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(other.mismatch("bool")),
        }
    }

    /// Object handle; dereferencing null is an error
    pub fn as_object(&self) -> VmResult<ObjectRef> {
        match self {
            Value::Object(r) => Ok(*r),
            Value::Null => Err(VmError::NullDereference),
            other => Err(other.mismatch("object")),
        }
    }

    pub fn object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(r) => Some(*r),
            _ => None,
        }
    }

    /// Equality used by `Eq`/`Ne`: references compare by identity
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Null => write!(f, "null"),
            Value::Object(r) => write!(f, "<object #{}>", r.0),
        }
    }
}
