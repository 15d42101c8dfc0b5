//! Prepared native calls
//!
//! Each foreign function gets a libffi call descriptor built once at VM
//! startup. Scalars map to the native type of the same width; references
//! are passed as raw pointers into the object's bytes.

use super::loader::{resolve, LoadError};
use crate::compiler::bytecode::ForeignFunction;
use crate::compiler::layout::SlotKind;
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};
use libffi::middle::{Arg, Cif, CodePtr, Type};
use std::ffi::c_void;

/// An argument converted to its native representation
#[derive(Debug, Clone, Copy)]
pub enum RawArg {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Ptr(*mut c_void),
}

impl RawArg {
    /// Convert a scalar; references are handled by the caller, which owns the heap
    pub fn scalar(kind: SlotKind, value: Value) -> VmResult<RawArg> {
        Ok(match (kind, value) {
            (SlotKind::I8, Value::Int(v)) => RawArg::I8(v as i8),
            (SlotKind::I16, Value::Int(v)) => RawArg::I16(v as i16),
            (SlotKind::I32, Value::Int(v)) => RawArg::I32(v as i32),
            (SlotKind::I64, Value::Int(v)) => RawArg::I64(v),
            (SlotKind::U8, Value::Int(v)) => RawArg::U8(v as u8),
            (SlotKind::U16, Value::Int(v)) => RawArg::U16(v as u16),
            (SlotKind::U32, Value::Int(v)) => RawArg::U32(v as u32),
            (SlotKind::U64, Value::Int(v)) => RawArg::U64(v as u64),
            (SlotKind::F32, Value::Float(v)) => RawArg::F32(v as f32),
            (SlotKind::F64, Value::Float(v)) => RawArg::F64(v),
            (SlotKind::Bool, Value::Bool(v)) => RawArg::U8(u8::from(v)),
            (SlotKind::Ref | SlotKind::Null, Value::Null) => RawArg::Ptr(std::ptr::null_mut()),
            (kind, value) => {
                return Err(VmError::TypeMismatch {
                    expected: kind.name(),
                    found: value.type_name(),
                })
            }
        })
    }

    fn as_arg(&self) -> Arg {
        match self {
            RawArg::I8(v) => Arg::new(v),
            RawArg::I16(v) => Arg::new(v),
            RawArg::I32(v) => Arg::new(v),
            RawArg::I64(v) => Arg::new(v),
            RawArg::U8(v) => Arg::new(v),
            RawArg::U16(v) => Arg::new(v),
            RawArg::U32(v) => Arg::new(v),
            RawArg::U64(v) => Arg::new(v),
            RawArg::F32(v) => Arg::new(v),
            RawArg::F64(v) => Arg::new(v),
            RawArg::Ptr(v) => Arg::new(v),
        }
    }
}

fn native_type(kind: SlotKind) -> Type {
    match kind {
        SlotKind::I8 => Type::i8(),
        SlotKind::I16 => Type::i16(),
        SlotKind::I32 => Type::i32(),
        SlotKind::I64 => Type::i64(),
        SlotKind::U8 | SlotKind::Bool => Type::u8(),
        SlotKind::U16 => Type::u16(),
        SlotKind::U32 => Type::u32(),
        SlotKind::U64 => Type::u64(),
        SlotKind::F32 => Type::f32(),
        SlotKind::F64 => Type::f64(),
        SlotKind::Ref | SlotKind::Null => Type::pointer(),
    }
}

/// A resolved foreign function with its call descriptor
pub struct NativeFunction {
    pub name: String,
    pub params: Vec<SlotKind>,
    pub ret: Option<SlotKind>,
    cif: Cif,
    code: CodePtr,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .finish()
    }
}

impl NativeFunction {
    /// Resolve the symbol and build the call descriptor
    pub fn prepare(decl: &ForeignFunction) -> Result<Self, LoadError> {
        if let Some(kind @ (SlotKind::Ref | SlotKind::Null)) = decl.ret {
            return Err(LoadError::UnsupportedReturn {
                symbol: decl.name.clone(),
                kind: kind.name(),
            });
        }
        let address = resolve(&decl.name)?;
        let ret = decl.ret.map_or_else(Type::void, native_type);
        let cif = Cif::new(decl.params.iter().map(|k| native_type(*k)), ret);
        log::debug!("resolved native '{}' at {:p}", decl.name, address);
        Ok(Self {
            name: decl.name.clone(),
            params: decl.params.clone(),
            ret: decl.ret,
            cif,
            code: CodePtr::from_ptr(address),
        })
    }

    /// Perform the call
    ///
    /// # Safety
    ///
    /// `args` must match `params`, and every pointer argument must stay
    /// valid (and its object unmoved) until the call returns.
    pub unsafe fn call(&self, args: &[RawArg]) -> Value {
        let args: Vec<Arg> = args.iter().map(RawArg::as_arg).collect();
        match self.ret {
            None => {
                self.cif.call::<()>(self.code, &args);
                Value::Null
            }
            Some(SlotKind::F32) => Value::Float(f64::from(self.cif.call::<f32>(self.code, &args))),
            Some(SlotKind::F64) => Value::Float(self.cif.call::<f64>(self.code, &args)),
            Some(kind) => {
                // integer results narrower than a register are widened by libffi
                let raw = self.cif.call::<u64>(self.code, &args);
                match kind {
                    SlotKind::I8 => Value::Int(i64::from(raw as i8)),
                    SlotKind::I16 => Value::Int(i64::from(raw as i16)),
                    SlotKind::I32 => Value::Int(i64::from(raw as i32)),
                    SlotKind::U8 => Value::Int(i64::from(raw as u8)),
                    SlotKind::U16 => Value::Int(i64::from(raw as u16)),
                    SlotKind::U32 => Value::Int(i64::from(raw as u32)),
                    SlotKind::Bool => Value::Bool(raw as u8 != 0),
                    _ => Value::Int(raw as i64),
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn foreign(name: &str, params: Vec<SlotKind>, ret: Option<SlotKind>) -> ForeignFunction {
        ForeignFunction {
            name: name.to_string(),
            params,
            ret,
        }
    }

    #[test]
    fn test_call_abs() {
        let abs = NativeFunction::prepare(&foreign("abs", vec![SlotKind::I32], Some(SlotKind::I32))).unwrap();
        let result = unsafe { abs.call(&[RawArg::I32(-42)]) };
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn test_reference_return_is_rejected() {
        let err = NativeFunction::prepare(&foreign("getenv", vec![SlotKind::Ref], Some(SlotKind::Ref))).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedReturn { .. }));
    }

    #[test]
    fn test_scalar_conversion() {
        assert!(matches!(RawArg::scalar(SlotKind::U8, Value::Int(300)), Ok(RawArg::U8(44))));
        assert!(matches!(
            RawArg::scalar(SlotKind::F64, Value::Int(1)),
            Err(VmError::TypeMismatch { .. })
        ));
    }
}
