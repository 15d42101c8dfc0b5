//! Arithmetic, comparison, conversion and string opcodes

use super::Interpreter;
use crate::compiler::bytecode::Opcode;
use crate::compiler::layout::STRING_LAYOUT;
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};

/// Carry a single precision result on the stack
fn single(value: f32) -> Value {
    Value::Float(f64::from(value))
}

impl Interpreter {
    pub(super) fn int_binary(&mut self, opcode: Opcode) -> VmResult<()> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        let (ua, ub) = (a as u64, b as u64);
        let result = match opcode {
            Opcode::IAdd => a.wrapping_add(b),
            Opcode::ISub => a.wrapping_sub(b),
            Opcode::IMul => a.wrapping_mul(b),
            Opcode::IDiv | Opcode::UDiv | Opcode::IRem | Opcode::URem if b == 0 => {
                return Err(VmError::DivisionByZero)
            }
            Opcode::IDiv => a.wrapping_div(b),
            Opcode::UDiv => (ua / ub) as i64,
            Opcode::IRem => a.wrapping_rem(b),
            Opcode::URem => (ua % ub) as i64,
            Opcode::IAnd => a & b,
            Opcode::IOr => a | b,
            Opcode::IXor => a ^ b,
            Opcode::IShl => a.wrapping_shl(b as u32),
            Opcode::IShr => a.wrapping_shr(b as u32),
            Opcode::UShr => ua.wrapping_shr(b as u32) as i64,
            other => return Err(VmError::InvalidOpcode { opcode: other as u8, ip: self.ip }),
        };
        self.push(Value::Int(result))
    }

    pub(super) fn float_binary(&mut self, opcode: Opcode) -> VmResult<()> {
        let b = self.pop_float()?;
        let a = self.pop_float()?;
        let (sa, sb) = (a as f32, b as f32);
        let result = match opcode {
            Opcode::F64Add => Value::Float(a + b),
            Opcode::F64Sub => Value::Float(a - b),
            Opcode::F64Mul => Value::Float(a * b),
            Opcode::F64Div => Value::Float(a / b),
            Opcode::F64Rem => Value::Float(a % b),
            Opcode::F32Add => single(sa + sb),
            Opcode::F32Sub => single(sa - sb),
            Opcode::F32Mul => single(sa * sb),
            Opcode::F32Div => single(sa / sb),
            Opcode::F32Rem => single(sa % sb),
            other => return Err(VmError::InvalidOpcode { opcode: other as u8, ip: self.ip }),
        };
        self.push(result)
    }

    pub(super) fn compare(&mut self, opcode: Opcode) -> VmResult<()> {
        let result = match opcode {
            Opcode::FLt | Opcode::FLe | Opcode::FGt | Opcode::FGe => {
                let b = self.pop_float()?;
                let a = self.pop_float()?;
                match opcode {
                    Opcode::FLt => a < b,
                    Opcode::FLe => a <= b,
                    Opcode::FGt => a > b,
                    _ => a >= b,
                }
            }
            _ => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                let (ua, ub) = (a as u64, b as u64);
                match opcode {
                    Opcode::ILt => a < b,
                    Opcode::ILe => a <= b,
                    Opcode::IGt => a > b,
                    Opcode::IGe => a >= b,
                    Opcode::ULt => ua < ub,
                    Opcode::ULe => ua <= ub,
                    Opcode::UGt => ua > ub,
                    Opcode::UGe => ua >= ub,
                    other => return Err(VmError::InvalidOpcode { opcode: other as u8, ip: self.ip }),
                }
            }
        };
        self.push(Value::Bool(result))
    }

    pub(super) fn convert(&mut self, opcode: Opcode) -> VmResult<()> {
        let v = self.pop_int()?;
        let result = match opcode {
            Opcode::IntToF64 => Value::Float(v as f64),
            Opcode::UIntToF64 => Value::Float(v as u64 as f64),
            Opcode::IntToF32 => single(v as f32),
            _ => single(v as u64 as f32),
        };
        self.push(result)
    }

    // ========================================================================
    // Strings
    // ========================================================================

    pub(super) fn concat(&mut self) -> VmResult<()> {
        self.reserve_allocation()?;
        let b = self.pop_object()?;
        let a = self.pop_object()?;
        let mut bytes = self.heap.get(a)?.elements().to_vec();
        bytes.extend_from_slice(self.heap.get(b)?.elements());
        let s = self.heap.allocate_string(STRING_LAYOUT, &bytes);
        self.push(Value::Object(s))
    }

    pub(super) fn int_to_string(&mut self, signed: bool) -> VmResult<()> {
        self.reserve_allocation()?;
        let v = self.pop_int()?;
        let text = if signed { v.to_string() } else { (v as u64).to_string() };
        let s = self.heap.allocate_string(STRING_LAYOUT, text.as_bytes());
        self.push(Value::Object(s))
    }

    /// Pop two strings and compare their bytes
    pub(super) fn strings_equal(&mut self) -> VmResult<bool> {
        let b = self.pop_object()?;
        let a = self.pop_object()?;
        Ok(a == b || self.heap.get(a)?.elements() == self.heap.get(b)?.elements())
    }
}
