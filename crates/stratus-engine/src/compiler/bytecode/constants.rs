//! Constant pool for bytecode chunks
//!
//! Literal constants are deduplicated. Jump targets and function
//! addresses live in placeholder slots that are never shared, since the
//! fixup pass patches each one independently.

use super::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use rustc_hash::FxHashMap;
use std::fmt;

/// A boxed literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
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
    Bool(bool),
    String(String),
    Null,
}

impl Constant {
    /// One-byte discriminant used in the serialized pool
    pub fn tag(&self) -> u8 {
        match self {
            Constant::I8(_) => 0x01,
            Constant::I16(_) => 0x02,
            Constant::I32(_) => 0x03,
            Constant::I64(_) => 0x04,
            Constant::U8(_) => 0x05,
            Constant::U16(_) => 0x06,
            Constant::U32(_) => 0x07,
            Constant::U64(_) => 0x08,
            Constant::F32(_) => 0x09,
            Constant::F64(_) => 0x0A,
            Constant::Bool(_) => 0x0B,
            Constant::String(_) => 0x0C,
            Constant::Null => 0x0D,
        }
    }

    /// Integer payload, for jump targets and addresses
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Constant::I8(v) => Some(v as u64),
            Constant::I16(v) => Some(v as u64),
            Constant::I32(v) => Some(v as u64),
            Constant::I64(v) => Some(v as u64),
            Constant::U8(v) => Some(u64::from(v)),
            Constant::U16(v) => Some(u64::from(v)),
            Constant::U32(v) => Some(u64::from(v)),
            Constant::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_u8(self.tag());
        match self {
            Constant::I8(v) => writer.emit_i8(*v),
            Constant::I16(v) => writer.emit_i16(*v),
            Constant::I32(v) => writer.emit_i32(*v),
            Constant::I64(v) => writer.emit_i64(*v),
            Constant::U8(v) => writer.emit_u8(*v),
            Constant::U16(v) => writer.emit_u16(*v),
            Constant::U32(v) => writer.emit_u32(*v),
            Constant::U64(v) => writer.emit_u64(*v),
            Constant::F32(v) => writer.emit_f32(*v),
            Constant::F64(v) => writer.emit_f64(*v),
            Constant::Bool(v) => writer.emit_u8(u8::from(*v)),
            Constant::String(s) => writer.emit_string(s),
            Constant::Null => {}
        }
    }

    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let tag = reader.read_u8()?;
        Ok(match tag {
            0x01 => Constant::I8(reader.read_i8()?),
            0x02 => Constant::I16(reader.read_i16()?),
            0x03 => Constant::I32(reader.read_i32()?),
            0x04 => Constant::I64(reader.read_i64()?),
            0x05 => Constant::U8(reader.read_u8()?),
            0x06 => Constant::U16(reader.read_u16()?),
            0x07 => Constant::U32(reader.read_u32()?),
            0x08 => Constant::U64(reader.read_u64()?),
            0x09 => Constant::F32(reader.read_f32()?),
            0x0A => Constant::F64(reader.read_f64()?),
            0x0B => Constant::Bool(reader.read_u8()? != 0),
            0x0C => Constant::String(reader.read_string()?),
            0x0D => Constant::Null,
            tag => return Err(DecodeError::InvalidTag { what: "constant", tag }),
        })
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::I8(v) => write!(f, "{}i8", v),
            Constant::I16(v) => write!(f, "{}i16", v),
            Constant::I32(v) => write!(f, "{}i32", v),
            Constant::I64(v) => write!(f, "{}", v),
            Constant::U8(v) => write!(f, "{}u8", v),
            Constant::U16(v) => write!(f, "{}u16", v),
            Constant::U32(v) => write!(f, "{}u32", v),
            Constant::U64(v) => write!(f, "{}u64", v),
            Constant::F32(v) => write!(f, "{}f32", v),
            Constant::F64(v) => write!(f, "{}", v),
            Constant::Bool(v) => write!(f, "{}", v),
            Constant::String(s) => write!(f, "{:?}", s),
            Constant::Null => write!(f, "null"),
        }
    }
}

/// Hashable identity of a constant; floats compare by bit pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int(u8, u64),
    Float(u8, u64),
    Bool(bool),
    String(String),
    Null,
}

impl ConstantKey {
    fn of(constant: &Constant) -> ConstantKey {
        match constant {
            Constant::F32(v) => ConstantKey::Float(constant.tag(), u64::from(v.to_bits())),
            Constant::F64(v) => ConstantKey::Float(constant.tag(), v.to_bits()),
            Constant::Bool(v) => ConstantKey::Bool(*v),
            Constant::String(s) => ConstantKey::String(s.clone()),
            Constant::Null => ConstantKey::Null,
            other => ConstantKey::Int(other.tag(), other.as_u64().unwrap_or_default()),
        }
    }
}

/// Constant pool containing literal values and patchable slots
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    dedup: FxHashMap<ConstantKey, u32>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a literal, reusing an identical existing entry
    pub fn add(&mut self, constant: Constant) -> u32 {
        let key = ConstantKey::of(&constant);
        if let Some(&index) = self.dedup.get(&key) {
            return index;
        }
        let index = self.constants.len() as u32;
        self.constants.push(constant);
        self.dedup.insert(key, index);
        index
    }

    pub fn add_string(&mut self, s: &str) -> u32 {
        self.add(Constant::String(s.to_string()))
    }

    /// Reserve a fresh slot to be patched later with an address
    pub fn placeholder(&mut self) -> u32 {
        let index = self.constants.len() as u32;
        self.constants.push(Constant::U64(0));
        index
    }

    /// Overwrite a slot; only used for placeholders
    pub fn set(&mut self, index: u32, constant: Constant) {
        if let Some(slot) = self.constants.get_mut(index as usize) {
            *slot = constant;
        }
    }

    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.constants.iter()
    }

    /// Encode as a u32 count followed by self-tagged constants
    pub fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_u32(self.constants.len() as u32);
        for constant in &self.constants {
            constant.encode(writer);
        }
    }

    /// Decode a pool; entries keep their positions, so nothing is deduplicated
    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u32()? as usize;
        let mut constants = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            constants.push(Constant::decode(reader)?);
        }
        Ok(Self {
            constants,
            dedup: FxHashMap::default(),
        })
    }
}

impl PartialEq for ConstantPool {
    fn eq(&self, other: &Self) -> bool {
        self.constants == other.constants
    }
}

impl FromIterator<Constant> for ConstantPool {
    fn from_iter<T: IntoIterator<Item = Constant>>(iter: T) -> Self {
        let mut pool = ConstantPool::new();
        for constant in iter {
            pool.add(constant);
        }
        pool
    }
}
