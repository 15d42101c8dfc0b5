//! Compiled chunks and their binary format
//!
//! Layout of a serialized chunk:
//!
//! ```text
//! "STBC"
//! u32 function count, then per function: u64 start address, u64 name length, name bytes
//! u32 constant count, then self-tagged constants
//! u64 entry address
//! u64 code length, then code bytes
//! -- extension trailer --
//! u32 layout count, then layouts
//! u32 foreign count, then per function: name, u32 param count, param kinds, return kind (0xFF = void)
//! u32 function count, then per function: u32 local count, local names
//! ```
//!
//! Readers that only need the code can stop after the code bytes. A chunk
//! without the trailer deserializes with empty layout and foreign tables.

use super::constants::ConstantPool;
use super::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use crate::compiler::layout::{RuntimeLayout, SlotKind};
use std::path::Path;
use thiserror::Error;

/// Magic number identifying a chunk file
pub const MAGIC: [u8; 4] = *b"STBC";

const VOID_RETURN: u8 = 0xFF;

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("Not a Stratus chunk: bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("Malformed chunk: {0}")]
    Decode(#[from] DecodeError),

    #[error("Entry address {address} is outside the code ({len} bytes)")]
    InvalidEntry { address: u64, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Name and locals of a compiled function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub address: u64,
    pub name: String,
    /// Names of the local slots, receiver first for methods
    pub locals: Vec<String>,
}

/// Native function called through the foreign bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignFunction {
    /// Symbol name resolved in the running process
    pub name: String,
    pub params: Vec<SlotKind>,
    /// `None` for void
    pub ret: Option<SlotKind>,
}

/// Compiled unit, ready to run or serialize
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub constants: ConstantPool,
    pub code: Vec<u8>,
    /// Sorted by address
    pub functions: Vec<FunctionInfo>,
    pub layouts: Vec<RuntimeLayout>,
    pub foreign_functions: Vec<ForeignFunction>,
    /// Address of `main`
    pub main: u64,
}

impl Chunk {
    /// Function starting exactly at `address`
    pub fn function_at(&self, address: u64) -> Option<&FunctionInfo> {
        self.functions
            .binary_search_by_key(&address, |f| f.address)
            .ok()
            .map(|i| &self.functions[i])
    }

    /// Function whose code contains `ip`
    pub fn function_containing(&self, ip: usize) -> Option<&FunctionInfo> {
        let ip = ip as u64;
        let index = self.functions.partition_point(|f| f.address <= ip);
        index.checked_sub(1).map(|i| &self.functions[i])
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = BytecodeWriter::new();
        w.buffer.extend_from_slice(&MAGIC);

        w.emit_u32(self.functions.len() as u32);
        for function in &self.functions {
            w.emit_u64(function.address);
            w.emit_string(&function.name);
        }
        self.constants.encode(&mut w);
        w.emit_u64(self.main);
        w.emit_u64(self.code.len() as u64);
        w.buffer.extend_from_slice(&self.code);

        // Extension trailer
        w.emit_u32(self.layouts.len() as u32);
        for layout in &self.layouts {
            layout.encode(&mut w);
        }
        w.emit_u32(self.foreign_functions.len() as u32);
        for foreign in &self.foreign_functions {
            w.emit_string(&foreign.name);
            w.emit_u32(foreign.params.len() as u32);
            for param in &foreign.params {
                w.emit_u8(*param as u8);
            }
            w.emit_u8(foreign.ret.map_or(VOID_RETURN, |k| k as u8));
        }
        w.emit_u32(self.functions.len() as u32);
        for function in &self.functions {
            w.emit_u32(function.locals.len() as u32);
            for local in &function.locals {
                w.emit_string(local);
            }
        }
        w.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Chunk, ChunkError> {
        let mut r = BytecodeReader::new(bytes);
        let magic: [u8; 4] = r.take(4)?.try_into().unwrap_or_default();
        if magic != MAGIC {
            return Err(ChunkError::BadMagic(magic));
        }

        let count = r.read_u32()?;
        let mut functions = Vec::with_capacity(count.min(1 << 12) as usize);
        for _ in 0..count {
            let address = r.read_u64()?;
            let name = r.read_string()?;
            functions.push(FunctionInfo {
                address,
                name,
                locals: Vec::new(),
            });
        }
        let constants = ConstantPool::decode(&mut r)?;
        let main = r.read_u64()?;
        let len = r.read_u64()? as usize;
        let code = r.take(len)?.to_vec();

        let mut chunk = Chunk {
            constants,
            code,
            functions,
            layouts: Vec::new(),
            foreign_functions: Vec::new(),
            main,
        };
        if !r.is_at_end() {
            chunk.read_trailer(&mut r)?;
        }

        if chunk.main >= chunk.code.len() as u64 && !chunk.code.is_empty() {
            return Err(ChunkError::InvalidEntry {
                address: chunk.main,
                len: chunk.code.len(),
            });
        }
        Ok(chunk)
    }

    fn read_trailer(&mut self, r: &mut BytecodeReader<'_>) -> Result<(), DecodeError> {
        let count = r.read_u32()?;
        for _ in 0..count {
            self.layouts.push(RuntimeLayout::decode(r)?);
        }

        let count = r.read_u32()?;
        for _ in 0..count {
            let name = r.read_string()?;
            let arity = r.read_u32()?;
            let params = (0..arity).map(|_| slot_kind(r)).collect::<Result<_, _>>()?;
            let ret = match r.read_u8()? {
                VOID_RETURN => None,
                tag => Some(SlotKind::from_u8(tag).ok_or(DecodeError::InvalidTag { what: "slot kind", tag })?),
            };
            self.foreign_functions.push(ForeignFunction { name, params, ret });
        }

        let count = r.read_u32()? as usize;
        for index in 0..count {
            let locals = r.read_u32()?;
            let names = (0..locals).map(|_| r.read_string()).collect::<Result<Vec<_>, _>>()?;
            if let Some(function) = self.functions.get_mut(index) {
                function.locals = names;
            }
        }
        Ok(())
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ChunkError> {
        std::fs::write(path, self.serialize())?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Chunk, ChunkError> {
        let bytes = std::fs::read(path)?;
        Chunk::deserialize(&bytes)
    }
}

fn slot_kind(r: &mut BytecodeReader<'_>) -> Result<SlotKind, DecodeError> {
    let tag = r.read_u8()?;
    SlotKind::from_u8(tag).ok_or(DecodeError::InvalidTag { what: "slot kind", tag })
}
