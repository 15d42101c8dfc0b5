//! Bytecode format: opcodes, constants, chunks and their encoding

pub mod chunk;
pub mod constants;
pub mod disasm;
pub mod encoder;
pub mod opcode;

pub use chunk::{Chunk, ChunkError, ForeignFunction, FunctionInfo, MAGIC};
pub use constants::{Constant, ConstantPool};
pub use disasm::disassemble;
pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use opcode::{Opcode, Operands};
