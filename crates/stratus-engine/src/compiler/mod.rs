//! Stratus Bytecode Compiler
//!
//! Lowers a checked [`Module`] into a [`Chunk`]:
//! - [`layout`] computes the runtime layout of every heap type
//! - [`codegen`] emits opcodes and resolves forward references
//! - [`bytecode`] defines the opcode set, constant pool and chunk format

pub mod bytecode;
pub mod codegen;
pub mod error;
pub mod layout;

pub use bytecode::{disassemble, Chunk, ChunkError, Constant, ConstantPool, Opcode};
pub use codegen::Compiler;
pub use error::{CompileError, CompileResult};
pub use layout::{LayoutKind, RuntimeLayout, SlotKind};

use crate::ast::Module;
use crate::checker::Declarations;
use crate::types::TypeContext;

/// Compile a module the checker has accepted
pub fn compile_module(ctx: &mut TypeContext, module: &Module, decls: &Declarations) -> CompileResult<Chunk> {
    Compiler::new(ctx, module, decls).compile()
}
