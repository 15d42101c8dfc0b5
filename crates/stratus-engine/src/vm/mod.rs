//! Stratus VM Runtime
//!
//! This module provides the virtual machine that executes compiled chunks:
//! - Bytecode interpreter over per-call frames
//! - Mark-and-sweep garbage collector driven by the chunk's layout table
//! - Foreign-function bridge resolved at startup

pub mod defaults;
pub mod ffi;
pub mod frame;
pub mod gc;
pub mod interpreter;
pub mod options;
pub mod value;

pub use ffi::LoadError;
pub use gc::{GcStats, Heap};
pub use interpreter::Interpreter;
pub use options::VmOptions;
pub use value::{ObjectRef, Value};

use crate::compiler::bytecode::Chunk;

/// VM execution errors
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Invalid opcode
    #[error("Invalid opcode {opcode:#04x} at {ip}")]
    InvalidOpcode { opcode: u8, ip: usize },

    /// An operand had the wrong runtime kind
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: &'static str },

    /// Null pointer exception
    #[error("Null dereference")]
    NullDereference,

    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: u64 },

    #[error("Division by zero")]
    DivisionByZero,

    /// A foreign function could not be prepared
    #[error(transparent)]
    UnresolvedSymbol(#[from] LoadError),

    /// Execution ran past the configured timeout
    #[error("Execution timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    /// Stack underflow
    #[error("Stack underflow")]
    StackUnderflow,

    /// Stack overflow
    #[error("Stack overflow")]
    StackOverflow,

    /// A handle that no longer names a live object
    #[error("Dangling reference to object {0}")]
    DanglingReference(u32),

    /// The chunk does not describe a valid program
    #[error("Corrupt chunk: {0}")]
    CorruptChunk(String),
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;

/// A virtual machine instance running one chunk
#[derive(Debug)]
pub struct Vm {
    interpreter: Interpreter,
}

impl Vm {
    /// Load `chunk`, resolving its foreign functions, and seed the entry frame with `args`
    pub fn new(chunk: Chunk, args: Vec<String>, options: VmOptions) -> VmResult<Self> {
        log::debug!(
            "loading chunk: {} bytes of code, {} functions, {} layouts",
            chunk.code.len(),
            chunk.functions.len(),
            chunk.layouts.len()
        );
        let interpreter = Interpreter::new(chunk, &args, options)?;
        Ok(Self { interpreter })
    }

    /// Run `main` to completion and return its result
    pub fn run(&mut self) -> VmResult<Value> {
        let result = self.interpreter.run();
        let stats = self.interpreter.gc_stats();
        log::debug!(
            "finished: {} collections, {} allocations, {} freed, {} live",
            stats.collections,
            stats.allocations,
            stats.freed,
            stats.live
        );
        result
    }

    pub fn gc_stats(&self) -> GcStats {
        self.interpreter.gc_stats()
    }

    /// Force a collection cycle; returns the number of objects freed
    pub fn collect_garbage(&mut self) -> VmResult<usize> {
        self.interpreter.collect_garbage()
    }

    pub fn heap(&self) -> &Heap {
        self.interpreter.heap()
    }
}

/// Process exit status for a `main` result
pub fn exit_status(value: &Value) -> i32 {
    match value {
        Value::Int(v) => *v as i32,
        _ => 0,
    }
}
