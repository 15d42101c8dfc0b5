//! Stratus Language Engine
//!
//! This crate provides the Stratus core from resolved syntax to execution:
//! - **Types**: the interned type lattice (`types` module)
//! - **Checker**: type annotation, overload resolution and narrowing (`checker` module)
//! - **Compiler**: runtime layouts, bytecode and chunk serialization (`compiler` module)
//! - **VM**: interpreter, garbage collector and foreign calls (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use stratus_engine::ast::build::*;
//! use stratus_engine::{compile, CompileOptions, Vm, VmOptions};
//!
//! let mut b = ModuleBuilder::new("main.st");
//! b.function("main", &[], TypeExpr::I64, |f| f.ret(add(int(2), int(3))));
//!
//! let compilation = compile(b.finish(), &CompileOptions::default())?;
//! let mut vm = Vm::new(compilation.chunk, vec![], VmOptions::default())?;
//! assert_eq!(vm.run()?, Value::Int(5));
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]

// ============================================================================
// Core Modules
// ============================================================================

/// Resolved syntax tree handed to the checker
pub mod ast;

/// Type checker: annotation, coercions, overloads and narrowing
pub mod checker;

/// Compiler: layouts, bytecode and code generation
pub mod compiler;

/// Source locations and diagnostics
pub mod diagnostic;

/// Type lattice
pub mod types;

/// VM: interpreter, GC and foreign-function bridge
pub mod vm;

// ============================================================================
// Re-exports
// ============================================================================

pub use checker::{CheckError, CheckWarning, WarningCode, WarningConfig};
pub use compiler::{disassemble, Chunk, ChunkError, CompileError};
pub use diagnostic::{Diagnostic, Severity, Span};
pub use types::{TypeContext, TypeId};
pub use vm::{exit_status, GcStats, Value, Vm, VmError, VmOptions};

use ast::Module;

/// Options for the check-then-compile pipeline
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub warnings: WarningConfig,
}

/// A compiled chunk plus the warnings reported while checking it
#[derive(Debug)]
pub struct Compilation {
    pub chunk: Chunk,
    pub warnings: Vec<CheckWarning>,
}

/// Why a module did not compile
#[derive(Debug, thiserror::Error)]
pub enum CompileFailure {
    /// The checker rejected the module
    #[error("{} type error(s)", .0.len())]
    Check(Vec<CheckError>),

    /// Code generation failed
    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl CompileFailure {
    /// One diagnostic per error, located in `path`
    pub fn diagnostics(&self, path: &str) -> Vec<Diagnostic> {
        match self {
            CompileFailure::Check(errors) => errors.iter().map(|e| e.to_diagnostic(path)).collect(),
            CompileFailure::Compile(error) => vec![Diagnostic::new(Severity::Error, path, Span::default(), error.to_string())],
        }
    }
}

/// Check `module` and compile it into a chunk
pub fn compile(mut module: Module, options: &CompileOptions) -> Result<Compilation, CompileFailure> {
    let mut ctx = TypeContext::new();
    log::debug!("checking {}", module.path);
    let checked = checker::check_module(&mut ctx, &mut module, &options.warnings).map_err(CompileFailure::Check)?;
    log::debug!("compiling {} ({} types interned)", module.path, ctx.len());
    let chunk = compiler::compile_module(&mut ctx, &module, &checked.declarations)?;
    Ok(Compilation {
        chunk,
        warnings: checked.warnings,
    })
}
