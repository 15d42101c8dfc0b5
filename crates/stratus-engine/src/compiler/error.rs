//! Compiler errors
//!
//! Anything the compiler cannot lower is fatal: the checker is expected to
//! have rejected every user error already.

use crate::diagnostic::Span;
use thiserror::Error;

/// Compilation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// No free function named `main`
    #[error("No entry point: expected a function named 'main'")]
    MissingMain,

    /// `main` exists with an unsupported signature
    #[error("Invalid entry point signature {signature}: 'main' must take no parameters or a string[] and return an integer or void")]
    InvalidMain { signature: String },

    /// A node reached code generation in a form that cannot be lowered
    #[error("Cannot compile {what} at line {span}")]
    Unlowerable { what: String, span: Span },

    /// A value of a type without a runtime representation
    #[error("Type {ty} has no runtime layout")]
    UnsizedType { ty: String },

    /// More local slots than a frame can address
    #[error("Function '{name}' uses more than 65535 local slots")]
    TooManyLocals { name: String },
}

/// Result type for compiler operations
pub type CompileResult<T> = Result<T, CompileError>;
