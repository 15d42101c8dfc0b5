//! Error and warning types for type checking
//!
//! Every error carries the span of the offending node so a single pass can
//! report all problems in a module.

use crate::diagnostic::{Diagnostic, Severity, Span};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during type checking
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CheckError {
    /// Type mismatch
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
        span: Span,
    },

    /// Explicit cast between unrelated types
    #[error("Cannot cast {from} to {to}")]
    InvalidCast { from: String, to: String, span: Span },

    /// No overload accepts the argument types
    #[error("No overload of '{name}' accepts ({args})")]
    NoMatchingOverload { name: String, args: String, span: Span },

    /// Several overloads accept the argument types and none matches exactly
    #[error("Ambiguous call to '{name}' with ({args}); candidates: {}", candidates.join(", "))]
    AmbiguousOverload {
        name: String,
        args: String,
        candidates: Vec<String>,
        span: Span,
    },

    /// Methods and foreign functions can only be called
    #[error("'{name}' can only be called, not used as a value")]
    FunctionValue { name: String, span: Span },

    /// Calling something that is not a function
    #[error("Type {ty} is not callable")]
    NotCallable { ty: String, span: Span },

    /// Operand types not supported by a binary operator
    #[error("Operator '{op}' cannot be applied to {left} and {right}")]
    InvalidOperands {
        op: String,
        left: String,
        right: String,
        span: Span,
    },

    /// Operand type not supported by a unary operator
    #[error("Operator '{op}' cannot be applied to {operand}")]
    InvalidUnaryOperand { op: String, operand: String, span: Span },

    /// A non-void function can finish without returning
    #[error("Function '{name}' does not return a value on every path")]
    MissingReturn { name: String, span: Span },

    /// `is` against a type that cannot be tested at runtime
    #[error("Cannot test {operand} against {target}")]
    InvalidIsTarget {
        operand: String,
        target: String,
        span: Span,
    },

    /// A class lacks members required by an interface
    #[error("Class {class} does not implement {interface}; missing: {}", missing.join(", "))]
    MissingInterfaceMembers {
        class: String,
        interface: String,
        missing: Vec<String>,
        span: Span,
    },

    /// Member lookup failed
    #[error("Type {ty} has no member '{name}'")]
    UnknownMember { ty: String, name: String, span: Span },

    /// Left side of an assignment is not a storage location
    #[error("Invalid assignment target")]
    InvalidAssignmentTarget { span: Span },

    /// Interface fields are snapshots and cannot be written
    #[error("Field '{name}' is read-only through interface {interface}")]
    ReadOnlyField { name: String, interface: String, span: Span },

    /// `this` used outside a method or constructor
    #[error("'this' is only available inside a class")]
    ThisOutsideClass { span: Span },

    /// Wrong number of type arguments for a generic class
    #[error("Type '{name}' expects {expected} type argument(s), got {actual}")]
    InvalidTypeArguments {
        name: String,
        expected: usize,
        actual: usize,
        span: Span,
    },

    /// Array literal without elements or an expected type
    #[error("Cannot infer the element type of an empty array literal")]
    CannotInferArrayType { span: Span },

    /// Identifier without a declaration
    #[error("Unresolved reference")]
    UnresolvedReference { span: Span },

    /// A void expression used where a value is needed
    #[error("Expression of type void has no value")]
    VoidValue { span: Span },

    /// Indexing a type without elements or a subscript operator
    #[error("Type {ty} cannot be indexed")]
    NotIndexable { ty: String, span: Span },

    /// `let` with neither a type annotation nor an initializer
    #[error("Variable '{name}' needs a type annotation or an initializer")]
    UntypedLocal { name: String, span: Span },

    /// A warning promoted to an error by configuration
    #[error("{message} [{code}]")]
    DeniedWarning {
        code: &'static str,
        message: String,
        span: Span,
    },
}

impl CheckError {
    /// Get the span of this error
    pub fn span(&self) -> Span {
        match self {
            CheckError::TypeMismatch { span, .. }
            | CheckError::InvalidCast { span, .. }
            | CheckError::NoMatchingOverload { span, .. }
            | CheckError::AmbiguousOverload { span, .. }
            | CheckError::FunctionValue { span, .. }
            | CheckError::NotCallable { span, .. }
            | CheckError::InvalidOperands { span, .. }
            | CheckError::InvalidUnaryOperand { span, .. }
            | CheckError::MissingReturn { span, .. }
            | CheckError::InvalidIsTarget { span, .. }
            | CheckError::MissingInterfaceMembers { span, .. }
            | CheckError::UnknownMember { span, .. }
            | CheckError::InvalidAssignmentTarget { span }
            | CheckError::ReadOnlyField { span, .. }
            | CheckError::ThisOutsideClass { span }
            | CheckError::InvalidTypeArguments { span, .. }
            | CheckError::CannotInferArrayType { span }
            | CheckError::UnresolvedReference { span }
            | CheckError::VoidValue { span }
            | CheckError::NotIndexable { span, .. }
            | CheckError::UntypedLocal { span, .. }
            | CheckError::DeniedWarning { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self, path: &str) -> Diagnostic {
        Diagnostic::new(Severity::Error, path, self.span(), self.to_string())
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Warning codes for configurable warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
    UnreachableCode,
}

impl WarningCode {
    /// Stable code shown next to the message
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::UnreachableCode => "W1004",
        }
    }

    /// Parse the kebab-case name used in configuration
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "unreachable-code" => Some(WarningCode::UnreachableCode),
            _ => None,
        }
    }
}

/// Warnings emitted during type checking
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckWarning {
    #[error("Unreachable code")]
    UnreachableCode { span: Span },
}

impl CheckWarning {
    pub fn span(&self) -> Span {
        match self {
            CheckWarning::UnreachableCode { span } => *span,
        }
    }

    pub fn code(&self) -> WarningCode {
        match self {
            CheckWarning::UnreachableCode { .. } => WarningCode::UnreachableCode,
        }
    }

    pub fn to_diagnostic(&self, path: &str) -> Diagnostic {
        Diagnostic::new(
            Severity::Warning,
            path,
            self.span(),
            format!("{} [{}]", self, self.code().as_str()),
        )
    }
}

/// Which warnings are reported and which fail the check
#[derive(Debug, Clone, Default)]
pub struct WarningConfig {
    /// Warnings that are not reported
    pub allow: HashSet<WarningCode>,
    /// Warnings promoted to errors
    pub deny: HashSet<WarningCode>,
    /// When true, all warnings become errors
    pub strict: bool,
}

impl WarningConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self, code: WarningCode) -> bool {
        !self.allow.contains(&code)
    }

    pub fn is_denied(&self, code: WarningCode) -> bool {
        self.strict || self.deny.contains(&code)
    }
}
