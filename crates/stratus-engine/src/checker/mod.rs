//! Stratus Type Checker
//!
//! Annotates a resolved [`Module`] with types:
//! - every expression gets its type, or `Invalid` after an error
//! - implicit conversions become explicit `Coerce` nodes
//! - overloaded calls and operators are narrowed to one declaration
//! - `is` tests on union-typed locals narrow them in the guarded branch
//!
//! Errors are collected rather than returned early, so a single pass
//! reports everything wrong with a module.

mod checker;
mod coerce;
pub mod error;
mod expr;
pub mod narrowing;
mod operators;
mod overload;

pub use checker::{CheckResult, Declarations, TypeChecker};
pub use error::{CheckError, CheckWarning, WarningCode, WarningConfig};

use crate::ast::Module;
use crate::types::TypeContext;

/// Check a whole module in a fresh checker
pub fn check_module(
    ctx: &mut TypeContext,
    module: &mut Module,
    warnings: &WarningConfig,
) -> Result<CheckResult, Vec<CheckError>> {
    TypeChecker::new(ctx, warnings).check(module)
}
