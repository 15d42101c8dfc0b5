//! Type lattice
//!
//! Interned types, the `is_assignable_from` predicate, structural interface
//! implementations and generic reification.

mod assignability;
mod context;
mod implementation;
mod ty;

pub use context::TypeContext;
pub use implementation::{FieldBinding, Implementation, ImplementationResult, MethodBinding, MissingMember};
pub use ty::*;
