//! Forward references to functions
//!
//! A call to a function that has no address yet leaves a placeholder and a
//! [`Fixup`]. Once every reachable function is emitted, each placeholder is
//! patched with its target's entry address.

use crate::ast::FunctionId;
use crate::types::TypeId;

/// One compiled body: a declaration, specialized for a reified class if generic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FnKey {
    pub function: FunctionId,
    /// Reified generic class the body is compiled for
    pub receiver: Option<TypeId>,
}

impl FnKey {
    pub fn plain(function: FunctionId) -> Self {
        Self {
            function,
            receiver: None,
        }
    }
}

/// Where a function address must be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSite {
    /// u64 operand in the code stream at this offset
    Immediate(usize),
    /// Constant-pool slot
    Constant(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixup {
    pub site: PatchSite,
    pub target: FnKey,
}
