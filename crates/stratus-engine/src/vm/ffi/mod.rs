//! Foreign function bridge
//!
//! Every foreign function named by a chunk is resolved when the VM starts;
//! a missing symbol fails construction instead of the first call.

pub mod loader;
pub mod native;

pub use loader::LoadError;
pub use native::{NativeFunction, RawArg};

use crate::compiler::bytecode::ForeignFunction;

/// The prepared foreign functions of one chunk, by index
#[derive(Debug, Default)]
pub struct ForeignBridge {
    functions: Vec<NativeFunction>,
}

impl ForeignBridge {
    pub fn load(decls: &[ForeignFunction]) -> Result<Self, LoadError> {
        let functions = decls.iter().map(NativeFunction::prepare).collect::<Result<_, _>>()?;
        Ok(Self { functions })
    }

    pub fn get(&self, index: u32) -> Option<&NativeFunction> {
        self.functions.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
