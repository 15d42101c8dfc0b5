//! End-to-end tests for the Stratus engine
//!
//! These tests build resolved modules, compile them and execute the
//! resulting chunks in the VM, verifying the results are correct.

mod harness;

mod arrays;
mod classes;
mod errors;
mod functions;
mod operators;
mod runtime;
mod unions;

pub use harness::*;
