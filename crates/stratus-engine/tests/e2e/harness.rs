//! Test harness for end-to-end compilation and execution
//!
//! Programs are built with `ast::build`, checked, compiled to a chunk and
//! run in a fresh VM.

use stratus_engine::ast::Module;
use stratus_engine::{compile, Chunk, CompileFailure, CompileOptions, Value, Vm, VmError, VmOptions};

/// Error type for e2e tests
#[derive(Debug)]
pub enum E2EError {
    /// Type check or compilation error
    Compile(CompileFailure),
    /// VM execution error
    Vm(VmError),
}

impl std::fmt::Display for E2EError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            E2EError::Compile(CompileFailure::Check(errors)) => {
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "Type check error: {}", messages.join("; "))
            }
            E2EError::Compile(e) => write!(f, "Compile error: {}", e),
            E2EError::Vm(e) => write!(f, "VM error: {}", e),
        }
    }
}

impl std::error::Error for E2EError {}

/// Result type for e2e tests
pub type E2EResult<T> = Result<T, E2EError>;

/// Check and compile a module
pub fn build(module: Module) -> E2EResult<Chunk> {
    compile(module, &CompileOptions::default())
        .map(|c| c.chunk)
        .map_err(E2EError::Compile)
}

/// Run an already compiled chunk
pub fn run_chunk(chunk: Chunk, args: Vec<String>, options: VmOptions) -> E2EResult<Value> {
    let mut vm = Vm::new(chunk, args, options).map_err(E2EError::Vm)?;
    vm.run().map_err(E2EError::Vm)
}

/// Compile and execute a module with default options
pub fn compile_and_run(module: Module) -> E2EResult<Value> {
    run_chunk(build(module)?, Vec::new(), VmOptions::default())
}

/// Compile and execute, expecting an integer result
pub fn expect_i64(module: Module, expected: i64) {
    match compile_and_run(module) {
        Ok(Value::Int(actual)) => assert_eq!(actual, expected),
        Ok(other) => panic!("Expected integer result, got {:?}", other),
        Err(e) => panic!("Compilation/execution failed: {}", e),
    }
}

/// Compile and execute, expecting a float result
pub fn expect_f64(module: Module, expected: f64) {
    match compile_and_run(module) {
        Ok(Value::Float(actual)) => assert!(
            (actual - expected).abs() < 1e-9,
            "Expected {}, got {}",
            expected,
            actual
        ),
        Ok(other) => panic!("Expected float result, got {:?}", other),
        Err(e) => panic!("Compilation/execution failed: {}", e),
    }
}

/// Expect the checker to reject the module with an error whose message contains `pattern`
pub fn expect_check_error(module: Module, pattern: &str) {
    match build(module) {
        Ok(_) => panic!("Expected a type error containing '{}', but compilation succeeded", pattern),
        Err(E2EError::Compile(CompileFailure::Check(errors))) => {
            assert!(
                errors.iter().any(|e| e.to_string().contains(pattern)),
                "Expected a type error containing '{}', got: {:?}",
                pattern,
                errors
            );
        }
        Err(e) => panic!("Expected a type error, got: {}", e),
    }
}

/// Expect the compiler (not the checker) to reject the module
pub fn expect_compile_error(module: Module, pattern: &str) {
    match build(module) {
        Err(E2EError::Compile(CompileFailure::Compile(e))) => {
            assert!(
                e.to_string().contains(pattern),
                "Expected compile error containing '{}', got: {}",
                pattern,
                e
            );
        }
        Ok(_) => panic!("Expected a compile error containing '{}', but compilation succeeded", pattern),
        Err(e) => panic!("Expected a compile error, got: {}", e),
    }
}

/// Compile and execute, expecting the VM to fail
pub fn expect_runtime_error(module: Module, matches: impl FnOnce(&VmError) -> bool) {
    match compile_and_run(module) {
        Err(E2EError::Vm(e)) => assert!(matches(&e), "Unexpected runtime error: {}", e),
        Ok(value) => panic!("Expected a runtime error, got {:?}", value),
        Err(e) => panic!("Expected a runtime error, got: {}", e),
    }
}
