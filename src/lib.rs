//! loxvm: a bytecode compiler and virtual machine for a small dynamically
//! typed scripting language with closures and classes.
//!
//! Source text is scanned on demand and compiled in a single pass straight
//! to bytecode, which a stack-based VM then executes.
//!
//! ```no_run
//! use loxvm::vm::Vm;
//!
//! let mut vm = Vm::new();
//! vm.interpret("print 1 + 2;").expect("program runs");
//! ```

#![allow(clippy::module_inception)]
#![allow(clippy::new_without_default)]

pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod error;
pub mod lexer;
pub mod value;
pub mod vm;

use config::VmConfig;
use error::{CompileError, LoxError};
use value::Function;

/// Run a program on a fresh VM.
pub fn run(source: &str, config: VmConfig) -> Result<(), LoxError> {
    let mut vm = vm::Vm::with_config(config);
    vm.interpret(source)
}

/// Run a program from a file on a fresh VM. A read failure is `LoxError::Io`.
pub fn run_file(path: &std::path::Path, config: VmConfig) -> Result<(), LoxError> {
    let source = std::fs::read_to_string(path)?;
    run(&source, config)
}

/// Compile a program without running it.
pub fn compile(source: &str) -> Result<Function, CompileError> {
    compiler::compile(source)
}

/// Compile a program and return the disassembly of every function in it.
pub fn disassemble(source: &str) -> Result<String, CompileError> {
    let function = compiler::compile(source)?;
    Ok(bytecode::disassemble_function(&function))
}
