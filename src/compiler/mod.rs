//! Single-pass compiler from source text to bytecode.
//!
//! - `compiler`: parser state, error reporting, scopes, and variable resolution
//! - `precedence`: precedence levels and the Pratt rule table
//! - `compiler_exprs`: expressions
//! - `compiler_stmts`: declarations and statements
//! - `compiler_classes`: classes, `this`, `super`, and property access

pub mod compiler;
pub mod precedence;

mod compiler_classes;
mod compiler_exprs;
mod compiler_stmts;

pub use compiler::{Compiler, FunctionType};
pub use precedence::Precedence;

use crate::error::CompileError;
use crate::value::Function;

/// Compile `source` into the top-level script function.
pub fn compile(source: &str) -> Result<Function, CompileError> {
    Compiler::new(source).compile()
}
