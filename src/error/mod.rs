//! Error types for every phase of the pipeline.

use std::fmt;

use thiserror::Error;

/// Where in the source a compile diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// The error was found at the end of input.
    AtEnd,
    /// The error was found at a specific lexeme.
    At(String),
    /// Scanner errors carry no lexeme of their own.
    Bare,
}

/// One compile-time diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub location: ErrorLocation,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error", self.line)?;
        match &self.location {
            ErrorLocation::AtEnd => write!(f, " at end")?,
            ErrorLocation::At(lexeme) => write!(f, " at '{}'", lexeme)?,
            ErrorLocation::Bare => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Bytecode compilation failure: every diagnostic reported during one pass.
#[derive(Debug, Clone, Error)]
#[error("{}", render_diagnostics(.diagnostics))]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Whether any diagnostic carries the given message.
    pub fn has_message(&self, message: &str) -> bool {
        self.diagnostics.iter().any(|d| d.message == message)
    }
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Constant pool errors raised by a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("Too many constants in one chunk.")]
    TooManyConstants,
}

/// One line of a runtime stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    pub line: usize,
    /// Function name, `None` for the top-level script.
    pub function: Option<String>,
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(name) => write!(f, "[line {}] in {}()", self.line, name),
            None => write!(f, "[line {}] in script", self.line),
        }
    }
}

/// A runtime error with the call stack captured when it was raised,
/// innermost frame first.
#[derive(Debug, Clone, Error)]
#[error("{message}{}", render_trace(.trace))]
pub struct RuntimeError {
    pub message: String,
    pub trace: Vec<TraceLine>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, trace: Vec<TraceLine>) -> Self {
        Self {
            message: message.into(),
            trace,
        }
    }
}

fn render_trace(trace: &[TraceLine]) -> String {
    trace.iter().map(|line| format!("\n{}", line)).collect()
}

/// A unified error type for `interpret` and the CLI.
#[derive(Debug, Error)]
pub enum LoxError {
    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoxError {
    /// Process exit code for this failure (sysexits conventions).
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Compile(_) => 65,
            Self::Runtime(_) => 70,
            Self::Io(_) => 74,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_format() {
        let at = Diagnostic {
            line: 3,
            location: ErrorLocation::At("+".to_string()),
            message: "Expect expression.".to_string(),
        };
        assert_eq!(at.to_string(), "[line 3] Error at '+': Expect expression.");

        let end = Diagnostic {
            line: 7,
            location: ErrorLocation::AtEnd,
            message: "Expect ';' after value.".to_string(),
        };
        assert_eq!(end.to_string(), "[line 7] Error at end: Expect ';' after value.");

        let bare = Diagnostic {
            line: 1,
            location: ErrorLocation::Bare,
            message: "Unexpected character.".to_string(),
        };
        assert_eq!(bare.to_string(), "[line 1] Error: Unexpected character.");
    }

    #[test]
    fn test_runtime_error_renders_trace() {
        let err = RuntimeError::new(
            "Operand must be a number.",
            vec![
                TraceLine {
                    line: 2,
                    function: Some("inner".to_string()),
                },
                TraceLine {
                    line: 5,
                    function: None,
                },
            ],
        );
        assert_eq!(
            err.to_string(),
            "Operand must be a number.\n[line 2] in inner()\n[line 5] in script"
        );
    }

    #[test]
    fn test_exit_codes() {
        let compile = LoxError::from(CompileError::new(Vec::new()));
        let runtime = LoxError::from(RuntimeError::new("boom", Vec::new()));
        assert_eq!(compile.exit_code(), 65);
        assert_eq!(runtime.exit_code(), 70);
    }
}
