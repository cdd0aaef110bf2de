//! Single-pass source-to-bytecode compiler.
//!
//! Tokens are pulled from the scanner on demand and bytecode is emitted
//! directly into the chunk of the function being compiled. Variable
//! resolution happens at compile time: locals become stack slots, captured
//! variables become upvalue indices, everything else is a global by name.

use std::rc::Rc;

use tracing::debug;

use crate::bytecode::{Chunk, OpCode};
use crate::error::{CompileError, Diagnostic, ErrorLocation};
use crate::lexer::{Scanner, Token, TokenKind};
use crate::value::{Function, UpvalueDescriptor, Value};

/// Locals and upvalues are addressed by a single operand byte.
pub const MAX_LOCALS: usize = 256;
pub const MAX_UPVALUES: usize = 256;
pub const MAX_ARGS: usize = 255;

/// A local variable tracked during compilation.
#[derive(Debug, Clone, Copy)]
pub struct Local<'src> {
    pub name: &'src str,
    /// Scope depth, or -1 while the variable's initializer is being compiled.
    pub depth: i32,
    pub is_captured: bool,
}

/// Tracks what kind of function is being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionType {
    Script,
    Function,
    Method,
    Initializer,
}

/// Per-function compilation state.
pub struct FunctionCompiler<'src> {
    pub function: Function,
    pub function_type: FunctionType,
    pub locals: Vec<Local<'src>>,
    pub scope_depth: i32,
}

impl<'src> FunctionCompiler<'src> {
    pub fn new(function_type: FunctionType, name: Option<Rc<str>>) -> Self {
        // Slot 0 holds the callee, or the receiver in methods.
        let slot_name = match function_type {
            FunctionType::Method | FunctionType::Initializer => "this",
            FunctionType::Script | FunctionType::Function => "",
        };
        Self {
            function: Function::new(name),
            function_type,
            locals: vec![Local {
                name: slot_name,
                depth: 0,
                is_captured: false,
            }],
            scope_depth: 0,
        }
    }
}

/// The class currently being compiled, innermost last.
#[derive(Debug, Clone, Copy)]
pub struct ClassCompiler {
    pub has_superclass: bool,
}

/// The compiler: a Pratt parser that emits bytecode as it parses.
pub struct Compiler<'src> {
    pub(super) scanner: Scanner<'src>,
    pub(super) current: Token<'src>,
    pub(super) previous: Token<'src>,
    pub(super) had_error: bool,
    pub(super) panic_mode: bool,
    pub(super) diagnostics: Vec<Diagnostic>,
    /// Enclosing functions first, the one being compiled last.
    pub(super) functions: Vec<FunctionCompiler<'src>>,
    pub(super) classes: Vec<ClassCompiler>,
}

impl<'src> Compiler<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            scanner: Scanner::new(source),
            current: Token::eof(1),
            previous: Token::eof(1),
            had_error: false,
            panic_mode: false,
            diagnostics: Vec::new(),
            functions: vec![FunctionCompiler::new(FunctionType::Script, None)],
            classes: Vec::new(),
        }
    }

    /// Compile a whole program into the top-level script function.
    pub fn compile(mut self) -> Result<Function, CompileError> {
        self.advance();
        while !self.match_token(TokenKind::Eof) {
            self.declaration();
        }
        let function = self.end_compiler();

        if self.had_error {
            debug!(errors = self.diagnostics.len(), "compilation failed");
            Err(CompileError::new(self.diagnostics))
        } else {
            Ok(function)
        }
    }

    // ===== Token handling =====

    pub(super) fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    pub(super) fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    pub(super) fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // ===== Error reporting =====

    pub(super) fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    pub(super) fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;

        let location = match token.kind {
            TokenKind::Eof => ErrorLocation::AtEnd,
            TokenKind::Error => ErrorLocation::Bare,
            _ => ErrorLocation::At(token.lexeme.to_string()),
        };
        self.diagnostics.push(Diagnostic {
            line: token.line,
            location,
            message: message.to_string(),
        });
    }

    /// Leave panic mode at the next statement boundary.
    pub(super) fn synchronize(&mut self) {
        self.panic_mode = false;

        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ===== Chunk helpers =====

    pub(super) fn current_fn(&mut self) -> &mut FunctionCompiler<'src> {
        let last = self.functions.len() - 1;
        &mut self.functions[last]
    }

    pub(super) fn current_fn_ref(&self) -> &FunctionCompiler<'src> {
        &self.functions[self.functions.len() - 1]
    }

    pub(super) fn chunk(&mut self) -> &mut Chunk {
        &mut self.current_fn().function.chunk
    }

    pub(super) fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk().write_byte(byte, line);
    }

    pub(super) fn emit_op(&mut self, op: OpCode) {
        let line = self.previous.line;
        self.chunk().write_op(op, line);
    }

    pub(super) fn emit_op_operand(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    pub(super) fn emit_return(&mut self) {
        if self.current_fn_ref().function_type == FunctionType::Initializer {
            self.emit_op_operand(OpCode::GetLocal, 0);
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.emit_op(OpCode::Return);
    }

    /// Emit a forward jump with a placeholder offset; returns the operand's offset.
    pub(super) fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        let line = self.previous.line;
        self.chunk().write_u16(u16::MAX, line);
        self.chunk().current_offset() - 2
    }

    pub(super) fn patch_jump(&mut self, offset: usize) {
        let jump = self.chunk().current_offset() - offset - 2;
        match u16::try_from(jump) {
            Ok(jump) => self.chunk().patch_u16(offset, jump),
            Err(_) => self.error("Too much code to jump over."),
        }
    }

    pub(super) fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.chunk().current_offset() - loop_start + 2;
        let offset = match u16::try_from(offset) {
            Ok(offset) => offset,
            Err(_) => {
                self.error("Loop body too large.");
                0
            }
        };
        let line = self.previous.line;
        self.chunk().write_u16(offset, line);
    }

    pub(super) fn make_constant(&mut self, value: Value) -> u8 {
        match self.chunk().add_constant(value) {
            Ok(index) => index,
            Err(err) => {
                self.error(&err.to_string());
                0
            }
        }
    }

    pub(super) fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op_operand(OpCode::Constant, index);
    }

    /// Constant-pool index for a name, reusing an existing entry when present.
    pub(super) fn identifier_constant(&mut self, name: &str) -> u8 {
        let existing = self
            .chunk()
            .constants
            .iter()
            .position(|c| matches!(c, Value::String(s) if &**s == name));
        match existing {
            Some(index) => index as u8,
            None => self.make_constant(Value::from(name)),
        }
    }

    // ===== Scope management =====

    pub(super) fn begin_scope(&mut self) {
        self.current_fn().scope_depth += 1;
    }

    pub(super) fn end_scope(&mut self) {
        self.current_fn().scope_depth -= 1;

        loop {
            let current = self.current_fn_ref();
            let Some(local) = current.locals.last() else {
                break;
            };
            if local.depth <= current.scope_depth {
                break;
            }
            if local.is_captured {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
            self.current_fn().locals.pop();
        }
    }

    // ===== Variables =====

    pub(super) fn add_local(&mut self, name: &'src str) {
        if self.current_fn_ref().locals.len() == MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.current_fn().locals.push(Local {
            name,
            depth: -1,
            is_captured: false,
        });
    }

    /// Record a local for the name just consumed. Globals are late-bound and skip this.
    pub(super) fn declare_variable(&mut self) {
        let current = self.current_fn_ref();
        if current.scope_depth == 0 {
            return;
        }

        let name = self.previous.lexeme;
        let duplicate = current
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth == -1 || local.depth >= current.scope_depth)
            .any(|local| local.name == name);
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(name);
    }

    pub(super) fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenKind::Identifier, message);

        self.declare_variable();
        if self.current_fn_ref().scope_depth > 0 {
            return 0;
        }

        let name = self.previous.lexeme;
        self.identifier_constant(name)
    }

    pub(super) fn mark_initialized(&mut self) {
        let current = self.current_fn();
        if current.scope_depth == 0 {
            return;
        }
        let depth = current.scope_depth;
        if let Some(local) = current.locals.last_mut() {
            local.depth = depth;
        }
    }

    pub(super) fn define_variable(&mut self, global: u8) {
        if self.current_fn_ref().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op_operand(OpCode::DefineGlobal, global);
    }

    pub(super) fn resolve_local(&mut self, level: usize, name: &str) -> Option<u8> {
        let found = self.functions[level]
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.name == name)
            .map(|(slot, local)| (slot, local.depth));

        let (slot, depth) = found?;
        if depth == -1 {
            self.error("Can't read local variable in its own initializer.");
        }
        Some(slot as u8)
    }

    /// Resolve `name` as a variable captured from a function enclosing `level`.
    pub(super) fn resolve_upvalue(&mut self, level: usize, name: &str) -> Option<u8> {
        if level == 0 {
            return None;
        }

        if let Some(local) = self.resolve_local(level - 1, name) {
            self.functions[level - 1].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(level, local, true));
        }

        if let Some(upvalue) = self.resolve_upvalue(level - 1, name) {
            return Some(self.add_upvalue(level, upvalue, false));
        }

        None
    }

    fn add_upvalue(&mut self, level: usize, index: u8, is_local: bool) -> u8 {
        let descriptor = UpvalueDescriptor { is_local, index };
        let upvalues = &self.functions[level].function.upvalues;

        if let Some(existing) = upvalues.iter().position(|u| *u == descriptor) {
            return existing as u8;
        }
        if upvalues.len() == MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }

        let upvalues = &mut self.functions[level].function.upvalues;
        upvalues.push(descriptor);
        (upvalues.len() - 1) as u8
    }

    // ===== Functions =====

    pub(super) fn begin_function(&mut self, function_type: FunctionType) {
        let name = Rc::from(self.previous.lexeme);
        self.functions
            .push(FunctionCompiler::new(function_type, Some(name)));
    }

    /// Finish the function being compiled and return it.
    pub(super) fn end_compiler(&mut self) -> Function {
        self.emit_return();

        let compiled = match self.functions.pop() {
            Some(compiled) => compiled,
            None => FunctionCompiler::new(FunctionType::Script, None),
        };
        let function = compiled.function;

        if !self.had_error {
            debug!(
                function = %function,
                code = function.chunk.code.len(),
                constants = function.chunk.constants.len(),
                upvalues = function.upvalues.len(),
                "compiled function"
            );
        }
        function
    }
}
