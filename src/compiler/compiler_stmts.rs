//! Declaration and statement compilation.

use std::rc::Rc;

use crate::bytecode::OpCode;
use crate::lexer::TokenKind;
use crate::value::Value;

use super::compiler::{Compiler, FunctionType, MAX_ARGS};

impl<'src> Compiler<'src> {
    pub(super) fn declaration(&mut self) {
        if self.match_token(TokenKind::Class) {
            self.class_declaration();
        } else if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        // A function may refer to itself.
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");

        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        );

        self.define_variable(global);
    }

    /// Compile a function body into a new function and emit the closure that wraps it.
    pub(super) fn function(&mut self, function_type: FunctionType) {
        self.begin_function(function_type);
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                self.current_fn().function.arity += 1;
                if self.current_fn_ref().function.arity > MAX_ARGS {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        // No end_scope: the frame's slots are discarded wholesale on return.
        let function = self.end_compiler();
        let upvalues = function.upvalues.clone();
        let constant = self.make_constant(Value::Function(Rc::new(function)));
        self.emit_op_operand(OpCode::Closure, constant);

        for upvalue in upvalues {
            self.emit_byte(u8::from(upvalue.is_local));
            self.emit_byte(upvalue.index);
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    pub(super) fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.chunk().current_offset();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");

        if self.match_token(TokenKind::Semicolon) {
            // No initializer.
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.chunk().current_offset();
        let mut exit_jump = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");

            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        // The increment runs after the body, so jump over it on the way in.
        if !self.match_token(TokenKind::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.chunk().current_offset();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }

        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.current_fn_ref().function_type == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }

        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            if self.current_fn_ref().function_type == FunctionType::Initializer {
                self.error("Can't return a value from an initializer.");
            }
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::compile;

    #[test]
    fn test_control_flow_compiles() {
        let source = r#"
            var total = 0;
            for (var i = 0; i < 10; i = i + 1) {
                if (i == 5) total = total + 100; else total = total + i;
            }
            while (total > 0) total = total - 1;
        "#;
        assert!(compile(source).is_ok());
    }

    #[test]
    fn test_top_level_return() {
        let err = compile("return 1;").expect_err("top-level return");
        assert_eq!(
            err.to_string(),
            "[line 1] Error at 'return': Can't return from top-level code."
        );
    }

    #[test]
    fn test_local_redeclaration() {
        let err = compile("{ var a = 1; var a = 2; }").expect_err("duplicate local");
        assert!(err.has_message("Already a variable with this name in this scope."));
    }

    #[test]
    fn test_shadowing_in_nested_scope_is_allowed() {
        assert!(compile("{ var a = 1; { var a = 2; } }").is_ok());
    }

    #[test]
    fn test_too_many_parameters() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));
        let err = compile(&source).expect_err("too many params");
        assert!(err.has_message("Can't have more than 255 parameters."));
    }

    #[test]
    fn test_too_many_locals() {
        let locals: String = (0..256).map(|i| format!("var v{} = nil;", i)).collect();
        let err = compile(&format!("{{ {} }}", locals)).expect_err("too many locals");
        assert!(err.has_message("Too many local variables in function."));
    }

    #[test]
    fn test_jump_over_too_much_code() {
        let body = "print nil;".repeat(40_000);
        let err = compile(&format!("if (true) {{ {} }}", body)).expect_err("jump overflow");
        assert!(err.has_message("Too much code to jump over."));
    }

    #[test]
    fn test_loop_body_too_large() {
        let body = "print nil;".repeat(40_000);
        let err = compile(&format!("while (false) {{ {} }}", body)).expect_err("loop overflow");
        assert!(err.has_message("Loop body too large."));
    }

    #[test]
    fn test_missing_semicolon_at_end() {
        let err = compile("print 1").expect_err("missing semicolon");
        assert_eq!(err.to_string(), "[line 1] Error at end: Expect ';' after value.");
    }
}
