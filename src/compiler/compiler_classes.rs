//! Class declaration compilation, plus `this`, `super`, and property access.

use crate::bytecode::OpCode;
use crate::lexer::TokenKind;

use super::compiler::{ClassCompiler, Compiler, FunctionType};

impl<'src> Compiler<'src> {
    pub(super) fn class_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect class name.");
        let class_name = self.previous;
        let name_constant = self.identifier_constant(class_name.lexeme);
        self.declare_variable();

        self.emit_op_operand(OpCode::Class, name_constant);
        self.define_variable(name_constant);

        self.classes.push(ClassCompiler {
            has_superclass: false,
        });

        if self.match_token(TokenKind::Less) {
            self.consume(TokenKind::Identifier, "Expect superclass name.");
            self.variable(false);

            if class_name.lexeme == self.previous.lexeme {
                self.error("A class can't inherit from itself.");
            }

            // The superclass lives in a hidden local so methods can capture it.
            self.begin_scope();
            self.add_local("super");
            self.define_variable(0);

            self.named_variable(class_name.lexeme, false);
            self.emit_op(OpCode::Inherit);
            if let Some(class) = self.classes.last_mut() {
                class.has_superclass = true;
            }
        }

        // Keep the class on the stack while its methods are bound.
        self.named_variable(class_name.lexeme, false);
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.method();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.");
        self.emit_op(OpCode::Pop);

        let has_superclass = self
            .classes
            .pop()
            .is_some_and(|class| class.has_superclass);
        if has_superclass {
            self.end_scope();
        }
    }

    fn method(&mut self) {
        self.consume(TokenKind::Identifier, "Expect method name.");
        let name = self.previous.lexeme;
        let constant = self.identifier_constant(name);

        let function_type = if name == "init" {
            FunctionType::Initializer
        } else {
            FunctionType::Method
        };
        self.function(function_type);
        self.emit_op_operand(OpCode::Method, constant);
    }

    pub(super) fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Identifier, "Expect property name after '.'.");
        let name = self.identifier_constant(self.previous.lexeme);

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op_operand(OpCode::SetProperty, name);
        } else if self.match_token(TokenKind::LeftParen) {
            let arg_count = self.argument_list();
            self.emit_op_operand(OpCode::Invoke, name);
            self.emit_byte(arg_count);
        } else {
            self.emit_op_operand(OpCode::GetProperty, name);
        }
    }

    pub(super) fn this(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Can't use 'this' outside of a class.");
            return;
        }
        self.variable(false);
    }

    pub(super) fn super_(&mut self, _can_assign: bool) {
        match self.classes.last().copied() {
            None => self.error("Can't use 'super' outside of a class."),
            Some(class) if !class.has_superclass => {
                self.error("Can't use 'super' in a class with no superclass.")
            }
            Some(_) => {}
        }

        self.consume(TokenKind::Dot, "Expect '.' after 'super'.");
        self.consume(TokenKind::Identifier, "Expect superclass method name.");
        let name = self.identifier_constant(self.previous.lexeme);

        self.named_variable("this", false);
        if self.match_token(TokenKind::LeftParen) {
            let arg_count = self.argument_list();
            self.named_variable("super", false);
            self.emit_op_operand(OpCode::SuperInvoke, name);
            self.emit_byte(arg_count);
        } else {
            self.named_variable("super", false);
            self.emit_op_operand(OpCode::GetSuper, name);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::compile;

    #[test]
    fn test_class_with_methods_compiles() {
        let source = r#"
            class A { init(x) { this.x = x; } get() { return this.x; } }
            class B < A { get() { return super.get() + 1; } }
        "#;
        assert!(compile(source).is_ok());
    }

    #[test]
    fn test_this_outside_class() {
        let err = compile("print this;").expect_err("this at top level");
        assert_eq!(
            err.to_string(),
            "[line 1] Error at 'this': Can't use 'this' outside of a class."
        );
    }

    #[test]
    fn test_super_errors() {
        let err = compile("fun f() { super.x(); }").expect_err("super outside class");
        assert!(err.has_message("Can't use 'super' outside of a class."));

        let err = compile("class A { m() { super.m(); } }").expect_err("no superclass");
        assert!(err.has_message("Can't use 'super' in a class with no superclass."));
    }

    #[test]
    fn test_inherit_from_self() {
        let err = compile("class A < A {}").expect_err("self inheritance");
        assert!(err.has_message("A class can't inherit from itself."));
    }

    #[test]
    fn test_initializer_cannot_return_value() {
        let err = compile("class A { init() { return 1; } }").expect_err("value return");
        assert!(err.has_message("Can't return a value from an initializer."));
        assert!(compile("class A { init() { return; } }").is_ok());
    }
}
