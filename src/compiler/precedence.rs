//! Operator precedence and the Pratt rule table.

use crate::lexer::TokenKind;

use super::compiler::Compiler;

/// Operator precedence levels (higher = tighter binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None = 0,
    Assignment = 1, // =
    Or = 2,         // or
    And = 3,        // and
    Equality = 4,   // == !=
    Comparison = 5, // < > <= >=
    Term = 6,       // + -
    Factor = 7,     // * /
    Unary = 8,      // ! -
    Call = 9,       // . ()
    Primary = 10,
}

impl Precedence {
    pub fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

/// A parse function receives whether the expression may be an assignment target.
pub type ParseFn<'src> = fn(&mut Compiler<'src>, bool);

#[derive(Clone, Copy)]
pub struct ParseRule<'src> {
    pub prefix: Option<ParseFn<'src>>,
    pub infix: Option<ParseFn<'src>>,
    pub precedence: Precedence,
}

impl<'src> ParseRule<'src> {
    const fn new(
        prefix: Option<ParseFn<'src>>,
        infix: Option<ParseFn<'src>>,
        precedence: Precedence,
    ) -> Self {
        Self {
            prefix,
            infix,
            precedence,
        }
    }
}

pub fn get_rule<'src>(kind: TokenKind) -> ParseRule<'src> {
    use Precedence as P;

    match kind {
        TokenKind::LeftParen => {
            ParseRule::new(Some(Compiler::grouping), Some(Compiler::call), P::Call)
        }
        TokenKind::Dot => ParseRule::new(None, Some(Compiler::dot), P::Call),
        TokenKind::Minus => ParseRule::new(Some(Compiler::unary), Some(Compiler::binary), P::Term),
        TokenKind::Plus => ParseRule::new(None, Some(Compiler::binary), P::Term),
        TokenKind::Slash | TokenKind::Star => {
            ParseRule::new(None, Some(Compiler::binary), P::Factor)
        }
        TokenKind::Bang => ParseRule::new(Some(Compiler::unary), None, P::None),
        TokenKind::BangEqual | TokenKind::EqualEqual => {
            ParseRule::new(None, Some(Compiler::binary), P::Equality)
        }
        TokenKind::Greater
        | TokenKind::GreaterEqual
        | TokenKind::Less
        | TokenKind::LessEqual => ParseRule::new(None, Some(Compiler::binary), P::Comparison),
        TokenKind::Identifier => ParseRule::new(Some(Compiler::variable), None, P::None),
        TokenKind::String => ParseRule::new(Some(Compiler::string), None, P::None),
        TokenKind::Number => ParseRule::new(Some(Compiler::number), None, P::None),
        TokenKind::And => ParseRule::new(None, Some(Compiler::and), P::And),
        TokenKind::Or => ParseRule::new(None, Some(Compiler::or), P::Or),
        TokenKind::False | TokenKind::Nil | TokenKind::True => {
            ParseRule::new(Some(Compiler::literal), None, P::None)
        }
        TokenKind::Super => ParseRule::new(Some(Compiler::super_), None, P::None),
        TokenKind::This => ParseRule::new(Some(Compiler::this), None, P::None),
        _ => ParseRule::new(None, None, P::None),
    }
}
