//! Recursive-descent parser.
//!
//! Grammar, lowest to highest precedence:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := NUMBER | IDENTIFIER | '(' expr ')'
//! ```
//!
//! A `@Deadline(ms=N)` annotation prefixing a construct wraps it in an
//! [`AstNode::Deadline`]. `parse_program` additionally accepts class
//! declarations with fields and expression-bodied methods.
//!
//! Parse failure is immediate and non-recoverable for the current parse; no
//! synchronization or recovery is attempted.

use thiserror::Error;

use super::ast::{AstNode, BinOp, ClassDef, FieldDef, MethodDef};
use super::lexer::{Token, TokenKind};

/// Parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("malformed @Deadline annotation: {detail}")]
    MalformedAnnotation { detail: String },
}

/// Output of [`Parser::parse_program`]: declarations plus loose expressions.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub classes: Vec<ClassDef>,
    pub expressions: Vec<AstNode>,
}

/// Token-stream parser. Create one per parse; tokens are consumed in order.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    /// Parses a whole program: any number of class declarations interleaved
    /// with loose top-level expressions (each optionally deadline-annotated).
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();

        while !self.at_end() {
            if self.check_keyword("class") {
                program.classes.push(self.parse_class()?);
            } else {
                program.expressions.push(self.parse_annotated()?);
            }
        }

        Ok(program)
    }

    /// Parses a single expression, honoring a leading `@Deadline(ms=N)`.
    pub fn parse_annotated(&mut self) -> Result<AstNode, ParseError> {
        if self.check_symbol("@") {
            let ms = self.parse_deadline_annotation()?;
            let body = self.parse_annotated()?;
            return Ok(AstNode::Deadline {
                ms,
                body: Box::new(body),
            });
        }
        self.parse_expression()
    }

    /// `expr := term (('+'|'-') term)*`
    pub fn parse_expression(&mut self) -> Result<AstNode, ParseError> {
        let mut left = self.parse_term()?;

        loop {
            let op = if self.match_operator("+") {
                BinOp::Add
            } else if self.match_operator("-") {
                BinOp::Sub
            } else {
                break;
            };
            let right = self.parse_term()?;
            left = AstNode::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// `term := factor (('*'|'/') factor)*`
    fn parse_term(&mut self) -> Result<AstNode, ParseError> {
        let mut left = self.parse_factor()?;

        loop {
            let op = if self.match_operator("*") {
                BinOp::Mul
            } else if self.match_operator("/") {
                BinOp::Div
            } else {
                break;
            };
            let right = self.parse_factor()?;
            left = AstNode::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// `factor := NUMBER | IDENTIFIER | '(' expr ')'`
    fn parse_factor(&mut self) -> Result<AstNode, ParseError> {
        if let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Number => {
                    let lexeme = token.lexeme.clone();
                    self.advance();
                    return Ok(AstNode::Number(parse_int_lexeme(&lexeme)?));
                }
                TokenKind::Identifier => {
                    let name = token.lexeme.clone();
                    self.advance();
                    return Ok(AstNode::Variable(name));
                }
                TokenKind::Symbol if token.lexeme == "(" => {
                    self.advance();
                    let expr = self.parse_expression()?;
                    self.expect_symbol(")")?;
                    return Ok(expr);
                }
                _ => {}
            }
        }

        Err(self.unexpected("number, identifier, or '('"))
    }

    /// Parses `@Deadline(ms=N)` and returns `N`.
    ///
    /// Every token of the annotation is mandatory; any deviation — including
    /// a non-integer budget — fails with [`ParseError::MalformedAnnotation`].
    fn parse_deadline_annotation(&mut self) -> Result<u64, ParseError> {
        self.expect_annotation_symbol("@")?;
        self.expect_annotation_identifier("Deadline")?;
        self.expect_annotation_symbol("(")?;
        self.expect_annotation_identifier("ms")?;
        self.expect_annotation_operator("=")?;

        let token = self.advance().cloned().ok_or(ParseError::MalformedAnnotation {
            detail: "missing millisecond budget".to_string(),
        })?;
        if token.kind != TokenKind::Number {
            return Err(ParseError::MalformedAnnotation {
                detail: format!("budget must be an integer literal, found '{}'", token.lexeme),
            });
        }
        let ms = parse_uint_lexeme(&token.lexeme).ok_or(ParseError::MalformedAnnotation {
            detail: format!("invalid millisecond budget '{}'", token.lexeme),
        })?;

        self.expect_annotation_symbol(")")?;
        Ok(ms)
    }

    /// `class Name (extends Super)? '{' member* '}'`
    fn parse_class(&mut self) -> Result<ClassDef, ParseError> {
        self.expect_keyword("class")?;
        let name = self.expect_identifier("class name")?;
        let mut class = ClassDef::new(name);

        if self.match_keyword("extends") {
            let superclass = self.expect_identifier("superclass name")?;
            class.set_superclass(superclass);
        }

        self.expect_symbol("{")?;
        while !self.check_symbol("}") {
            self.parse_member(&mut class)?;
        }
        self.expect_symbol("}")?;

        Ok(class)
    }

    /// A member is a field `Type name ;` or an expression-bodied method
    /// `(@Deadline(ms=N))? Type name '(' params ')' '{' expr? '}'`.
    fn parse_member(&mut self, class: &mut ClassDef) -> Result<(), ParseError> {
        let deadline_ms = if self.check_symbol("@") {
            Some(self.parse_deadline_annotation()?)
        } else {
            None
        };

        let type_name = self.expect_type_name()?;
        let member_name = self.expect_identifier("member name")?;

        if !self.check_symbol("(") {
            // Field declaration.
            if deadline_ms.is_some() {
                return Err(ParseError::MalformedAnnotation {
                    detail: "@Deadline applies to methods, not fields".to_string(),
                });
            }
            self.expect_operator(";")?;
            class.add_field(FieldDef::new(member_name, type_name));
            return Ok(());
        }

        self.expect_symbol("(")?;
        let mut parameter_types = Vec::new();
        if !self.check_symbol(")") {
            loop {
                let param_type = self.expect_type_name()?;
                self.expect_identifier("parameter name")?;
                parameter_types.push(param_type);
                if !self.match_symbol(",") {
                    break;
                }
            }
        }
        self.expect_symbol(")")?;

        self.expect_symbol("{")?;
        let body = if self.check_symbol("}") {
            AstNode::Number(0)
        } else {
            self.parse_annotated()?
        };
        self.expect_symbol("}")?;

        let mut method = MethodDef::new_ast(member_name, parameter_types, type_name, body);
        if let Some(ms) = deadline_ms {
            method.set_deadline_ms(ms);
        }
        class.add_method(method);
        Ok(())
    }

    // --- token-stream helpers ---

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn check(&self, kind: TokenKind, lexeme: &str) -> bool {
        self.peek()
            .map(|t| t.kind == kind && t.lexeme == lexeme)
            .unwrap_or(false)
    }

    fn check_symbol(&self, lexeme: &str) -> bool {
        self.check(TokenKind::Symbol, lexeme)
    }

    fn check_keyword(&self, lexeme: &str) -> bool {
        self.check(TokenKind::Keyword, lexeme)
    }

    fn match_token(&mut self, kind: TokenKind, lexeme: &str) -> bool {
        if self.check(kind, lexeme) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn match_operator(&mut self, lexeme: &str) -> bool {
        self.match_token(TokenKind::Operator, lexeme)
    }

    fn match_symbol(&mut self, lexeme: &str) -> bool {
        self.match_token(TokenKind::Symbol, lexeme)
    }

    fn match_keyword(&mut self, lexeme: &str) -> bool {
        self.match_token(TokenKind::Keyword, lexeme)
    }

    fn expect_symbol(&mut self, lexeme: &str) -> Result<(), ParseError> {
        if self.match_symbol(lexeme) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", lexeme)))
        }
    }

    fn expect_operator(&mut self, lexeme: &str) -> Result<(), ParseError> {
        if self.match_operator(lexeme) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", lexeme)))
        }
    }

    fn expect_keyword(&mut self, lexeme: &str) -> Result<(), ParseError> {
        if self.match_keyword(lexeme) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", lexeme)))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => {
                let name = t.lexeme.clone();
                self.position += 1;
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// Type position: a type keyword (`int`, `boolean`, `void`, `String`) or
    /// a class name identifier.
    fn expect_type_name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(t)
                if t.kind == TokenKind::Identifier
                    || (t.kind == TokenKind::Keyword
                        && matches!(t.lexeme.as_str(), "int" | "boolean" | "void" | "String")) =>
            {
                let name = t.lexeme.clone();
                self.position += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("type name")),
        }
    }

    fn expect_annotation_symbol(&mut self, lexeme: &str) -> Result<(), ParseError> {
        if self.match_symbol(lexeme) {
            Ok(())
        } else {
            Err(self.malformed(&format!("expected '{}'", lexeme)))
        }
    }

    fn expect_annotation_identifier(&mut self, lexeme: &str) -> Result<(), ParseError> {
        if self.match_token(TokenKind::Identifier, lexeme) {
            Ok(())
        } else {
            Err(self.malformed(&format!("expected '{}'", lexeme)))
        }
    }

    fn expect_annotation_operator(&mut self, lexeme: &str) -> Result<(), ParseError> {
        if self.match_operator(lexeme) {
            Ok(())
        } else {
            Err(self.malformed(&format!("expected '{}'", lexeme)))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self
                .peek()
                .map(|t| format!("'{}'", t.lexeme))
                .unwrap_or_else(|| "end of input".to_string()),
        }
    }

    fn malformed(&self, detail: &str) -> ParseError {
        ParseError::MalformedAnnotation {
            detail: format!(
                "{}, found {}",
                detail,
                self.peek()
                    .map(|t| format!("'{}'", t.lexeme))
                    .unwrap_or_else(|| "end of input".to_string())
            ),
        }
    }
}

/// Parses a number lexeme (decimal or `0x`/`0b` prefixed) as a 32-bit signed
/// integer, truncating out-of-range values the way the runtime's arithmetic
/// truncates.
fn parse_int_lexeme(lexeme: &str) -> Result<i32, ParseError> {
    parse_uint_lexeme(lexeme)
        .map(|n| n as u32 as i32)
        .ok_or_else(|| ParseError::UnexpectedToken {
            expected: "integer literal".to_string(),
            found: format!("'{}'", lexeme),
        })
}

fn parse_uint_lexeme(lexeme: &str) -> Option<u64> {
    let lower = lexeme.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else {
        lexeme.parse::<u64>().ok()
    }
}
