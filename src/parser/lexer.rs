//! Lexer (tokenizer) for the class language.
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the
//! parser. A `\uXXXX` expansion pass runs over the entire source before
//! scanning, so unicode escapes are visible inside identifiers, numbers,
//! strings, and comments alike.
//!
//! Whitespace and both comment styles (`// ...`, `/* ... */`) are skipped and
//! never emitted; an unterminated block comment scans to end of input without
//! failing. Two-character operators are matched greedily before their
//! one-character prefixes.

use thiserror::Error;

/// Token categories. The lexeme carries the concrete text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number,
    Str,
    Operator,
    Symbol,
}

/// A single token: category plus lexeme. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
        }
    }

    /// Canonical source form of the token: the lexeme, re-quoted for string
    /// literals so a token stream can be joined back into scannable source.
    pub fn text(&self) -> String {
        match self.kind {
            TokenKind::Str => format!("\"{}\"", self.lexeme),
            _ => self.lexeme.clone(),
        }
    }
}

/// Lexing failures. Positions are character offsets into the
/// escape-expanded source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated literal starting at offset {position}")]
    UnterminatedLiteral { position: usize },

    #[error("unexpected character '{ch}' at offset {position}")]
    UnexpectedCharacter { ch: char, position: usize },
}

/// Reserved words of the class language.
const KEYWORDS: &[&str] = &[
    "boolean", "break", "class", "const", "continue", "else", "extends",
    "false", "if", "import", "int", "new", "return", "static", "String",
    "this", "true", "void", "while",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_identifier_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Expands `\uXXXX` escapes over the whole source before scanning.
///
/// A backslash-u that is not followed by four hex digits (or that names an
/// invalid code point) is passed through untouched rather than rejected;
/// the scanner will then report it at its real position.
fn expand_unicode_escapes(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1) == Some(&'u') {
            let hex: String = chars[i + 2..].iter().take(4).collect();
            if hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                // Hex digits validated above, so the parse cannot fail.
                if let Ok(code) = u32::from_str_radix(&hex, 16) {
                    if let Some(ch) = char::from_u32(code) {
                        out.push(ch);
                        i += 6;
                        continue;
                    }
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Single-pass scanner over the escape-expanded source.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    /// Creates a lexer; the unicode-escape expansion happens here.
    pub fn new(source: &str) -> Self {
        Lexer {
            input: expand_unicode_escapes(source).chars().collect(),
            position: 0,
        }
    }

    /// Tokenizes the entire input. Total and deterministic: every input
    /// either yields a token vector or a [`LexError`].
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();

            let ch = match self.peek() {
                Some(ch) => ch,
                None => break,
            };

            if is_identifier_start(ch) {
                tokens.push(self.identifier_or_keyword());
            } else if ch.is_ascii_digit() {
                tokens.push(self.number());
            } else if ch == '"' || ch == '\'' {
                tokens.push(self.string_literal()?);
            } else if let Some(op) = self.two_char_operator() {
                tokens.push(Token::new(TokenKind::Operator, op));
            } else if "+-*/%=;<>!&|".contains(ch) {
                self.advance();
                tokens.push(Token::new(TokenKind::Operator, ch.to_string()));
            } else if "(){}@,".contains(ch) {
                self.advance();
                tokens.push(Token::new(TokenKind::Symbol, ch.to_string()));
            } else {
                return Err(LexError::UnexpectedCharacter {
                    ch,
                    position: self.position,
                });
            }
        }

        Ok(tokens)
    }

    /// Greedy two-character operator match; consumes on success.
    fn two_char_operator(&mut self) -> Option<&'static str> {
        const TWO_CHAR: &[(&str, char, char)] = &[
            ("==", '=', '='),
            ("!=", '!', '='),
            (">=", '>', '='),
            ("<=", '<', '='),
            ("&&", '&', '&'),
            ("||", '|', '|'),
        ];

        let first = self.peek()?;
        let second = self.peek_ahead(1)?;
        for (lexeme, a, b) in TWO_CHAR {
            if first == *a && second == *b {
                self.advance();
                self.advance();
                return Some(lexeme);
            }
        }
        None
    }

    fn identifier_or_keyword(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.peek() {
            if is_identifier_continue(ch) {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_keyword(&ident) {
            Token::new(TokenKind::Keyword, ident)
        } else {
            Token::new(TokenKind::Identifier, ident)
        }
    }

    /// Scans decimal, `0x`/`0X`, and `0b`/`0B` literals. Underscore
    /// separators are allowed anywhere inside the digits and stripped from
    /// the lexeme; the radix prefix is retained.
    fn number(&mut self) -> Token {
        let mut num = String::new();
        let mut is_hex = false;
        let mut is_binary = false;

        if self.peek() == Some('0') {
            match self.peek_ahead(1) {
                Some('x') | Some('X') => {
                    is_hex = true;
                    num.push(self.advance_unchecked());
                    num.push(self.advance_unchecked());
                }
                Some('b') | Some('B') => {
                    is_binary = true;
                    num.push(self.advance_unchecked());
                    num.push(self.advance_unchecked());
                }
                _ => {}
            }
        }

        while let Some(ch) = self.peek() {
            if ch == '_' {
                self.advance();
                continue;
            }
            let accept = if is_hex {
                ch.is_ascii_hexdigit()
            } else if is_binary {
                ch == '0' || ch == '1'
            } else {
                ch.is_ascii_digit()
            };
            if !accept {
                break;
            }
            num.push(ch);
            self.advance();
        }

        Token::new(TokenKind::Number, num)
    }

    /// Scans a `"`- or `'`-delimited string. `\n`, `\t`, and `\"` are
    /// translated; any other escaped character passes through literally.
    fn string_literal(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let quote = self.advance_unchecked();
        let mut text = String::new();

        loop {
            let ch = match self.peek() {
                Some(ch) => ch,
                None => return Err(LexError::UnterminatedLiteral { position: start }),
            };

            if ch == quote {
                self.advance();
                return Ok(Token::new(TokenKind::Str, text));
            }

            if ch == '\\' {
                self.advance();
                let escaped = match self.peek() {
                    Some(e) => e,
                    None => return Err(LexError::UnterminatedLiteral { position: start }),
                };
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    '"' => text.push('"'),
                    other => text.push(other),
                }
                self.advance();
            } else {
                text.push(ch);
                self.advance();
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_ahead(1) == Some('/') => {
                    while let Some(ch) = self.peek() {
                        self.advance();
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_ahead(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    // An unterminated block comment scans to end of input.
                    while let Some(ch) = self.peek() {
                        if ch == '*' && self.peek_ahead(1) == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        Some(ch)
    }

    /// `advance` where the caller has already peeked the character.
    fn advance_unchecked(&mut self) -> char {
        let ch = self.input[self.position];
        self.position += 1;
        ch
    }
}

/// Convenience entry point: lex a whole source string.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}
