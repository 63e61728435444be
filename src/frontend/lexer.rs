use std::{collections::{BTreeMap, VecDeque}, str::Chars};

use itertools::{peek_nth, PeekNth};
use once_cell::sync::Lazy;
use strum::EnumString;

use crate::diagnostics::report_fatal;

use super::SourceFile;

#[derive(Debug)]
pub struct Lexer<'source> {
    source: &'source SourceFile,
    position: usize,
    chars: PeekNth<Chars<'source>>,
    peek_buffer: VecDeque<Token>,
}

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // while
    Identifier,       // main

    /* Literals */
    IntegerLiteral, // 1
    StringLiteral,  // "hello, world"

    /* Delimiters */
    OpenParen,    // (
    CloseParen,   // )
    OpenBracket,  // [
    CloseBracket, // ]
    OpenBrace,    // {
    CloseBrace,   // }
    Semicolon,    // ;
    Comma,        // ,
    Colon,        // :

    /* Operators */
    Assign,     // =
    PlusPlus,   // ++
    MinusMinus, // --
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Bang,       // !
    And,        // &&
    Or,         // ||
    Equals,     // ==
    NotEquals,  // !=
    Less,       // <
    LessEq,     // <=
    Greater,    // >
    GreaterEq,  // >=
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Int,
    Byte,
    Bool,
    Void,
    Array,
    If,
    Else,
    While,
    Return,
    Read,
    Write,
    Havoc,
    True,
    False,
}

/// Table of single char tokens (matched after longer sequences are checked for)
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('[', TokenKind::OpenBracket),
        (']', TokenKind::CloseBracket),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        (':', TokenKind::Colon),
        ('=', TokenKind::Assign),
        ('+', TokenKind::Plus),
        ('-', TokenKind::Minus),
        ('*', TokenKind::Star),
        ('/', TokenKind::Slash),
        ('!', TokenKind::Bang),
        ('<', TokenKind::Less),
        ('>', TokenKind::Greater),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            source,
            chars: peek_nth(source.contents.chars()),
            position: 0,
            peek_buffer: VecDeque::new(),
        }
    }

    pub fn source(&self) -> &SourceFile {
        self.source
    }

    fn ignore_whitespace(&mut self) {
        while let Some(c) = self.chars.peek().copied() {
            if !c.is_ascii_whitespace() {
                break;
            }

            self.chars.next();
            self.position += 1;
        }
    }

    fn ignore_line(&mut self) {
        while let Some(c) = self.chars.peek().copied() {
            if c == '\n' {
                break;
            }

            self.chars.next();
            self.position += c.len_utf8();
        }
    }

    /// Reads a quote-wrapped string literal; `\"` escapes stay inside it.
    /// An unterminated literal is reported and ignored, like any other
    /// scanner-level garbage.
    fn read_string(&mut self) -> Option<Token> {
        let start_position = self.position;

        // Consume the opening quote
        self.chars.next();
        self.position += 1;

        while let Some(c) = self.chars.peek().copied() {
            if c == '\n' {
                break;
            }

            self.chars.next();
            self.position += c.len_utf8();

            if c == '\\' && self.chars.peek().is_some_and(|c| *c == '"') {
                self.chars.next();
                self.position += 1;
                continue;
            }

            if c == '"' {
                return Some(Token {
                    kind: TokenKind::StringLiteral,
                    span: self.new_span(start_position),
                });
            }
        }

        report_fatal(
            self.source.position_of(start_position),
            "Unterminated string literal ignored",
        );
        None
    }

    // Keyword or identifier
    fn read_word(&mut self) -> Token {
        let start_position = self.position;

        while let Some(c) = self.chars.peek().copied() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }

            self.chars.next();
            self.position += 1;
        }

        let span = self.new_span(start_position);
        let value = self.source.value_of_span(span);

        let kind = if let Ok(keyword) = value.parse() {
            TokenKind::Keyword(keyword)
        } else {
            TokenKind::Identifier
        };

        Token { kind, span }
    }

    fn read_number(&mut self) -> Token {
        let start_position = self.position;

        while let Some(c) = self.chars.peek().copied() {
            if !c.is_ascii_digit() {
                break;
            }

            self.chars.next();
            self.position += 1;
        }

        Token {
            kind: TokenKind::IntegerLiteral,
            span: self.new_span(start_position),
        }
    }

    fn read_single(&mut self, kind: TokenKind) -> Token {
        let start_position = self.position;

        self.chars.next();
        self.position += 1;

        Token {
            kind,
            span: self.new_span(start_position),
        }
    }

    fn read_double(&mut self, kind: TokenKind) -> Token {
        let start_position = self.position;

        self.chars.next();
        self.chars.next();

        self.position += 2;

        Token {
            kind,
            span: self.new_span(start_position),
        }
    }

    fn new_span(&self, start: usize) -> Span {
        Span {
            start,
            end: self.position,
        }
    }

    pub fn peek(&mut self) -> Option<Token> {
        self.peek_nth(0)
    }

    /// Peeks `n` tokens past the cursor (0 is the next token). The parser
    /// needs two tokens of lookahead to tell declarations from statements.
    pub fn peek_nth(&mut self, n: usize) -> Option<Token> {
        while self.peek_buffer.len() <= n {
            let token = self.read_token()?;
            self.peek_buffer.push_back(token);
        }

        self.peek_buffer.get(n).copied()
    }

    pub fn next(&mut self) -> Option<Token> {
        if !self.peek_buffer.is_empty() {
            return self.peek_buffer.pop_front();
        }

        self.read_token()
    }

    fn read_token(&mut self) -> Option<Token> {
        while let Some(c) = self.chars.peek().copied() {
            let token = match c {
                // Ignore whitespace
                c if c.is_ascii_whitespace() => {
                    self.ignore_whitespace();
                    continue;
                }
                // Ignore comments
                '/' if self.chars.peek_nth(1).is_some_and(|c| *c == '/') => {
                    self.ignore_line();
                    continue;
                }

                // String literals
                '"' => match self.read_string() {
                    Some(token) => token,
                    None => continue,
                },

                // Integer literals
                n if n.is_ascii_digit() => self.read_number(),

                // Identifiers and keywords
                a if a.is_ascii_alphabetic() || a == '_' => self.read_word(),

                // Post-increment (++) and post-decrement (--)
                '+' if self.chars.peek_nth(1).is_some_and(|c| *c == '+') => {
                    self.read_double(TokenKind::PlusPlus)
                }
                '-' if self.chars.peek_nth(1).is_some_and(|c| *c == '-') => {
                    self.read_double(TokenKind::MinusMinus)
                }

                // Double Equals (==)
                '=' if self.chars.peek_nth(1).is_some_and(|c| *c == '=') => {
                    self.read_double(TokenKind::Equals)
                }
                // Not Equals (!=)
                '!' if self.chars.peek_nth(1).is_some_and(|c| *c == '=') => {
                    self.read_double(TokenKind::NotEquals)
                }
                // Less than or equal (<=)
                '<' if self.chars.peek_nth(1).is_some_and(|c| *c == '=') => {
                    self.read_double(TokenKind::LessEq)
                }
                // Greater than or equal (>=)
                '>' if self.chars.peek_nth(1).is_some_and(|c| *c == '=') => {
                    self.read_double(TokenKind::GreaterEq)
                }

                // Logical And (&&)
                '&' if self.chars.peek_nth(1).is_some_and(|c| *c == '&') => {
                    self.read_double(TokenKind::And)
                }
                // Logical Or (||)
                '|' if self.chars.peek_nth(1).is_some_and(|c| *c == '|') => {
                    self.read_double(TokenKind::Or)
                }

                s if SINGLE_TOKENS.contains_key(&s) => {
                    self.read_single(*SINGLE_TOKENS.get(&s).unwrap())
                }

                c => {
                    report_fatal(
                        self.source.position_of(self.position),
                        &format!("Illegal character {c}"),
                    );
                    self.chars.next();
                    self.position += c.len_utf8();
                    continue;
                }
            };

            return Some(token);
        }

        None
    }
}

/// Renders the token stream of a source file, one `KIND [line,col]` line per
/// token (value-carrying kinds as `KIND:value [line,col]`), ending with an
/// `EOF` marker. This is the `-t` scanner boundary.
pub fn output_tokens(source: &SourceFile) -> String {
    let mut lexer = Lexer::new(source);
    let mut out = String::new();

    while let Some(token) = lexer.next() {
        let pos = source.position_of_span(token.span);
        let text = source.value_of_span(token.span);

        let name = match token.kind {
            TokenKind::Keyword(keyword) => keyword.to_string().to_uppercase(),
            TokenKind::Identifier => format!("ID:{text}"),
            TokenKind::IntegerLiteral => format!("INTLIT:{text}"),
            TokenKind::StringLiteral => format!("STRLIT:{text}"),
            TokenKind::OpenParen => "LPAREN".to_string(),
            TokenKind::CloseParen => "RPAREN".to_string(),
            TokenKind::OpenBracket => "LBRACKET".to_string(),
            TokenKind::CloseBracket => "RBRACKET".to_string(),
            TokenKind::OpenBrace => "LCURLY".to_string(),
            TokenKind::CloseBrace => "RCURLY".to_string(),
            TokenKind::Semicolon => "SEMICOLON".to_string(),
            TokenKind::Comma => "COMMA".to_string(),
            TokenKind::Colon => "COLON".to_string(),
            TokenKind::Assign => "ASSIGN".to_string(),
            TokenKind::PlusPlus => "PLUSPLUS".to_string(),
            TokenKind::MinusMinus => "MINUSMINUS".to_string(),
            TokenKind::Plus => "PLUS".to_string(),
            TokenKind::Minus => "MINUS".to_string(),
            TokenKind::Star => "STAR".to_string(),
            TokenKind::Slash => "SLASH".to_string(),
            TokenKind::Bang => "NOT".to_string(),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Equals => "EQUALS".to_string(),
            TokenKind::NotEquals => "NOTEQUALS".to_string(),
            TokenKind::Less => "LESS".to_string(),
            TokenKind::LessEq => "LESSEQ".to_string(),
            TokenKind::Greater => "GREATER".to_string(),
            TokenKind::GreaterEq => "GREATEREQ".to_string(),
        };

        out.push_str(&format!("{name} {pos}\n"));
    }

    let eof = source.position_of(source.contents.len());
    out.push_str(&format!("EOF {eof}\n"));

    out
}
