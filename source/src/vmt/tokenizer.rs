use std::{iter::Peekable, str::Chars};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    OpenBrace,
    CloseBrace,
    String { text: String, quoted: bool },
    /// `#include`, `#base` and friends, without the `#`
    Control(String),
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Splits key value text into braces, strings and control statements.
/// Whitespace, newlines and `//` comments are dropped.
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

const UNQUOTED_DELIMS: &[char] = &[' ', '\t', '\r', '\n', '{', '}', '"'];

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    fn read_until_line_end(&mut self) -> String {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '\r' || c == '\n' {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    /// Only `\"` is an escape, so backslashes in texture paths survive.
    fn read_quoted(&mut self, line: usize, column: usize) -> Result<String, ParseError> {
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(text),
                Some('\\') if self.chars.peek() == Some(&'"') => {
                    self.advance();
                    text.push('"');
                }
                Some(c) => text.push(c),
                None => return Err(self.error(line, column, "unterminated quoted string")),
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        loop {
            let (line, column) = (self.line, self.column);
            let token = |kind| Token { kind, line, column };

            let Some(&c) = self.chars.peek() else {
                return Ok(token(TokenKind::Eof));
            };
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' => {
                    self.advance();
                    if self.chars.peek() != Some(&'/') {
                        return Err(self.error(line, column, "unexpected character '/'"));
                    }
                    self.read_until_line_end();
                }
                '{' => {
                    self.advance();
                    return Ok(token(TokenKind::OpenBrace));
                }
                '}' => {
                    self.advance();
                    return Ok(token(TokenKind::CloseBrace));
                }
                '"' => {
                    self.advance();
                    let text = self.read_quoted(line, column)?;
                    return Ok(token(TokenKind::String { text, quoted: true }));
                }
                '#' => {
                    self.advance();
                    let text = self.read_until_line_end();
                    return Ok(token(TokenKind::Control(text.trim_end().to_owned())));
                }
                _ => {
                    let mut text = String::new();
                    while let Some(&c) = self.chars.peek() {
                        if UNQUOTED_DELIMS.contains(&c) {
                            break;
                        }
                        text.push(c);
                        self.advance();
                    }
                    return Ok(token(TokenKind::String {
                        text,
                        quoted: false,
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tokenizer_tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let mut tokenizer = Tokenizer::new(text);
        let mut out = Vec::new();
        loop {
            let token = tokenizer.next_token().unwrap();
            if token.kind == TokenKind::Eof {
                return out;
            }
            out.push(token.kind);
        }
    }

    fn string(text: &str, quoted: bool) -> TokenKind {
        TokenKind::String {
            text: text.to_owned(),
            quoted,
        }
    }

    #[test]
    fn test_tokens() {
        let tokens = kinds("\"VertexLitGeneric\"\n{\n\t$basetexture models\\props\\crate // comment\n}");
        assert_eq!(
            tokens,
            vec![
                string("VertexLitGeneric", true),
                TokenKind::OpenBrace,
                string("$basetexture", false),
                string("models\\props\\crate", false),
                TokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn test_quoted_strings_keep_braces_and_escaped_quotes() {
        assert_eq!(
            kinds(r#""a {b}" "say \"hi\"""#),
            vec![string("a {b}", true), string("say \"hi\"", true)]
        );
    }

    #[test]
    fn test_control_statement() {
        assert_eq!(
            kinds("#include \"base.vmt\"\r\nkey"),
            vec![
                TokenKind::Control("include \"base.vmt\"".to_owned()),
                string("key", false)
            ]
        );
    }

    #[test]
    fn test_positions_and_errors() {
        let mut tokenizer = Tokenizer::new("a\n  {");
        tokenizer.next_token().unwrap();
        let brace = tokenizer.next_token().unwrap();
        assert_eq!((brace.line, brace.column), (2, 3));

        let err = Tokenizer::new("\n /x").next_token().unwrap_err();
        assert_eq!((err.line, err.column), (2, 2));

        assert!(Tokenizer::new("\"open").next_token().is_err());
    }
}
