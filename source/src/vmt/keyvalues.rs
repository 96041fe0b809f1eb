use std::fmt;

use super::tokenizer::{ParseError, Token, TokenKind, Tokenizer};

const MAX_DEPTH: usize = 64;

/// Either a string or a list of children, never both.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyValue {
    Leaf(String),
    Interior(Vec<KeyValues>),
}

/// Node of a Valve key value document. The root has an empty key and holds the top level nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValues {
    pub key: String,
    pub value: KeyValue,
}

impl KeyValues {
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: KeyValue::Leaf(value.into()),
        }
    }

    pub fn interior(key: impl Into<String>, children: Vec<KeyValues>) -> Self {
        Self {
            key: key.into(),
            value: KeyValue::Interior(children),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut parser = Parser {
            tokens: Tokenizer::new(text),
            peeked: None,
        };
        let mut children = Vec::new();
        loop {
            let token = parser.next()?;
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::String { text, .. } => children.push(parser.node(text, 0)?),
                _ => return Err(unexpected(&token, "a key")),
            }
        }
        Ok(Self::interior("", children))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.value, KeyValue::Leaf(_))
    }

    pub fn value(&self) -> Option<&str> {
        match &self.value {
            KeyValue::Leaf(v) => Some(v),
            KeyValue::Interior(_) => None,
        }
    }

    /// Empty for leaves.
    pub fn children(&self) -> &[KeyValues] {
        match &self.value {
            KeyValue::Leaf(_) => &[],
            KeyValue::Interior(children) => children,
        }
    }

    /// First child named `key`, ignoring ASCII case like the engine does.
    pub fn child(&self, key: &str) -> Option<&KeyValues> {
        self.children()
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(key))
    }

    /// Turns an interior node into a leaf, dropping its children.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = KeyValue::Leaf(value.into());
    }

    /// Turns a leaf into an interior node, dropping its value.
    pub fn push_child(&mut self, child: KeyValues) {
        match &mut self.value {
            KeyValue::Interior(children) => children.push(child),
            KeyValue::Leaf(_) => self.value = KeyValue::Interior(vec![child]),
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "\t".repeat(depth);
        match &self.value {
            KeyValue::Leaf(value) => {
                writeln!(f, "{indent}{} {}", quote(&self.key), quote(value))
            }
            KeyValue::Interior(children) => {
                writeln!(f, "{indent}{}", quote(&self.key))?;
                writeln!(f, "{indent}{{")?;
                for child in children {
                    child.write(f, depth + 1)?;
                }
                writeln!(f, "{indent}}}")
            }
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

/// Writes the text form. A root node writes only its children.
impl fmt::Display for KeyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            for child in self.children() {
                child.write(f, 0)?;
            }
            Ok(())
        } else {
            self.write(f, 0)
        }
    }
}

fn unexpected(token: &Token, expected: &str) -> ParseError {
    let found = match &token.kind {
        TokenKind::OpenBrace => "'{'".to_owned(),
        TokenKind::CloseBrace => "'}'".to_owned(),
        TokenKind::String { text, .. } => format!("{:?}", text),
        TokenKind::Control(text) => format!("#{}", text),
        TokenKind::Eof => "end of file".to_owned(),
    };
    ParseError {
        line: token.line,
        column: token.column,
        message: format!("expected {expected}, found {found}"),
    }
}

/// Platform conditionals such as `[$WIN32]` trail keys and values unquoted.
fn is_conditional(kind: &TokenKind) -> bool {
    match kind {
        TokenKind::String {
            text,
            quoted: false,
        } => text.starts_with('[') && text.ends_with(']'),
        _ => false,
    }
}

struct Parser<'a> {
    tokens: Tokenizer<'a>,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    /// Next token, skipping control statements.
    fn next(&mut self) -> Result<Token, ParseError> {
        loop {
            let token = match self.peeked.take() {
                Some(token) => token,
                None => self.tokens.next_token()?,
            };
            match &token.kind {
                TokenKind::Control(statement) => {
                    log::warn!(
                        "key values control statement #{} on line {} is not supported, ignoring",
                        statement,
                        token.line
                    );
                }
                _ => return Ok(token),
            }
        }
    }

    fn skip_conditional(&mut self) -> Result<(), ParseError> {
        let token = self.next()?;
        if !is_conditional(&token.kind) {
            self.peeked = Some(token);
        }
        Ok(())
    }

    fn node(&mut self, key: String, depth: usize) -> Result<KeyValues, ParseError> {
        self.skip_conditional()?;
        let token = self.next()?;
        match token.kind {
            TokenKind::String { text, .. } => {
                self.skip_conditional()?;
                Ok(KeyValues::leaf(key, text))
            }
            TokenKind::OpenBrace => {
                if depth >= MAX_DEPTH {
                    return Err(ParseError {
                        line: token.line,
                        column: token.column,
                        message: format!("nesting deeper than {MAX_DEPTH} levels"),
                    });
                }
                let mut children = Vec::new();
                loop {
                    let token = self.next()?;
                    match token.kind {
                        TokenKind::CloseBrace => break,
                        TokenKind::String { text, .. } => {
                            children.push(self.node(text, depth + 1)?)
                        }
                        _ => return Err(unexpected(&token, "a key or '}'")),
                    }
                }
                Ok(KeyValues::interior(key, children))
            }
            _ => Err(unexpected(&token, "a value or '{'")),
        }
    }
}
