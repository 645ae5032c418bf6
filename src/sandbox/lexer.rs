//! Tokenizer for the cleaning language.

use crate::error::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Assign,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    /// Newline or `;` outside brackets.
    Separator,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Int(_) | TokenKind::Float(_) => "number".to_string(),
            TokenKind::Assign => "'='".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::Separator => "end of statement".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> ScriptError {
        ScriptError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let mut tokens = Vec::new();
    let mut cursor = Cursor::new(source);
    // newlines inside () and [] do not end a statement
    let mut depth = 0usize;

    while let Some(c) = cursor.peek() {
        let (line, column) = (cursor.line, cursor.column);
        let push = |tokens: &mut Vec<Token>, kind| tokens.push(Token { kind, line, column });

        match c {
            ' ' | '\t' | '\r' => {
                cursor.bump();
            }
            '\n' | ';' => {
                cursor.bump();
                if depth == 0 || c == ';' {
                    push(&mut tokens, TokenKind::Separator);
                }
            }
            '#' => {
                while let Some(c) = cursor.peek() {
                    if c == '\n' {
                        break;
                    }
                    cursor.bump();
                }
            }
            '"' | '\'' => {
                let value = lex_string(&mut cursor, c)?;
                push(&mut tokens, value);
            }
            '0'..='9' => {
                let number = lex_number(&mut cursor, false)?;
                push(&mut tokens, number);
            }
            '-' => {
                cursor.bump();
                match cursor.peek() {
                    Some(d) if d.is_ascii_digit() => {
                        let number = lex_number(&mut cursor, true)?;
                        push(&mut tokens, number);
                    }
                    _ => return Err(cursor.error(line, column, "'-' must be followed by a number")),
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(c) = cursor.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        cursor.bump();
                    } else {
                        break;
                    }
                }
                push(&mut tokens, TokenKind::Ident(ident));
            }
            '=' | '.' | ',' | '(' | ')' | '[' | ']' => {
                cursor.bump();
                let kind = match c {
                    '=' => TokenKind::Assign,
                    '.' => TokenKind::Dot,
                    ',' => TokenKind::Comma,
                    '(' => {
                        depth += 1;
                        TokenKind::LParen
                    }
                    '[' => {
                        depth += 1;
                        TokenKind::LBracket
                    }
                    ')' => {
                        depth = depth.saturating_sub(1);
                        TokenKind::RParen
                    }
                    _ => {
                        depth = depth.saturating_sub(1);
                        TokenKind::RBracket
                    }
                };
                push(&mut tokens, kind);
            }
            other => {
                return Err(cursor.error(line, column, format!("unexpected character '{}'", other)))
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line: cursor.line,
        column: cursor.column,
    });
    Ok(tokens)
}

fn lex_string(cursor: &mut Cursor<'_>, quote: char) -> Result<TokenKind, ScriptError> {
    let (line, column) = (cursor.line, cursor.column);
    cursor.bump();
    let mut value = String::new();
    loop {
        match cursor.bump() {
            Some(c) if c == quote => return Ok(TokenKind::Str(value)),
            Some('\\') => {
                let escaped = match cursor.bump() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some(c @ ('\\' | '"' | '\'')) => c,
                    Some(c) => {
                        return Err(cursor.error(
                            cursor.line,
                            cursor.column,
                            format!("unknown escape '\\{}'", c),
                        ))
                    }
                    None => break,
                };
                value.push(escaped);
            }
            Some('\n') | None => break,
            Some(c) => value.push(c),
        }
    }
    Err(cursor.error(line, column, "unterminated string literal"))
}

fn lex_number(cursor: &mut Cursor<'_>, negative: bool) -> Result<TokenKind, ScriptError> {
    let (line, column) = (cursor.line, cursor.column);
    let mut text = String::new();
    if negative {
        text.push('-');
    }
    let mut is_float = false;
    while let Some(c) = cursor.peek() {
        if c.is_ascii_digit() {
            text.push(c);
        } else if c == '.' && !is_float {
            is_float = true;
            text.push(c);
        } else {
            break;
        }
        cursor.bump();
    }

    if is_float {
        text.parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| cursor.error(line, column, format!("invalid number '{}'", text)))
    } else {
        text.parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| cursor.error(line, column, format!("integer '{}' out of range", text)))
    }
}
