use std::str::Chars;

use crate::error::ListingError;
use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Идентификаторы и ссылки
    Identifier(String), // goto, java, int
    Variable(String),   // @a
    Label(String),      // $start
    Quoted(String),     // `java.lang.Object.toString()Ljava/lang/String;`
    // Литералы
    StringLiteral(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    // Пунктуация
    Assign,             // :=
    Colon,              // :
    Comma,              // ,
    LParen,             // (
    RParen,             // )
    LBracket,           // [
    RBracket,           // ]
    Dot,                // .
    Plus,               // +
    Minus,              // -
    Star,               // *
    Slash,              // /
    Percent,            // %
    Ampersand,          // &
    Pipe,               // |
    Caret,              // ^
    ShiftLeft,          // <<
    ShiftRight,         // >>
    ShiftRightUnsigned, // >>>
    Equal,              // ==
    NotEqual,           // !=
    ReferenceEqual,     // ===
    ReferenceNotEqual,  // !==
    Less,               // <
    LessOrEqual,        // <=
    Greater,            // >
    GreaterOrEqual,     // >=
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn offset(&self) -> usize {
        self.span.start
    }

    pub fn is_identifier(&self, text: &str) -> bool {
        matches!(&self.kind, TokenKind::Identifier(name) if name == text)
    }
}

/// Ленивый поток токенов. Смещения считаются в символах.
///
/// As an iterator it yields `End` (or the first error) once and then stops.
#[derive(Clone)]
pub struct Lexer<'a> {
    chars: Chars<'a>,
    offset: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { chars: source.chars(), offset: 0, finished: false }
    }

    pub fn next_token(&mut self) -> Result<Token, ListingError> {
        self.skip_whitespace_and_comments();

        let start = self.offset;
        let Some(ch) = self.peek() else {
            return Ok(Token { kind: TokenKind::End, span: Span::new(start, start) });
        };

        let kind = match ch {
            '0'..='9' => self.read_number()?,
            '-' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number()?,
            'a'..='z' | 'A'..='Z' | '_' => TokenKind::Identifier(self.read_name()),
            '@' => {
                self.bump();
                TokenKind::Variable(self.read_reference_name(start, "variable")?)
            }
            '$' => {
                self.bump();
                TokenKind::Label(self.read_reference_name(start, "block label")?)
            }
            '"' => TokenKind::StringLiteral(self.read_string()?),
            '`' => TokenKind::Quoted(self.read_quoted()?),
            _ => self.read_punctuation(ch)?,
        };

        Ok(Token { kind, span: Span::new(start, self.offset) })
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.offset += 1;
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_nth(1) == Some('/') => {
                    // Комментарии - пропускаем до конца строки
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if !is_name_char(ch) {
                break;
            }
            name.push(ch);
            self.bump();
        }
        name
    }

    fn read_reference_name(&mut self, start: usize, what: &str) -> Result<String, ListingError> {
        let name = self.read_name();
        if name.is_empty() {
            return Err(ListingError::lexical(start, format!("expected {} name", what)));
        }
        Ok(name)
    }

    fn read_number(&mut self) -> Result<TokenKind, ListingError> {
        let start = self.offset;
        let negative = self.eat('-');

        if self.peek() == Some('0') && matches!(self.peek_nth(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            return self.read_hex_number(start, negative);
        }

        let mut text = String::new();
        if negative {
            text.push('-');
        }
        self.read_digits(&mut text);

        let mut floating = false;
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            floating = true;
            text.push('.');
            self.bump();
            self.read_digits(&mut text);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            floating = true;
            text.push('e');
            self.bump();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.bump();
            }
            if !self.read_digits(&mut text) {
                return Err(ListingError::lexical(start, "malformed exponent"));
            }
        }

        let kind = match self.peek() {
            Some('L' | 'l') if !floating => {
                self.bump();
                text.parse().map(TokenKind::Long).ok()
            }
            Some('F' | 'f') => {
                self.bump();
                text.parse().map(TokenKind::Float).ok()
            }
            Some('D' | 'd') => {
                self.bump();
                text.parse().map(TokenKind::Double).ok()
            }
            _ if floating => text.parse().map(TokenKind::Double).ok(),
            _ => text.parse().map(TokenKind::Int).ok(),
        };

        self.check_number_end(start)?;
        kind.ok_or_else(|| ListingError::lexical(start, format!("number out of range: {}", text)))
    }

    fn read_hex_number(&mut self, start: usize, negative: bool) -> Result<TokenKind, ListingError> {
        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_hexdigit() {
                break;
            }
            digits.push(ch);
            self.bump();
        }
        if digits.is_empty() {
            return Err(ListingError::lexical(start, "expected hexadecimal digits"));
        }

        let out_of_range = || ListingError::lexical(start, format!("number out of range: 0x{}", digits));
        let kind = if self.eat('L') || self.eat('l') {
            let value = u64::from_str_radix(&digits, 16).map_err(|_| out_of_range())? as i64;
            TokenKind::Long(if negative { value.wrapping_neg() } else { value })
        } else {
            let value = u32::from_str_radix(&digits, 16).map_err(|_| out_of_range())? as i32;
            TokenKind::Int(if negative { value.wrapping_neg() } else { value })
        };

        self.check_number_end(start)?;
        Ok(kind)
    }

    fn read_digits(&mut self, text: &mut String) -> bool {
        let mut any = false;
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            text.push(ch);
            self.bump();
            any = true;
        }
        any
    }

    fn check_number_end(&self, start: usize) -> Result<(), ListingError> {
        match self.peek() {
            Some(ch) if is_name_char(ch) => {
                Err(ListingError::lexical(start, format!("malformed number near '{}'", ch)))
            }
            _ => Ok(()),
        }
    }

    fn read_string(&mut self) -> Result<String, ListingError> {
        let start = self.offset;
        self.bump(); // consume opening quote
        let mut value = String::new();

        loop {
            let escape_offset = self.offset;
            match self.bump() {
                None | Some('\n') => {
                    return Err(ListingError::lexical(start, "unterminated string literal"));
                }
                Some('"') => return Ok(value),
                Some('\\') => value.push(self.read_escape(start, escape_offset)?),
                Some(ch) => value.push(ch),
            }
        }
    }

    fn read_escape(&mut self, start: usize, escape_offset: usize) -> Result<char, ListingError> {
        let ch = match self.bump() {
            None | Some('\n') => {
                return Err(ListingError::lexical(start, "unterminated string literal"));
            }
            Some(ch) => ch,
        };

        let unescaped = match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '0' => '\0',
            '"' => '"',
            '\'' => '\'',
            '\\' => '\\',
            'u' => {
                let mut code = 0u32;
                for _ in 0..4 {
                    let digit = self.peek().and_then(|c| c.to_digit(16)).ok_or_else(|| {
                        ListingError::lexical(escape_offset, "expected four hex digits after \\u")
                    })?;
                    self.bump();
                    code = code * 16 + digit;
                }
                char::from_u32(code).ok_or_else(|| {
                    ListingError::lexical(escape_offset, format!("invalid character code {:04x}", code))
                })?
            }
            _ => {
                return Err(ListingError::lexical(
                    escape_offset,
                    format!("unknown escape sequence \\{}", ch),
                ));
            }
        };
        Ok(unescaped)
    }

    fn read_quoted(&mut self) -> Result<String, ListingError> {
        let start = self.offset;
        self.bump(); // consume '`'
        let mut value = String::new();

        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(ListingError::lexical(start, "unterminated quoted reference"));
                }
                Some('`') => break,
                Some(ch) => value.push(ch),
            }
        }

        if value.is_empty() {
            return Err(ListingError::lexical(start, "empty quoted reference"));
        }
        Ok(value)
    }

    fn read_punctuation(&mut self, ch: char) -> Result<TokenKind, ListingError> {
        let start = self.offset;
        self.bump();

        let kind = match ch {
            ':' => {
                if self.eat('=') {
                    TokenKind::Assign
                } else {
                    TokenKind::Colon
                }
            }
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '&' => TokenKind::Ampersand,
            '|' => TokenKind::Pipe,
            '^' => TokenKind::Caret,
            '=' if self.eat('=') => {
                if self.eat('=') {
                    TokenKind::ReferenceEqual
                } else {
                    TokenKind::Equal
                }
            }
            '!' if self.eat('=') => {
                if self.eat('=') {
                    TokenKind::ReferenceNotEqual
                } else {
                    TokenKind::NotEqual
                }
            }
            '<' => {
                if self.eat('<') {
                    TokenKind::ShiftLeft
                } else if self.eat('=') {
                    TokenKind::LessOrEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.eat('>') {
                    if self.eat('>') {
                        TokenKind::ShiftRightUnsigned
                    } else {
                        TokenKind::ShiftRight
                    }
                } else if self.eat('=') {
                    TokenKind::GreaterOrEqual
                } else {
                    TokenKind::Greater
                }
            }
            _ => {
                return Err(ListingError::lexical(
                    start,
                    format!("unexpected character '{}'", ch),
                ));
            }
        };
        Ok(kind)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, ListingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = self.next_token();
        self.finished = match &result {
            Ok(token) => token.kind == TokenKind::End,
            Err(_) => true,
        };
        Some(result)
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ListingError> {
    Lexer::new(source).collect()
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}
