//! Single-pass lexer for Twill source code.
use crate::ast::Span;
use crate::error::ParseError;
use crate::token::{Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
        let mut lexer = Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        };
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> u8 {
        let ch = self.source[self.pos];
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.advance();
                }
                Some(b'#') => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace_and_comments();

        let sp = self.span();

        let Some(ch) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: sp,
                lexeme: String::new(),
            });
        };

        if ch.is_ascii_digit() {
            return self.lex_number(sp);
        }

        if ch.is_ascii_alphabetic() || ch == b'_' {
            return Ok(self.lex_ident(sp));
        }

        if ch == b'"' {
            return self.lex_string(sp);
        }

        macro_rules! single {
            ($kind:expr, $text:expr) => {{
                self.advance();
                Ok(Token {
                    kind: $kind,
                    span: sp,
                    lexeme: $text.to_string(),
                })
            }};
        }

        match ch {
            b'+' => single!(TokenKind::Plus, "+"),
            b'-' => single!(TokenKind::Minus, "-"),
            b'*' => single!(TokenKind::Star, "*"),
            b'/' => single!(TokenKind::Slash, "/"),
            b'(' => single!(TokenKind::LParen, "("),
            b')' => single!(TokenKind::RParen, ")"),
            b'{' => single!(TokenKind::LBrace, "{"),
            b'}' => single!(TokenKind::RBrace, "}"),
            b',' => single!(TokenKind::Comma, ","),
            b';' => single!(TokenKind::Semicolon, ";"),
            b'<' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Ok(Token {
                        kind: TokenKind::Le,
                        span: sp,
                        lexeme: "<=".to_string(),
                    })
                } else {
                    Ok(Token {
                        kind: TokenKind::Lt,
                        span: sp,
                        lexeme: "<".to_string(),
                    })
                }
            }
            b'>' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Ok(Token {
                        kind: TokenKind::Ge,
                        span: sp,
                        lexeme: ">=".to_string(),
                    })
                } else {
                    Ok(Token {
                        kind: TokenKind::Gt,
                        span: sp,
                        lexeme: ">".to_string(),
                    })
                }
            }
            b'=' => {
                self.advance();
                match self.peek() {
                    Some(b'=') => {
                        self.advance();
                        Ok(Token {
                            kind: TokenKind::EqEq,
                            span: sp,
                            lexeme: "==".to_string(),
                        })
                    }
                    Some(b'>') => {
                        self.advance();
                        Ok(Token {
                            kind: TokenKind::Arrow,
                            span: sp,
                            lexeme: "=>".to_string(),
                        })
                    }
                    _ => Err(ParseError::new(
                        "unexpected `=` (did you mean `:=` or `==`?)",
                        sp.line,
                        sp.col,
                    )),
                }
            }
            b':' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Ok(Token {
                        kind: TokenKind::Assign,
                        span: sp,
                        lexeme: ":=".to_string(),
                    })
                } else {
                    Ok(Token {
                        kind: TokenKind::Colon,
                        span: sp,
                        lexeme: ":".to_string(),
                    })
                }
            }
            other => Err(ParseError::new(
                format!("unexpected character `{}`", other as char),
                sp.line,
                sp.col,
            )),
        }
    }

    fn lex_number(&mut self, sp: Span) -> Result<Token, ParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.advance();
        }

        // A `.` followed by a digit makes this a decimal literal.
        let mut kind = TokenKind::Integer;
        if self.peek() == Some(b'.') && self.peek2().map_or(false, |c| c.is_ascii_digit()) {
            kind = TokenKind::Decimal;
            self.advance();
            while let Some(ch) = self.peek() {
                if !ch.is_ascii_digit() {
                    break;
                }
                self.advance();
            }
        }

        let text = std::str::from_utf8(&self.source[start..self.pos])
            .expect("numeric lexeme is ASCII")
            .to_string();
        Ok(Token {
            kind,
            span: sp,
            lexeme: text,
        })
    }

    fn lex_ident(&mut self, sp: Span) -> Token {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !(ch.is_ascii_alphanumeric() || ch == b'_') {
                break;
            }
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos])
            .expect("identifier lexeme is ASCII")
            .to_string();

        let kind = match text.as_str() {
            "let" => TokenKind::Let,
            "print" => TokenKind::Print,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "while" => TokenKind::While,
            "fn" => TokenKind::Fn,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident,
        };

        Token {
            kind,
            span: sp,
            lexeme: text,
        }
    }

    fn lex_string(&mut self, sp: Span) -> Result<Token, ParseError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(ParseError::new("unterminated string literal", sp.line, sp.col));
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.peek() {
                        Some(b'n') => value.push('\n'),
                        Some(b't') => value.push('\t'),
                        Some(b'"') => value.push('"'),
                        Some(b'\\') => value.push('\\'),
                        Some(other) => {
                            return Err(ParseError::new(
                                format!("unknown escape `\\{}`", other as char),
                                self.line,
                                self.col,
                            ));
                        }
                        None => {
                            return Err(ParseError::new(
                                "unterminated string literal",
                                sp.line,
                                sp.col,
                            ));
                        }
                    }
                    self.advance();
                }
                Some(_) => {
                    let start = self.pos;
                    while let Some(ch) = self.peek() {
                        if ch == b'"' || ch == b'\\' || ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                    match std::str::from_utf8(&self.source[start..self.pos]) {
                        Ok(chunk) => value.push_str(chunk),
                        Err(_) => {
                            return Err(ParseError::new(
                                "invalid UTF-8 in string literal",
                                sp.line,
                                sp.col,
                            ));
                        }
                    }
                }
            }
        }
        Ok(Token {
            kind: TokenKind::StringLit,
            span: sp,
            lexeme: value,
        })
    }
}
