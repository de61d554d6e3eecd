//! C Lexer - tokenizes source code
//!
//! `#`-prefixed preprocessor lines are skipped wholesale; `//` and `/* */`
//! comments are stripped. Scanning never fails: an unrecognized character
//! becomes an `Error` token that the parser rejects with its position.

use crate::token::{LiteralValue, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.input.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    /// Skip whitespace, comments, and preprocessor directive lines.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() {
                self.advance();
            } else if ch == b'#' {
                // Directives are recognized but not expanded
                while let Some(c) = self.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch == b'/' && self.peek_next() == Some(b'/') {
                while let Some(c) = self.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch == b'/' && self.peek_next() == Some(b'*') {
                self.advance(); // /
                self.advance(); // *
                while let Some(c) = self.peek() {
                    if c == b'*' && self.peek_next() == Some(b'/') {
                        self.advance(); // *
                        self.advance(); // /
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let (start_line, start_col) = (self.line, self.col);
        let start = self.pos;
        let mut is_float = false;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        if self.peek() == Some(b'.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance(); // .
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        let lexeme = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();

        // Type suffixes: the lexeme keeps only the digits
        let mut is_unsigned = false;
        if matches!(self.peek(), Some(b'u') | Some(b'U')) {
            is_unsigned = true;
            self.advance();
        }
        if matches!(self.peek(), Some(b'L') | Some(b'l')) {
            self.advance();
        }
        if matches!(self.peek(), Some(b'f') | Some(b'F')) {
            is_float = true;
            self.advance();
        }

        if is_float {
            let value = lexeme.parse::<f64>().unwrap_or(0.0);
            Token::new(TokenKind::FloatLit, lexeme, start_line, start_col)
                .with_value(LiteralValue::Float(value))
        } else if is_unsigned {
            let value = lexeme.parse::<u64>().unwrap_or(0);
            Token::new(TokenKind::Num, lexeme, start_line, start_col)
                .with_value(LiteralValue::UInt(value))
        } else {
            let value = lexeme.parse::<i64>().unwrap_or(0);
            Token::new(TokenKind::Num, lexeme, start_line, start_col)
                .with_value(LiteralValue::Int(value))
        }
    }

    fn read_ident(&mut self) -> Token {
        let (start_line, start_col) = (self.line, self.col);
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        let name = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        let kind = TokenKind::keyword(&name).unwrap_or(TokenKind::Ident);
        Token::new(kind, name, start_line, start_col)
    }

    fn read_string(&mut self) -> Token {
        let (start_line, start_col) = (self.line, self.col);
        self.advance(); // opening "
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == b'"' {
                break;
            }
            if ch == b'\\' {
                self.advance();
                let decoded = match self.peek() {
                    Some(b'n') => b'\n',
                    Some(b't') => b'\t',
                    Some(b'r') => b'\r',
                    Some(b'\\') => b'\\',
                    Some(b'"') => b'"',
                    Some(c) => c,
                    None => break,
                };
                self.advance();
                text.push(decoded as char);
            } else {
                self.advance();
                text.push(ch as char);
            }
        }
        if self.peek() == Some(b'"') {
            self.advance(); // closing "
        }
        Token::new(TokenKind::StringLit, text, start_line, start_col)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let (line, col) = (self.line, self.col);
        let ch = match self.peek() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, "", line, col),
        };

        if ch.is_ascii_digit() {
            return self.read_number();
        }
        if ch.is_ascii_alphabetic() || ch == b'_' {
            return self.read_ident();
        }
        if ch == b'"' {
            return self.read_string();
        }

        self.advance();
        match ch {
            b'+' => {
                if self.peek() == Some(b'+') {
                    self.advance();
                    Token::new(TokenKind::PlusPlus, "++", line, col)
                } else if self.peek() == Some(b'=') {
                    self.advance();
                    Token::new(TokenKind::PlusEq, "+=", line, col)
                } else {
                    Token::new(TokenKind::Plus, "+", line, col)
                }
            }
            b'-' => {
                if self.peek() == Some(b'-') {
                    self.advance();
                    Token::new(TokenKind::MinusMinus, "--", line, col)
                } else if self.peek() == Some(b'=') {
                    self.advance();
                    Token::new(TokenKind::MinusEq, "-=", line, col)
                } else if self.peek() == Some(b'>') {
                    self.advance();
                    Token::new(TokenKind::Arrow, "->", line, col)
                } else {
                    Token::new(TokenKind::Minus, "-", line, col)
                }
            }
            b'*' => Token::new(TokenKind::Star, "*", line, col),
            b'/' => Token::new(TokenKind::Slash, "/", line, col),
            b'%' => Token::new(TokenKind::Percent, "%", line, col),
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::new(TokenKind::EqEq, "==", line, col)
                } else {
                    Token::new(TokenKind::Eq, "=", line, col)
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::new(TokenKind::BangEq, "!=", line, col)
                } else {
                    Token::new(TokenKind::Bang, "!", line, col)
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::new(TokenKind::LtEq, "<=", line, col)
                } else {
                    Token::new(TokenKind::Lt, "<", line, col)
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::new(TokenKind::GtEq, ">=", line, col)
                } else {
                    Token::new(TokenKind::Gt, ">", line, col)
                }
            }
            b'&' => {
                if self.peek() == Some(b'&') {
                    self.advance();
                    Token::new(TokenKind::AmpAmp, "&&", line, col)
                } else {
                    Token::new(TokenKind::Error, "&", line, col)
                }
            }
            b'|' => {
                if self.peek() == Some(b'|') {
                    self.advance();
                    Token::new(TokenKind::PipePipe, "||", line, col)
                } else {
                    Token::new(TokenKind::Error, "|", line, col)
                }
            }
            b'?' => Token::new(TokenKind::Question, "?", line, col),
            b'(' => Token::new(TokenKind::LParen, "(", line, col),
            b')' => Token::new(TokenKind::RParen, ")", line, col),
            b'{' => Token::new(TokenKind::LBrace, "{", line, col),
            b'}' => Token::new(TokenKind::RBrace, "}", line, col),
            b'[' => Token::new(TokenKind::LBracket, "[", line, col),
            b']' => Token::new(TokenKind::RBracket, "]", line, col),
            b';' => Token::new(TokenKind::Semicolon, ";", line, col),
            b',' => Token::new(TokenKind::Comma, ",", line, col),
            b':' => Token::new(TokenKind::Colon, ":", line, col),
            b'.' => Token::new(TokenKind::Dot, ".", line, col),
            _ => Token::new(TokenKind::Error, (ch as char).to_string(), line, col),
        }
    }

    /// Tokenize the entire input; the stream always ends with one `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_declaration() {
        let tokens = Lexer::new("int x = 42;").tokenize();
        let expected = [
            (TokenKind::Int, "int"),
            (TokenKind::Ident, "x"),
            (TokenKind::Eq, "="),
            (TokenKind::Num, "42"),
            (TokenKind::Semicolon, ";"),
            (TokenKind::Eof, ""),
        ];
        assert_eq!(tokens.len(), expected.len());
        for (tok, (kind, lexeme)) in tokens.iter().zip(expected) {
            assert_eq!(tok.kind, kind);
            assert_eq!(tok.lexeme, lexeme);
        }
        assert_eq!(tokens[3].value, Some(LiteralValue::Int(42)));
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("== != <= >= && || -> ++ -- += -="),
            vec![
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Arrow,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_directives_skipped() {
        let source = "#include <stdio.h>\n// line\nint /* block */ x;";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Int,
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numeric_suffixes() {
        let tokens = Lexer::new("10u 20L 1.5f 3.14").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Num);
        assert_eq!(tokens[0].value, Some(LiteralValue::UInt(10)));
        assert_eq!(tokens[1].kind, TokenKind::Num);
        assert_eq!(tokens[1].lexeme, "20");
        assert_eq!(tokens[2].kind, TokenKind::FloatLit);
        assert_eq!(tokens[2].lexeme, "1.5");
        assert_eq!(tokens[3].kind, TokenKind::FloatLit);
        assert_eq!(tokens[3].value, Some(LiteralValue::Float(3.14)));
    }

    #[test]
    fn test_string_escapes_decoded() {
        let tokens = Lexer::new(r#""a\tb\n""#).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::StringLit);
        assert_eq!(tokens[0].lexeme, "a\tb\n");
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("int\n  x").tokenize();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn test_unknown_character_becomes_error_token() {
        let tokens = Lexer::new("int x @").tokenize();
        assert_eq!(tokens[2].kind, TokenKind::Error);
        assert_eq!(tokens[2].lexeme, "@");
    }
}
