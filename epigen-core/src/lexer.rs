//! Lexer for `.epi` sources.
//!
//! Tokenization never fails: anything that can't be classified becomes an
//! `Unknown` token and is reported by the parser. Whitespace and `#`
//! comments are dropped.

use std::sync::Arc;

use crate::token::{SYMBOLS, SourceOrigin, Token, TokenKind};

/// Splits `source` into tokens tagged with `origin`.
pub fn tokenize(source: &str, origin: Option<Arc<SourceOrigin>>) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        index: 0,
        line: 1,
        column: 1,
        origin,
        tokens: Vec::new(),
    };
    lexer.run();
    lexer.resolve_keywords();
    lexer.tokens
}

struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
    origin: Option<Arc<SourceOrigin>>,
    tokens: Vec<Token>,
}

/// Start position of the token being scanned.
#[derive(Clone, Copy)]
struct Mark {
    index: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn run(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.consume_char();
                continue;
            }
            if ch == '#' {
                self.skip_line();
                continue;
            }

            let next = self.peek_next();
            let mark = self.mark();
            if self.lex_symbol(mark) {
                continue;
            }
            match ch {
                '\'' => self.lex_char(mark),
                '"' => self.lex_string(mark),
                'L' if next == Some('\'') => self.lex_char(mark),
                'L' if next == Some('"') => self.lex_string(mark),
                '0'..='9' => self.lex_number(mark),
                '+' | '-' if next.is_some_and(|c| c.is_ascii_digit()) => self.lex_number(mark),
                _ if ch.is_alphabetic() => self.lex_term(mark),
                _ => {
                    self.consume_char();
                    self.push(TokenKind::Unknown, mark);
                }
            }
        }
    }

    fn resolve_keywords(&mut self) {
        for token in &mut self.tokens {
            if token.kind != TokenKind::Identifier {
                continue;
            }
            if let Some(kind) = TokenKind::keyword(&token.text) {
                token.kind = kind;
            }
        }
    }

    fn lex_symbol(&mut self, mark: Mark) -> bool {
        let Some(&(text, kind)) = SYMBOLS.iter().find(|(text, _)| self.starts_with(text)) else {
            return false;
        };
        for _ in text.chars() {
            self.consume_char();
        }

        // `;;` collapses into a single terminator.
        let repeated = kind == TokenKind::Semicolon
            && self.tokens.last().is_some_and(|t| t.kind == TokenKind::Semicolon);
        if !repeated {
            self.push(kind, mark);
        }
        true
    }

    fn lex_number(&mut self, mark: Mark) {
        if matches!(self.peek_char(), Some('+' | '-')) {
            self.consume_char();
        }

        let mut kind = TokenKind::IntegerLiteral;
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || is_symbol_char(ch) {
                break;
            }

            let next_is_digit = self.peek_next().is_some_and(|c| c.is_ascii_digit());
            kind = match (ch, kind) {
                ('.', TokenKind::IntegerLiteral) if next_is_digit => TokenKind::DoubleFloatingLiteral,
                ('f', TokenKind::DoubleFloatingLiteral) => TokenKind::SingleFloatingLiteral,
                (_, TokenKind::SingleFloatingLiteral) => TokenKind::Unknown,
                (c, k) if c.is_ascii_digit() => k,
                _ => TokenKind::Unknown,
            };
            self.consume_char();
        }

        self.push(kind, mark);
    }

    fn lex_char(&mut self, mark: Mark) {
        let kind = self.consume_prefix(TokenKind::CharLiteral, TokenKind::WCharLiteral);
        self.consume_char(); // '

        let has_body = match self.peek_char() {
            Some('\\') => {
                self.consume_char();
                self.consume_on_line();
                true
            }
            Some('\'' | '\n') | None => false,
            Some(_) => {
                self.consume_char();
                true
            }
        };

        if has_body && self.peek_char() == Some('\'') {
            self.consume_char();
            self.push(kind, mark);
        } else {
            self.skip_past_quote_on_line('\'');
            self.push(TokenKind::Unknown, mark);
        }
    }

    fn lex_string(&mut self, mark: Mark) {
        let kind = self.consume_prefix(TokenKind::StringLiteral, TokenKind::WStringLiteral);
        self.consume_char(); // "

        loop {
            match self.peek_char() {
                // Unterminated: the token spans to the end of the line only.
                None | Some('\n') => {
                    self.push(TokenKind::Unknown, mark);
                    return;
                }
                Some('"') => {
                    self.consume_char();
                    self.push(kind, mark);
                    return;
                }
                Some('\\') => {
                    self.consume_char();
                    self.consume_on_line();
                }
                Some(_) => self.consume_char(),
            }
        }
    }

    fn lex_term(&mut self, mark: Mark) {
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.consume_char();
            } else if ch == ':'
                && self.peek_next() == Some(':')
                && self.peek_at(2).is_some_and(is_ident_continue)
            {
                self.consume_char();
                self.consume_char();
            } else {
                break;
            }
        }
        self.push(TokenKind::Identifier, mark);
    }

    fn consume_prefix(&mut self, narrow: TokenKind, wide: TokenKind) -> TokenKind {
        if self.peek_char() == Some('L') {
            self.consume_char();
            wide
        } else {
            narrow
        }
    }

    fn consume_on_line(&mut self) {
        if self.peek_char().is_some_and(|c| c != '\n') {
            self.consume_char();
        }
    }

    fn skip_past_quote_on_line(&mut self, quote: char) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.consume_char();
            if ch == quote {
                break;
            }
        }
    }

    fn skip_line(&mut self) {
        while self.peek_char().is_some_and(|c| c != '\n') {
            self.consume_char();
        }
    }

    fn push(&mut self, kind: TokenKind, mark: Mark) {
        let text: String = self.chars[mark.index..self.index].iter().collect();
        self.tokens.push(Token::new(
            kind,
            text,
            mark.line,
            mark.column,
            self.origin.clone(),
        ));
    }

    fn mark(&self) -> Mark {
        Mark {
            index: self.index,
            line: self.line,
            column: self.column,
        }
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(offset, ch)| self.peek_at(offset) == Some(ch))
    }

    fn peek_char(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_next(&self) -> Option<char> {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn consume_char(&mut self) {
        let Some(ch) = self.peek_char() else {
            return;
        };
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

fn is_symbol_char(ch: char) -> bool {
    SYMBOLS.iter().any(|(text, _)| text.starts_with(ch))
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
