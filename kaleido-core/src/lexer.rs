//! Tokenizer for Kaleido.
//!
//! The lexer pulls characters from any `char` iterator on demand and
//! never rewinds. Its only state besides the underlying cursor is the
//! single character that terminated the previous token.

use std::iter::Fuse;

use crate::error::LexError;

/// A single lexical unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    EndOfInput,

    // Keywords
    Def,
    Extern,

    // Primary
    Identifier(String),
    Number(f64),

    /// Any other character: operators and punctuation such as `( ) , ;`.
    Symbol(char),
}

impl Token {
    pub fn is_symbol(&self, ch: char) -> bool {
        matches!(self, Token::Symbol(c) if *c == ch)
    }
}

pub struct Lexer<I: Iterator<Item = char>> {
    chars: Fuse<I>,
    /// Pushback: the character read but not yet consumed. `None` once the
    /// input is exhausted.
    last_char: Option<char>,
    strict_numbers: bool,
}

impl<I: Iterator<Item = char>> Lexer<I> {
    pub fn new(chars: I) -> Self {
        Lexer {
            chars: chars.fuse(),
            // Primed with whitespace so the first call reads real input.
            last_char: Some(' '),
            strict_numbers: false,
        }
    }

    /// Reject numeric literals that are not entirely valid instead of
    /// converting their longest valid prefix.
    pub fn with_strict_numbers(mut self, strict: bool) -> Self {
        self.strict_numbers = strict;
        self
    }

    fn advance(&mut self) {
        self.last_char = self.chars.next();
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            while self.last_char.is_some_and(char::is_whitespace) {
                self.advance();
            }

            let Some(ch) = self.last_char else {
                return Ok(Token::EndOfInput);
            };

            if ch.is_ascii_alphabetic() {
                let mut ident = String::from(ch);
                self.advance();
                while let Some(c) = self.last_char.filter(char::is_ascii_alphanumeric) {
                    ident.push(c);
                    self.advance();
                }
                return Ok(match ident.as_str() {
                    "def" => Token::Def,
                    "extern" => Token::Extern,
                    _ => Token::Identifier(ident),
                });
            }

            if ch.is_ascii_digit() || ch == '.' {
                let mut text = String::new();
                while let Some(c) = self.last_char.filter(|c| c.is_ascii_digit() || *c == '.') {
                    text.push(c);
                    self.advance();
                }
                return self.number(text);
            }

            if ch == '#' {
                while self.last_char.is_some_and(|c| c != '\n' && c != '\r') {
                    self.advance();
                }
                continue;
            }

            self.advance();
            return Ok(Token::Symbol(ch));
        }
    }

    fn number(&self, text: String) -> Result<Token, LexError> {
        let prefix = longest_numeric_prefix(&text);
        if self.strict_numbers && prefix.len() != text.len() {
            return Err(LexError::MalformedNumber { text });
        }
        Ok(Token::Number(prefix.parse().unwrap_or(0.0)))
    }
}

/// The part of a digits-and-dots run that forms a valid decimal literal:
/// everything before a second `.`, or nothing if that contains no digit.
fn longest_numeric_prefix(text: &str) -> &str {
    let end = text
        .char_indices()
        .filter(|&(_, c)| c == '.')
        .nth(1)
        .map_or(text.len(), |(idx, _)| idx);
    let prefix = &text[..end];
    if prefix.bytes().any(|b| b.is_ascii_digit()) {
        prefix
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source.chars());
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().expect("lex");
            if token == Token::EndOfInput {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn lexes_keywords_identifiers_and_symbols() {
        assert_eq!(
            tokens("def foo(x y) x*y; extern sin(a)"),
            vec![
                Token::Def,
                Token::Identifier("foo".into()),
                Token::Symbol('('),
                Token::Identifier("x".into()),
                Token::Identifier("y".into()),
                Token::Symbol(')'),
                Token::Identifier("x".into()),
                Token::Symbol('*'),
                Token::Identifier("y".into()),
                Token::Symbol(';'),
                Token::Extern,
                Token::Identifier("sin".into()),
                Token::Symbol('('),
                Token::Identifier("a".into()),
                Token::Symbol(')'),
            ]
        );
    }

    #[test]
    fn keywords_are_whole_words_only() {
        assert_eq!(
            tokens("define externs x1"),
            vec![
                Token::Identifier("define".into()),
                Token::Identifier("externs".into()),
                Token::Identifier("x1".into()),
            ]
        );
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(
            tokens("42 3.25 .5 7."),
            vec![
                Token::Number(42.0),
                Token::Number(3.25),
                Token::Number(0.5),
                Token::Number(7.0),
            ]
        );
    }

    #[test]
    fn numeric_values_survive_lexing() {
        for value in [0.0, 1.0, 0.1, 123.456, 1e-3, 98765.4321] {
            let text = format!("{value}");
            assert_eq!(tokens(&text), vec![Token::Number(value)], "{text}");
        }
    }

    #[test]
    fn malformed_numbers_use_longest_valid_prefix() {
        assert_eq!(tokens("1.2.3"), vec![Token::Number(1.2)]);
        assert_eq!(tokens("."), vec![Token::Number(0.0)]);
        assert_eq!(tokens(".."), vec![Token::Number(0.0)]);
    }

    #[test]
    fn strict_numbers_reject_malformed_literals() {
        let mut lexer = Lexer::new("1.2.3".chars()).with_strict_numbers(true);
        assert_eq!(
            lexer.next_token(),
            Err(LexError::MalformedNumber {
                text: "1.2.3".into()
            })
        );

        let mut lexer = Lexer::new("2.5".chars()).with_strict_numbers(true);
        assert_eq!(lexer.next_token(), Ok(Token::Number(2.5)));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(tokens("1 + 2 # comment\n+ 3"), tokens("1 + 2 \n + 3"));
        assert_eq!(tokens("# only a comment"), vec![]);
        assert_eq!(tokens("x # trailing\r y"), tokens("x y"));
    }

    #[test]
    fn end_of_input_is_idempotent() {
        let mut lexer = Lexer::new("x".chars());
        assert_eq!(lexer.next_token(), Ok(Token::Identifier("x".into())));
        for _ in 0..4 {
            assert_eq!(lexer.next_token(), Ok(Token::EndOfInput));
        }
    }

    #[test]
    fn stops_pulling_characters_after_end_of_input() {
        struct OneShot(Option<char>, bool);

        impl Iterator for OneShot {
            type Item = char;

            fn next(&mut self) -> Option<char> {
                assert!(!self.1, "polled after end of input");
                let next = self.0.take();
                self.1 = next.is_none();
                next
            }
        }

        let mut lexer = Lexer::new(OneShot(Some('a'), false));
        assert_eq!(lexer.next_token(), Ok(Token::Identifier("a".into())));
        assert_eq!(lexer.next_token(), Ok(Token::EndOfInput));
        assert_eq!(lexer.next_token(), Ok(Token::EndOfInput));
    }
}
