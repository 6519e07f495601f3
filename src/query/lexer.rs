//! Lexer for the query string syntax.
//!
//! Positions are byte offsets into the original query, so parse errors can
//! point at the offending fragment.

use crate::error::{Result, SatchelError};

/// Token types of the query syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// An unquoted word.
    Word(String),
    /// The contents of a double-quoted phrase.
    Phrase(String),
    /// A field name followed by `:`.
    Field(String),
    LeftParen,
    RightParen,
    And,
    Or,
    Not,
    /// `-` prefix, equivalent to NOT.
    Minus,
    /// End of input.
    Eof,
}

/// A token and the byte range it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Lexeme {
    fn new(kind: TokenKind, start: usize, end: usize) -> Self {
        Lexeme { kind, start, end }
    }
}

/// Lexer over a query string.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// Lex the whole input. The last lexeme is always [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Lexeme>> {
        let mut lexemes = Vec::new();
        loop {
            let lexeme = self.next_token()?;
            let done = lexeme.kind == TokenKind::Eof;
            lexemes.push(lexeme);
            if done {
                return Ok(lexemes);
            }
        }
    }

    /// Get the next token from the input.
    pub fn next_token(&mut self) -> Result<Lexeme> {
        self.skip_whitespace();

        let start = self.position;
        let Some(ch) = self.current_char() else {
            return Ok(Lexeme::new(TokenKind::Eof, start, start));
        };

        match ch {
            '(' => {
                self.advance(ch);
                Ok(Lexeme::new(TokenKind::LeftParen, start, self.position))
            }
            ')' => {
                self.advance(ch);
                Ok(Lexeme::new(TokenKind::RightParen, start, self.position))
            }
            '"' => self.read_phrase(),
            '-' => {
                self.advance(ch);
                Ok(Lexeme::new(TokenKind::Minus, start, self.position))
            }
            _ => self.read_word(),
        }
    }

    fn read_phrase(&mut self) -> Result<Lexeme> {
        let start = self.position;
        self.position += 1;

        match self.input[self.position..].find('"') {
            Some(len) => {
                let text = self.input[self.position..self.position + len].to_string();
                self.position += len + 1;
                Ok(Lexeme::new(TokenKind::Phrase(text), start, self.position))
            }
            None => Err(SatchelError::parse(
                "unterminated quoted phrase",
                start,
                &self.input[start..],
            )),
        }
    }

    fn read_word(&mut self) -> Result<Lexeme> {
        let start = self.position;

        while let Some(ch) = self.current_char() {
            if ch == ':' && self.position > start && is_field_name(&self.input[start..self.position]) {
                let name = self.input[start..self.position].to_string();
                self.advance(ch);
                return Ok(Lexeme::new(TokenKind::Field(name), start, self.position));
            }
            if !is_word_char(ch) {
                break;
            }
            self.advance(ch);
        }

        let word = &self.input[start..self.position];
        let kind = if word.eq_ignore_ascii_case("AND") {
            TokenKind::And
        } else if word.eq_ignore_ascii_case("OR") {
            TokenKind::Or
        } else if word.eq_ignore_ascii_case("NOT") {
            TokenKind::Not
        } else {
            TokenKind::Word(word.to_string())
        };

        Ok(Lexeme::new(kind, start, self.position))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance(ch);
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn advance(&mut self, ch: char) {
        self.position += ch.len_utf8();
    }
}

fn is_word_char(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, '(' | ')' | '"')
}

fn is_field_name(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && text.starts_with(|c: char| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|l| l.kind)
            .collect()
    }

    #[test]
    fn test_words_and_operators() {
        assert_eq!(
            kinds("water and (filter OR pump) not salt"),
            vec![
                TokenKind::Word("water".into()),
                TokenKind::And,
                TokenKind::LeftParen,
                TokenKind::Word("filter".into()),
                TokenKind::Or,
                TokenKind::Word("pump".into()),
                TokenKind::RightParen,
                TokenKind::Not,
                TokenKind::Word("salt".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_fields_and_phrases() {
        assert_eq!(
            kinds(r#"title:"water filter" -category:Gear priority:>=1 wi-fi"#),
            vec![
                TokenKind::Field("title".into()),
                TokenKind::Phrase("water filter".into()),
                TokenKind::Minus,
                TokenKind::Field("category".into()),
                TokenKind::Word("Gear".into()),
                TokenKind::Field("priority".into()),
                TokenKind::Word(">=1".into()),
                TokenKind::Word("wi-fi".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_byte_positions() {
        let lexemes = Lexer::new("é  \"ab\"").tokenize().unwrap();
        assert_eq!((lexemes[0].start, lexemes[0].end), (0, 2));
        assert_eq!((lexemes[1].start, lexemes[1].end), (4, 8));
        assert_eq!((lexemes[2].start, lexemes[2].end), (8, 8));
    }

    #[test]
    fn test_unterminated_phrase() {
        let err = Lexer::new("water \"filter pump").tokenize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryParse);
        assert_eq!(err.position(), Some(6));
    }
}
