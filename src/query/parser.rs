//! Query parser for converting query strings to [`QueryPlan`]s.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! query    := or_expr EOF
//! or_expr  := and_expr ( OR and_expr )*
//! and_expr := unary ( [AND] unary )*
//! unary    := ( NOT | '-' ) unary | primary
//! primary  := '(' or_expr ')' | [field ':'] ( word | '"' phrase '"' )
//! ```
//!
//! Words are analyzed with the field's analyzer at parse time. A word that
//! yields several tokens becomes a phrase.
//!
//! Groups and negations may nest at most [`MAX_QUERY_NESTING`] deep.

use crate::error::{Result, SatchelError};
use crate::query::lexer::{Lexeme, Lexer, TokenKind};
use crate::query::plan::{CompareOp, QueryPlan};

/// Deepest allowed nesting of parentheses and `NOT`/`-` in a query string.
pub const MAX_QUERY_NESTING: usize = 64;
use crate::schema::{Field, Schema};

/// Parses query strings against the fixed schema.
#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    schema: Schema,
}

impl QueryParser {
    pub fn new(schema: Schema) -> Self {
        QueryParser { schema }
    }

    /// Parse a query string into a plan.
    ///
    /// # Example
    ///
    /// ```
    /// use satchel::query::QueryParser;
    ///
    /// let parser = QueryParser::default();
    /// let plan = parser.parse("title:water NOT salt").unwrap();
    /// assert_eq!(plan.to_string(), "(title:water AND NOT (title:salt OR summary:salt OR content:salt))");
    /// ```
    pub fn parse(&self, query: &str) -> Result<QueryPlan> {
        let lexemes = Lexer::new(query).tokenize()?;
        let mut parser = QueryStringParser {
            input: query,
            lexemes,
            position: 0,
            depth: 0,
            schema: &self.schema,
        };
        parser.parse()
    }
}

/// Value of a leaf: a bare word or a quoted phrase.
enum Value<'l> {
    Word(&'l str),
    Phrase(&'l str),
}

struct QueryStringParser<'a> {
    input: &'a str,
    lexemes: Vec<Lexeme>,
    position: usize,
    depth: usize,
    schema: &'a Schema,
}

impl QueryStringParser<'_> {
    fn parse(&mut self) -> Result<QueryPlan> {
        if self.peek().kind == TokenKind::Eof {
            return Err(SatchelError::parse("empty query", 0, ""));
        }

        let plan = self.parse_or_expression()?;

        let next = self.peek();
        match next.kind {
            TokenKind::Eof => Ok(plan),
            TokenKind::RightParen => Err(self.error_at("unbalanced parenthesis", next)),
            _ => Err(self.error_at("unexpected token", next)),
        }
    }

    fn parse_or_expression(&mut self) -> Result<QueryPlan> {
        let mut children = vec![self.parse_and_expression()?];

        while self.peek().kind == TokenKind::Or {
            let operator = self.advance();
            if !self.starts_operand() {
                return Err(self.error_at("dangling operator", &operator));
            }
            children.push(self.parse_and_expression()?);
        }

        Ok(QueryPlan::or(children))
    }

    fn parse_and_expression(&mut self) -> Result<QueryPlan> {
        let mut children = vec![self.parse_unary()?];

        loop {
            if self.peek().kind == TokenKind::And {
                let operator = self.advance();
                if !self.starts_operand() {
                    return Err(self.error_at("dangling operator", &operator));
                }
            } else if !self.starts_operand() {
                break;
            }
            children.push(self.parse_unary()?);
        }

        Ok(QueryPlan::and(children))
    }

    fn parse_unary(&mut self) -> Result<QueryPlan> {
        if matches!(self.peek().kind, TokenKind::Not | TokenKind::Minus) {
            let operator = self.advance();
            if !self.starts_operand() {
                return Err(self.error_at("dangling operator", &operator));
            }
            self.descend(&operator)?;
            let child = self.parse_unary()?;
            self.depth -= 1;
            return Ok(QueryPlan::not(child));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<QueryPlan> {
        let lexeme = self.advance();

        match &lexeme.kind {
            TokenKind::LeftParen => {
                if self.peek().kind == TokenKind::RightParen {
                    return Err(self.error_at("empty group", &lexeme));
                }
                self.descend(&lexeme)?;
                let inner = self.parse_or_expression()?;
                if self.peek().kind != TokenKind::RightParen {
                    return Err(self.error_at("unbalanced parenthesis", &lexeme));
                }
                self.advance();
                self.depth -= 1;
                Ok(inner)
            }
            TokenKind::Field(name) => {
                let Some(field) = Field::from_name(name) else {
                    return Err(SatchelError::parse(
                        format!("unknown field '{name}'"),
                        lexeme.start,
                        name.as_str(),
                    ));
                };
                let value = self.advance();
                let span = Lexeme {
                    kind: TokenKind::Eof,
                    start: lexeme.start,
                    end: value.end,
                };
                match &value.kind {
                    TokenKind::Word(word) => self.leaf(Some(field), Value::Word(word), &span),
                    TokenKind::Phrase(text) => self.leaf(Some(field), Value::Phrase(text), &span),
                    _ => Err(self.error_at(format!("expected a value after '{name}:'"), &lexeme)),
                }
            }
            TokenKind::Word(word) => self.leaf(None, Value::Word(word), &lexeme),
            TokenKind::Phrase(text) => self.leaf(None, Value::Phrase(text), &lexeme),
            TokenKind::RightParen => Err(self.error_at("unbalanced parenthesis", &lexeme)),
            TokenKind::Eof => Err(self.error_at("unexpected end of query", &lexeme)),
            TokenKind::And | TokenKind::Or | TokenKind::Not | TokenKind::Minus => {
                Err(self.error_at("dangling operator", &lexeme))
            }
        }
    }

    /// Build the plan for one field-scoped or default-field value.
    fn leaf(&self, field: Option<Field>, value: Value<'_>, lexeme: &Lexeme) -> Result<QueryPlan> {
        if field == Some(Field::Priority) {
            return match value {
                Value::Word(word) => self.priority_filter(word, lexeme),
                Value::Phrase(_) => Err(self.error_at("priority takes a number", lexeme)),
            };
        }

        let text = match value {
            Value::Word(word) | Value::Phrase(word) => word,
        };
        let fields: Vec<Field> = match field {
            Some(field) => vec![field],
            None => Field::DEFAULT_SEARCH.to_vec(),
        };

        let mut alternatives = Vec::with_capacity(fields.len());
        for field in fields {
            let mut terms: Vec<String> = self
                .schema
                .analyze(field, text)?
                .into_iter()
                .map(|token| token.text)
                .collect();

            let plan = match terms.len() {
                0 => return Err(self.error_at("term has no searchable text", lexeme)),
                1 => QueryPlan::term(field, terms.remove(0)),
                _ => QueryPlan::phrase(field, terms),
            };
            alternatives.push(plan);
        }

        Ok(QueryPlan::or(alternatives))
    }

    fn priority_filter(&self, word: &str, lexeme: &Lexeme) -> Result<QueryPlan> {
        let (op, number) = [
            (">=", CompareOp::Ge),
            ("<=", CompareOp::Le),
            (">", CompareOp::Gt),
            ("<", CompareOp::Lt),
        ]
        .into_iter()
        .find_map(|(prefix, op)| word.strip_prefix(prefix).map(|rest| (op, rest)))
        .unwrap_or((CompareOp::Eq, word));

        let value = number
            .parse::<u8>()
            .map_err(|_| self.error_at("priority must be a number in 0..=255", lexeme))?;

        Ok(QueryPlan::Priority { op, value })
    }

    /// Enter a group or negation opened by `lexeme`.
    fn descend(&mut self, lexeme: &Lexeme) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_QUERY_NESTING {
            return Err(self.error_at(
                format!("query nested too deeply (limit {MAX_QUERY_NESTING})"),
                lexeme,
            ));
        }
        Ok(())
    }

    /// Whether the next token can begin a unary expression.
    fn starts_operand(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Word(_)
                | TokenKind::Phrase(_)
                | TokenKind::Field(_)
                | TokenKind::LeftParen
                | TokenKind::Not
                | TokenKind::Minus
        )
    }

    fn peek(&self) -> &Lexeme {
        // The lexer always ends the stream with Eof, which is never consumed.
        &self.lexemes[self.position.min(self.lexemes.len() - 1)]
    }

    fn advance(&mut self) -> Lexeme {
        let lexeme = self.peek().clone();
        if lexeme.kind != TokenKind::Eof {
            self.position += 1;
        }
        lexeme
    }

    fn error_at<S: Into<String>>(&self, message: S, lexeme: &Lexeme) -> SatchelError {
        let end = if lexeme.end > lexeme.start {
            lexeme.end
        } else {
            self.input.len()
        };
        SatchelError::parse(message, lexeme.start, &self.input[lexeme.start..end])
    }
}
