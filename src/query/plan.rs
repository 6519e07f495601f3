//! The executable form of a query.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, SatchelError};
use crate::schema::{Field, FieldKind};

/// Comparison of a priority filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// Whether `value` satisfies `value <op> bound`.
    pub fn matches(self, value: u8, bound: u8) -> bool {
        match self {
            CompareOp::Eq => value == bound,
            CompareOp::Gt => value > bound,
            CompareOp::Ge => value >= bound,
            CompareOp::Lt => value < bound,
            CompareOp::Le => value <= bound,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// Deepest plan [`QueryPlan::validate`] accepts. Parsed queries stay well
/// below it.
pub const MAX_PLAN_DEPTH: usize = 256;

/// A query plan. Leaves hold analyzed terms, so evaluation never analyzes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPlan {
    /// A single term in one field.
    Term { field: Field, term: String },
    /// Terms at consecutive positions in one field.
    Phrase { field: Field, terms: Vec<String> },
    /// Numeric filter on priority. Matches score zero.
    Priority { op: CompareOp, value: u8 },
    /// Every child matches; scores add up.
    And(Vec<QueryPlan>),
    /// Any child matches; scores of matching children add up.
    Or(Vec<QueryPlan>),
    /// Live documents not matched by the child.
    Not(Box<QueryPlan>),
    /// Every live document.
    All,
}

impl QueryPlan {
    pub fn term<S: Into<String>>(field: Field, term: S) -> Self {
        QueryPlan::Term {
            field,
            term: term.into(),
        }
    }

    pub fn phrase<I, S>(field: Field, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryPlan::Phrase {
            field,
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(plan: QueryPlan) -> Self {
        QueryPlan::Not(Box::new(plan))
    }

    /// `And` of the children, collapsing a single child.
    pub fn and(mut children: Vec<QueryPlan>) -> Self {
        if children.len() == 1 {
            children.remove(0)
        } else {
            QueryPlan::And(children)
        }
    }

    /// `Or` of the children, collapsing a single child.
    pub fn or(mut children: Vec<QueryPlan>) -> Self {
        if children.len() == 1 {
            children.remove(0)
        } else {
            QueryPlan::Or(children)
        }
    }

    /// Check the plan is executable.
    ///
    /// Plans built by the parser always pass; hand-built plans may not, and
    /// are also rejected when nested deeper than [`MAX_PLAN_DEPTH`].
    pub fn validate(&self) -> Result<()> {
        self.validate_at(1)
    }

    fn validate_at(&self, depth: usize) -> Result<()> {
        if depth > MAX_PLAN_DEPTH {
            return Err(invalid_plan(format!(
                "plan nested too deeply (limit {MAX_PLAN_DEPTH})"
            )));
        }

        match self {
            QueryPlan::Term { field, term } => {
                check_term_field(*field)?;
                if term.is_empty() {
                    return Err(invalid_plan(format!("empty term in field '{field}'")));
                }
                Ok(())
            }
            QueryPlan::Phrase { field, terms } => {
                check_term_field(*field)?;
                if field.treatment().kind != FieldKind::Text {
                    return Err(invalid_plan(format!(
                        "phrase on non-text field '{field}'"
                    )));
                }
                if terms.is_empty() || terms.iter().any(String::is_empty) {
                    return Err(invalid_plan(format!("empty phrase term in field '{field}'")));
                }
                Ok(())
            }
            QueryPlan::Priority { .. } | QueryPlan::All => Ok(()),
            QueryPlan::And(children) | QueryPlan::Or(children) => {
                if children.is_empty() {
                    return Err(invalid_plan("boolean clause with no children"));
                }
                children
                    .iter()
                    .try_for_each(|child| child.validate_at(depth + 1))
            }
            QueryPlan::Not(child) => child.validate_at(depth + 1),
        }
    }

    /// Dictionary keys of every term the plan reads, negated ones included.
    pub fn term_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.visit_terms(true, &mut |field, term| keys.push(field.term_key(term)));
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Positive text-field terms, in query order, for snippet anchoring.
    pub fn highlight_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        self.visit_terms(false, &mut |field, term| {
            if field.treatment().kind == FieldKind::Text && !terms.iter().any(|t| t == term) {
                terms.push(term.to_string());
            }
        });
        terms
    }

    fn visit_terms(&self, include_negated: bool, visit: &mut dyn FnMut(Field, &str)) {
        match self {
            QueryPlan::Term { field, term } => visit(*field, term),
            QueryPlan::Phrase { field, terms } => {
                terms.iter().for_each(|term| visit(*field, term));
            }
            QueryPlan::And(children) | QueryPlan::Or(children) => children
                .iter()
                .for_each(|child| child.visit_terms(include_negated, visit)),
            QueryPlan::Not(child) => {
                if include_negated {
                    child.visit_terms(include_negated, visit);
                }
            }
            QueryPlan::Priority { .. } | QueryPlan::All => {}
        }
    }
}

fn check_term_field(field: Field) -> Result<()> {
    if field.treatment().indexed {
        Ok(())
    } else {
        Err(invalid_plan(format!("field '{field}' has no terms")))
    }
}

fn invalid_plan<S: Into<String>>(message: S) -> SatchelError {
    SatchelError::parse(message, 0, "")
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPlan::Term { field, term } => write!(f, "{field}:{term}"),
            QueryPlan::Phrase { field, terms } => write!(f, "{field}:\"{}\"", terms.join(" ")),
            QueryPlan::Priority { op, value } => write!(f, "priority:{}{value}", op.symbol()),
            QueryPlan::And(children) | QueryPlan::Or(children) => {
                let joiner = if matches!(self, QueryPlan::And(_)) { " AND " } else { " OR " };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
            QueryPlan::Not(child) => write!(f, "NOT {child}"),
            QueryPlan::All => f.write_str("*"),
        }
    }
}
