//! The fixed document schema and per-field indexing treatment.
//!
//! | Field      | Kind    | Indexed | Stored | Default search |
//! |------------|---------|---------|--------|----------------|
//! | `id`       | keyword | yes     | yes    | no             |
//! | `title`    | text    | yes     | yes    | yes            |
//! | `category` | keyword | yes     | yes    | no             |
//! | `priority` | numeric | filter  | yes    | no             |
//! | `summary`  | text    | yes     | yes    | yes            |
//! | `content`  | text    | yes     | yes    | yes            |
//!
//! Terms are namespaced by field in the dictionary as `field:term`, so the
//! same word in a title and in the content are distinct terms.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::Analyzer;
use crate::analysis::analyzer::keyword::KeywordAnalyzer;
use crate::analysis::analyzer::standard::StandardAnalyzer;
use crate::analysis::token::Token;
use crate::error::Result;

/// A field of the fixed schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Id,
    Title,
    Category,
    Priority,
    Summary,
    Content,
}

/// How a field's value becomes terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Whole trimmed value is one exact-match term.
    Keyword,
    /// Unicode word tokenization plus lowercase folding.
    Text,
    /// Not tokenized; filterable and usable as a boost.
    Numeric,
}

/// Indexing treatment of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTreatment {
    pub kind: FieldKind,
    /// Whether the field contributes terms to the inverted index.
    pub indexed: bool,
    /// Whether the original value is kept in the stored-fields file.
    pub stored: bool,
}

impl Field {
    /// Every field, in schema order.
    pub const ALL: [Field; 6] = [
        Field::Id,
        Field::Title,
        Field::Category,
        Field::Priority,
        Field::Summary,
        Field::Content,
    ];

    /// Fields with postings, in length-slot order.
    pub const INDEXED: [Field; 5] = [
        Field::Id,
        Field::Title,
        Field::Category,
        Field::Summary,
        Field::Content,
    ];

    /// Fields searched by an unfielded query term.
    pub const DEFAULT_SEARCH: [Field; 3] = [Field::Title, Field::Summary, Field::Content];

    /// The field's name as used in queries and JSON.
    pub fn name(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Title => "title",
            Field::Category => "category",
            Field::Priority => "priority",
            Field::Summary => "summary",
            Field::Content => "content",
        }
    }

    /// Look a field up by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|field| field.name().eq_ignore_ascii_case(name))
    }

    /// How this field is indexed and stored.
    pub fn treatment(self) -> FieldTreatment {
        let kind = match self {
            Field::Id | Field::Category => FieldKind::Keyword,
            Field::Title | Field::Summary | Field::Content => FieldKind::Text,
            Field::Priority => FieldKind::Numeric,
        };

        FieldTreatment {
            kind,
            indexed: kind != FieldKind::Numeric,
            stored: true,
        }
    }

    /// Position of this field in per-document length arrays.
    pub fn slot(self) -> Option<usize> {
        Field::INDEXED.iter().position(|&f| f == self)
    }

    /// Dictionary key of `term` in this field.
    pub fn term_key(self, term: &str) -> String {
        format!("{}:{term}", self.name())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Analyzers for the fixed schema, shared by indexing and query parsing.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    text: StandardAnalyzer,
    keyword: KeywordAnalyzer,
}

impl Schema {
    /// Create the schema with its default analyzers.
    pub fn new() -> Self {
        Self::default()
    }

    /// The analyzer for a field. Numeric fields have none.
    pub fn analyzer(&self, field: Field) -> Option<&dyn Analyzer> {
        match field.treatment().kind {
            FieldKind::Text => Some(&self.text),
            FieldKind::Keyword => Some(&self.keyword),
            FieldKind::Numeric => None,
        }
    }

    /// Analyze `text` as a value of `field`.
    pub fn analyze(&self, field: Field, text: &str) -> Result<Vec<Token>> {
        match self.analyzer(field) {
            Some(analyzer) => analyzer.analyze_to_vec(text),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
        assert_eq!(Field::from_name("TITLE"), Some(Field::Title));
        assert_eq!(Field::from_name("author"), None);
    }

    #[test]
    fn test_treatment() {
        assert_eq!(Field::Id.treatment().kind, FieldKind::Keyword);
        assert_eq!(Field::Content.treatment().kind, FieldKind::Text);
        assert!(!Field::Priority.treatment().indexed);
        assert!(Field::ALL.iter().all(|f| f.treatment().stored));
        assert_eq!(Field::Priority.slot(), None);
        assert_eq!(Field::Content.slot(), Some(4));
    }

    #[test]
    fn test_schema_analyzers() {
        let schema = Schema::new();

        let title = schema.analyze(Field::Title, "Water Filter").unwrap();
        assert_eq!(title.len(), 2);
        assert_eq!(title[0].text, "water");

        let category = schema.analyze(Field::Category, "First Aid").unwrap();
        assert_eq!(category.len(), 1);
        assert_eq!(category[0].text, "First Aid");

        assert!(schema.analyze(Field::Priority, "2").unwrap().is_empty());
        assert_eq!(Field::Title.term_key("water"), "title:water");
    }
}
