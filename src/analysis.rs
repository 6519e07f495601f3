//! Text analysis: turning field values and query words into index terms.
//!
//! A [`tokenizer::Tokenizer`] splits text into [`token::Token`]s, a chain of
//! [`token_filter::Filter`]s normalizes them, and an [`analyzer::Analyzer`]
//! bundles the two. Satchel uses two analyzers:
//!
//! - [`analyzer::standard::StandardAnalyzer`] for title, summary and content:
//!   Unicode word boundaries (UAX #29) plus lowercase folding.
//! - [`analyzer::keyword::KeywordAnalyzer`] for id and category: the whole
//!   trimmed value is one term, matched exactly.
//!
//! The same analyzer runs at index time and at query time, so a query word
//! produces exactly the terms a document containing it would.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
