//! Query parsing, evaluation and ranking.
//!
//! A query string goes through [`lexer`] and [`parser`] to become a
//! [`QueryPlan`]. Evaluation walks the plan once per segment in [`matcher`],
//! scoring leaves with BM25 from [`scorer`], and [`collector`] keeps the
//! top hits in a bounded heap.

pub mod collector;
pub mod highlight;
pub mod lexer;
pub mod matcher;
pub mod parser;
pub mod plan;
pub mod scorer;

pub use self::collector::{RankedHit, TopDocsCollector};
pub use self::parser::QueryParser;
pub use self::plan::{CompareOp, QueryPlan};
pub use self::scorer::{Bm25Scorer, TermStats};
