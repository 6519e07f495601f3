//! # Satchel
//!
//! An embedded, offline-first full-text index for on-device search.
//!
//! ## Features
//!
//! - Fixed document schema with keyword, text and numeric fields
//! - Immutable segments published by an atomic manifest swap
//! - Point-in-time searchers that never see a partial commit
//! - Boolean, phrase and field-scoped queries ranked with BM25
//! - Multi-module search over several indexes
//! - A handle-based capability surface for platform bindings
//!
//! ## Example
//!
//! ```no_run
//! use satchel::prelude::*;
//!
//! # fn main() -> satchel::error::Result<()> {
//! let index = Index::open_or_create("/tmp/satchel-guides")?;
//! index.add(Document::builder("1").title("Water").content("water purification tablets").build())?;
//! index.commit()?;
//!
//! for hit in index.searcher().search("water", 10, 0)?.hits {
//!     println!("{} {:.3}", hit.id, hit.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod api;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod query;
pub mod schema;
pub mod search;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::config::{DuplicatePolicy, IndexConfig, ScoringConfig};
    pub use crate::document::{Document, RawDocument};
    pub use crate::error::{ErrorKind, Result, SatchelError};
    pub use crate::index::{CommitStats, Index, IndexStats, MergeStats};
    pub use crate::query::{QueryParser, QueryPlan};
    pub use crate::schema::Field;
    pub use crate::search::{IndexCatalog, SearchResult, SearchResults, Searcher};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
