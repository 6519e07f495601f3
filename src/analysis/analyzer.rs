//! Analyzers combine a tokenizer with a chain of filters.

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// Trait for analyzers that turn text into index terms.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Analyze the given text into a stream of tokens.
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this analyzer.
    fn name(&self) -> &'static str;

    /// Analyze and collect the tokens.
    fn analyze_to_vec(&self, text: &str) -> Result<Vec<Token>> {
        Ok(self.analyze(text)?.collect())
    }
}

pub mod keyword;
pub mod pipeline;
pub mod standard;
