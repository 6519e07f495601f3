//! Standard analyzer for free-text fields.
//!
//! # Pipeline
//!
//! 1. UnicodeWordTokenizer (UAX #29 word boundaries)
//! 2. LowercaseFilter
//!
//! No stop words are removed: short emergency queries ("how to stop bleeding")
//! depend on every word.
//!
//! # Examples
//!
//! ```
//! use satchel::analysis::analyzer::Analyzer;
//! use satchel::analysis::analyzer::standard::StandardAnalyzer;
//!
//! let analyzer = StandardAnalyzer::new();
//! let tokens: Vec<_> = analyzer.analyze("Purify WATER, then boil").unwrap().collect();
//!
//! assert_eq!(tokens.len(), 4);
//! assert_eq!(tokens[0].text, "purify");
//! assert_eq!(tokens[1].text, "water");
//! ```

use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::lowercase::LowercaseFilter;
use crate::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
use crate::error::Result;

/// Unicode word tokenization with lowercase folding.
#[derive(Debug, Clone)]
pub struct StandardAnalyzer {
    inner: PipelineAnalyzer,
}

impl StandardAnalyzer {
    /// Create a new standard analyzer.
    pub fn new() -> Self {
        let analyzer = PipelineAnalyzer::new(Arc::new(UnicodeWordTokenizer::new()))
            .add_filter(Arc::new(LowercaseFilter::new()))
            .with_name("standard");

        StandardAnalyzer { inner: analyzer }
    }
}

impl Default for StandardAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;

    #[test]
    fn test_standard_analyzer() {
        let analyzer = StandardAnalyzer::new();

        let tokens: Vec<Token> = analyzer
            .analyze("How to STOP the Bleeding")
            .unwrap()
            .collect();

        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["how", "to", "stop", "the", "bleeding"]);
        assert_eq!(tokens[4].position, 4);
    }

    #[test]
    fn test_multi_token_word() {
        let analyzer = StandardAnalyzer::new();
        let tokens = analyzer.analyze_to_vec("Wi-Fi").unwrap();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "wi");
        assert_eq!(tokens[1].text, "fi");
    }

    #[test]
    fn test_punctuation_only_yields_nothing() {
        let analyzer = StandardAnalyzer::new();
        assert!(analyzer.analyze_to_vec("--- !!").unwrap().is_empty());
    }
}
