//! Tokenizers split text into tokens.
//!
//! - [`unicode_word::UnicodeWordTokenizer`] - Unicode word boundaries (UAX #29)
//! - [`whole::WholeTokenizer`] - the whole trimmed input as one token

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for tokenizers that convert text into tokens.
///
/// # Examples
///
/// ```
/// use satchel::analysis::token::{Token, TokenStream};
/// use satchel::analysis::tokenizer::Tokenizer;
/// use satchel::error::Result;
///
/// struct CommaTokenizer;
///
/// impl Tokenizer for CommaTokenizer {
///     fn tokenize(&self, text: &str) -> Result<TokenStream> {
///         let tokens: Vec<Token> = text
///             .split(',')
///             .enumerate()
///             .map(|(i, s)| Token::new(s.trim(), i))
///             .collect();
///         Ok(Box::new(tokens.into_iter()))
///     }
///
///     fn name(&self) -> &'static str {
///         "comma"
///     }
/// }
///
/// let tokens: Vec<_> = CommaTokenizer.tokenize("a, b").unwrap().collect();
/// assert_eq!(tokens[1].text, "b");
/// ```
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into a stream of tokens.
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this tokenizer.
    fn name(&self) -> &'static str;
}

pub mod unicode_word;
pub mod whole;
