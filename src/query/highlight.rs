//! Snippet generation for hits without a stored summary.

use crate::analysis::analyzer::Analyzer;
use crate::analysis::analyzer::standard::StandardAnalyzer;

const ELLIPSIS: &str = "...";

/// A window of `content` of at most `max_chars` characters, centred on the
/// first occurrence of any of `terms` and cut on word boundaries.
///
/// `terms` are analyzed (lowercased) query terms. Without a match the
/// window starts at the beginning of the content.
pub fn snippet(content: &str, terms: &[String], max_chars: usize) -> String {
    let content = content.trim();
    let chars: Vec<(usize, char)> = content.char_indices().collect();
    if chars.len() <= max_chars {
        return content.to_string();
    }

    let anchor_byte = first_match(content, terms).unwrap_or(0);
    let anchor = chars.partition_point(|&(byte, _)| byte < anchor_byte);

    // Leave room for both ellipses.
    let budget = max_chars.saturating_sub(2 * ELLIPSIS.len()).max(1);
    let mut start = anchor.saturating_sub(budget / 2).min(chars.len() - budget);
    let mut end = start + budget;

    if start > 0 {
        // Skip the partial word at the front, unless that would pass the anchor.
        if let Some(space) = (start..anchor).find(|&i| chars[i].1.is_whitespace()) {
            start = space + 1;
        }
    }
    if end < chars.len() && !chars[end].1.is_whitespace() {
        if let Some(space) = (start + 1..end).rev().find(|&i| chars[i].1.is_whitespace()) {
            end = space;
        }
    }

    let byte_at = |i: usize| chars.get(i).map_or(content.len(), |&(byte, _)| byte);
    let body = content[byte_at(start)..byte_at(end)].trim();

    let mut snippet = String::with_capacity(body.len() + 2 * ELLIPSIS.len());
    if start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(body);
    if end < chars.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

/// Byte offset of the first token of `content` equal to one of `terms`.
fn first_match(content: &str, terms: &[String]) -> Option<usize> {
    if terms.is_empty() {
        return None;
    }
    StandardAnalyzer::new()
        .analyze(content)
        .ok()?
        .find(|token| terms.iter().any(|term| *term == token.text))
        .map(|token| token.start_offset)
}
