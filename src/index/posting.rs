//! Postings: which documents contain a term, how often, and where.
//!
//! A posting list is encoded as
//!
//! ```text
//! count | (ordinal delta, frequency, position deltas...)*
//! ```
//!
//! with every integer a varint. Ordinals are strictly increasing within a
//! list and positions strictly increasing within a posting, so the deltas
//! are small and mostly fit in one byte.

use std::io::Write;

use ahash::AHashMap;

use crate::error::{Result, SatchelError};
use crate::storage::structured::StructWriter;
use crate::util::varint::decode_u64;

/// A single posting in a posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Document ordinal within the segment.
    pub ordinal: u32,
    /// Token positions of the term in the field, ascending.
    pub positions: Vec<u32>,
}

impl Posting {
    /// Create a posting with positions.
    pub fn new(ordinal: u32, positions: Vec<u32>) -> Self {
        Posting { ordinal, positions }
    }

    /// Term frequency in the document's field.
    pub fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// A posting list for a single term, sorted by ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    pub postings: Vec<Posting>,
}

impl PostingList {
    /// Create an empty posting list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a posting. Ordinals must arrive in increasing order.
    pub fn push(&mut self, posting: Posting) {
        debug_assert!(
            self.postings
                .last()
                .is_none_or(|last| last.ordinal < posting.ordinal)
        );
        self.postings.push(posting);
    }

    /// Number of documents in the list.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.postings.iter()
    }

    /// Encode the posting list.
    pub fn encode<W: Write>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_varint(self.postings.len() as u64)?;

        let mut prev_ordinal = 0u32;
        for (i, posting) in self.postings.iter().enumerate() {
            // The first ordinal is written as-is so that ordinal 0 is representable.
            let delta = if i == 0 {
                posting.ordinal
            } else {
                posting.ordinal - prev_ordinal
            };
            writer.write_varint(delta as u64)?;
            prev_ordinal = posting.ordinal;

            writer.write_varint(posting.positions.len() as u64)?;
            let mut prev_pos = 0u32;
            for &pos in &posting.positions {
                writer.write_varint((pos - prev_pos) as u64)?;
                prev_pos = pos;
            }
        }

        Ok(())
    }

    /// Decode a posting list from the front of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = SliceCursor { bytes, offset: 0 };
        let count = cursor.next_u32()? as usize;

        // Every posting takes at least two bytes, which bounds the count.
        if count > bytes.len() / 2 + 1 {
            return Err(SatchelError::corrupt(format!(
                "posting count {count} exceeds list size"
            )));
        }

        let mut postings = Vec::with_capacity(count);
        let mut ordinal = 0u32;

        for i in 0..count {
            let delta = cursor.next_u32()?;
            ordinal = if i == 0 {
                delta
            } else {
                ordinal
                    .checked_add(delta)
                    .filter(|_| delta > 0)
                    .ok_or_else(|| SatchelError::corrupt("posting ordinals not increasing"))?
            };

            let frequency = cursor.next_u32()? as usize;
            let mut positions = Vec::with_capacity(frequency.min(bytes.len()));
            let mut pos = 0u32;
            for _ in 0..frequency {
                pos = pos
                    .checked_add(cursor.next_u32()?)
                    .ok_or_else(|| SatchelError::corrupt("position overflow"))?;
                positions.push(pos);
            }

            postings.push(Posting { ordinal, positions });
        }

        Ok(PostingList { postings })
    }
}

struct SliceCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl SliceCursor<'_> {
    fn next_u32(&mut self) -> Result<u32> {
        let rest = self
            .bytes
            .get(self.offset..)
            .ok_or_else(|| SatchelError::corrupt("posting list truncated"))?;
        let (value, read) = decode_u64(rest)?;
        self.offset += read;
        u32::try_from(value).map_err(|_| SatchelError::corrupt("posting value out of range"))
    }
}

/// An in-memory map from term key to posting list, used while building a
/// segment.
#[derive(Debug, Default)]
pub struct TermPostingIndex {
    terms: AHashMap<String, PostingList>,
}

impl TermPostingIndex {
    /// Create a new empty term posting index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a posting for `term`. Postings for a term must be added in
    /// increasing ordinal order.
    pub fn add_posting(&mut self, term: &str, posting: Posting) {
        match self.terms.get_mut(term) {
            Some(list) => list.push(posting),
            None => {
                let mut list = PostingList::new();
                list.push(posting);
                self.terms.insert(term.to_string(), list);
            }
        }
    }

    /// Get a posting list for a term.
    pub fn get(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    /// Get the number of unique terms.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Consume the index, returning its lists sorted by term.
    pub fn into_sorted(self) -> Vec<(String, PostingList)> {
        let mut terms: Vec<_> = self.terms.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn encode(list: &PostingList) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut writer = StructWriter::new(&mut bytes);
        list.encode(&mut writer).unwrap();
        bytes
    }

    #[test]
    fn test_posting_list_encoding() {
        let mut list = PostingList::new();
        list.push(Posting::new(0, vec![0, 5]));
        list.push(Posting::new(3, vec![2]));
        list.push(Posting::new(1000, vec![1, 2, 300]));

        let bytes = encode(&list);
        let decoded = PostingList::decode(&bytes).unwrap();

        assert_eq!(decoded, list);
        assert_eq!(decoded.postings[2].frequency(), 3);
    }

    #[test]
    fn test_corrupt_posting_list() {
        // Claims two postings with the same ordinal.
        let bytes = [2u8, 4, 1, 0, 0, 1, 0];
        let err = PostingList::decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptIndex);

        let truncated = [3u8, 1];
        assert!(PostingList::decode(&truncated).is_err());
    }

    #[test]
    fn test_term_posting_index() {
        let mut index = TermPostingIndex::new();
        index.add_posting("content:water", Posting::new(0, vec![1]));
        index.add_posting("content:pump", Posting::new(1, vec![2]));
        index.add_posting("content:water", Posting::new(1, vec![0]));

        assert_eq!(index.term_count(), 2);
        assert_eq!(index.get("content:water").unwrap().len(), 2);

        let sorted = index.into_sorted();
        assert_eq!(sorted[0].0, "content:pump");
        assert_eq!(sorted[1].0, "content:water");
    }
}
