//! The term dictionary: sorted term keys with their postings locations.

use std::io::{Cursor, Write};

use crate::error::{Result, SatchelError};
use crate::storage::structured::{StructReader, StructWriter};

/// Dictionary entry for one term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermInfo {
    /// Field-qualified term key (`field:term`).
    pub term: String,
    /// Number of documents in the segment containing the term.
    pub doc_freq: u32,
    /// Byte offset of the posting list within the postings body.
    pub offset: u64,
    /// Encoded length of the posting list in bytes.
    pub length: u64,
}

/// A sorted, binary-searchable term dictionary.
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    entries: Vec<TermInfo>,
}

impl TermDictionary {
    /// Build a dictionary from entries already sorted by term.
    pub fn from_sorted(entries: Vec<TermInfo>) -> Result<Self> {
        if entries.windows(2).any(|w| w[0].term >= w[1].term) {
            return Err(SatchelError::corrupt("term dictionary is not sorted"));
        }
        Ok(TermDictionary { entries })
    }

    /// Look up a term key.
    pub fn get(&self, term: &str) -> Option<&TermInfo> {
        self.entries
            .binary_search_by(|entry| entry.term.as_str().cmp(term))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// All entries whose key starts with `prefix`, in order.
    pub fn prefixed<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a TermInfo> + 'a {
        let start = self
            .entries
            .partition_point(|entry| entry.term.as_str() < prefix);
        self.entries[start..]
            .iter()
            .take_while(move |entry| entry.term.starts_with(prefix))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TermInfo> {
        self.entries.iter()
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the dictionary body.
    pub fn write<W: Write>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_varint(self.entries.len() as u64)?;
        for entry in &self.entries {
            writer.write_string(&entry.term)?;
            writer.write_varint(entry.doc_freq as u64)?;
            writer.write_varint(entry.offset)?;
            writer.write_varint(entry.length)?;
        }
        Ok(())
    }

    /// Read a dictionary body, checking that postings stay within
    /// `postings_len` bytes.
    pub fn read(body: &[u8], postings_len: u64) -> Result<Self> {
        let mut reader = StructReader::new(Cursor::new(body));
        let count = reader.read_varint()?;

        let mut entries = Vec::new();
        for _ in 0..count {
            let entry = TermInfo {
                term: reader.read_string()?,
                doc_freq: reader.read_varint_u32()?,
                offset: reader.read_varint()?,
                length: reader.read_varint()?,
            };

            let end = entry.offset.checked_add(entry.length);
            if end.is_none_or(|end| end > postings_len) {
                return Err(SatchelError::corrupt(format!(
                    "postings for '{}' lie outside the postings file",
                    entry.term
                )));
            }

            entries.push(entry);
        }

        Self::from_sorted(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(term: &str, offset: u64) -> TermInfo {
        TermInfo {
            term: term.to_string(),
            doc_freq: 1,
            offset,
            length: 4,
        }
    }

    #[test]
    fn test_lookup_and_prefix() {
        let dict = TermDictionary::from_sorted(vec![
            info("category:water", 0),
            info("id:1", 4),
            info("id:2", 8),
            info("title:water", 12),
        ])
        .unwrap();

        assert_eq!(dict.get("id:2").unwrap().offset, 8);
        assert!(dict.get("id:3").is_none());

        let ids: Vec<&str> = dict.prefixed("id:").map(|e| e.term.as_str()).collect();
        assert_eq!(ids, vec!["id:1", "id:2"]);
        assert_eq!(dict.prefixed("summary:").count(), 0);
    }

    #[test]
    fn test_write_read() {
        let dict =
            TermDictionary::from_sorted(vec![info("content:pump", 0), info("content:water", 4)])
                .unwrap();

        let mut body = Vec::new();
        dict.write(&mut StructWriter::new(&mut body)).unwrap();

        let read = TermDictionary::read(&body, 8).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read.get("content:water"), dict.get("content:water"));

        // Postings file too short for the recorded ranges.
        assert!(TermDictionary::read(&body, 6).is_err());
    }

    #[test]
    fn test_unsorted_rejected() {
        assert!(TermDictionary::from_sorted(vec![info("b", 0), info("a", 4)]).is_err());
    }
}
