//! The staging buffer: documents added but not yet committed.

use ahash::AHashMap;

use crate::config::DuplicatePolicy;
use crate::document::Document;
use crate::error::{Result, SatchelError};

/// Uncommitted documents in insertion order, with an id index.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    docs: Vec<Document>,
    positions: AHashMap<String, usize>,
    memory: usize,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a document.
    ///
    /// Under [`DuplicatePolicy::Replace`] a document whose id is already
    /// staged takes the earlier one's place; under `Reject` it fails.
    /// Limits are checked before anything changes.
    pub fn stage(
        &mut self,
        doc: Document,
        policy: DuplicatePolicy,
        max_docs: usize,
        max_memory: usize,
    ) -> Result<()> {
        let size = doc.approximate_size();
        let existing = self.positions.get(&doc.id).copied();

        let (new_len, new_memory) = match existing {
            Some(_) if policy == DuplicatePolicy::Reject => {
                return Err(SatchelError::invalid_document(format!(
                    "duplicate id '{}' is already staged",
                    doc.id
                )));
            }
            Some(pos) => (
                self.docs.len(),
                self.memory - self.docs[pos].approximate_size() + size,
            ),
            None => (self.docs.len() + 1, self.memory + size),
        };

        if new_len > max_docs {
            return Err(SatchelError::out_of_memory(format!(
                "staging buffer holds {max_docs} documents; commit first"
            )));
        }
        if new_memory > max_memory {
            return Err(SatchelError::out_of_memory(format!(
                "staging buffer would use {new_memory} bytes, limit is {max_memory}"
            )));
        }

        match existing {
            Some(pos) => self.docs[pos] = doc,
            None => {
                self.docs.try_reserve(1)?;
                self.positions.insert(doc.id.clone(), self.docs.len());
                self.docs.push(doc);
            }
        }
        self.memory = new_memory;

        Ok(())
    }

    /// Whether a document with this id is staged.
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Staged documents in insertion order.
    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Approximate bytes held.
    pub fn memory(&self) -> usize {
        self.memory
    }

    /// Discard everything, returning how many documents were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.docs.len();
        self.docs.clear();
        self.positions.clear();
        self.memory = 0;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn doc(id: &str, content: &str) -> Document {
        Document::builder(id).content(content).build()
    }

    #[test]
    fn test_reject_duplicate() {
        let mut buffer = StagingBuffer::new();
        buffer
            .stage(doc("1", "a"), DuplicatePolicy::Reject, 10, 1 << 20)
            .unwrap();

        let err = buffer
            .stage(doc("1", "b"), DuplicatePolicy::Reject, 10, 1 << 20)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDocument);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.docs()[0].content, "a");
    }

    #[test]
    fn test_replace_duplicate_in_place() {
        let mut buffer = StagingBuffer::new();
        buffer
            .stage(doc("1", "a"), DuplicatePolicy::Replace, 10, 1 << 20)
            .unwrap();
        buffer
            .stage(doc("2", "b"), DuplicatePolicy::Replace, 10, 1 << 20)
            .unwrap();
        buffer
            .stage(doc("1", "longer"), DuplicatePolicy::Replace, 10, 1 << 20)
            .unwrap();

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.docs()[0].content, "longer");
        let expected: usize = buffer.docs().iter().map(Document::approximate_size).sum();
        assert_eq!(buffer.memory(), expected);
    }

    #[test]
    fn test_limits() {
        let mut buffer = StagingBuffer::new();
        buffer
            .stage(doc("1", "a"), DuplicatePolicy::Reject, 1, 1 << 20)
            .unwrap();

        let err = buffer
            .stage(doc("2", "b"), DuplicatePolicy::Reject, 1, 1 << 20)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);

        let big = doc("3", &"x".repeat(4096));
        let err = buffer
            .stage(big, DuplicatePolicy::Reject, 10, 1024)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
        assert_eq!(buffer.len(), 1);

        assert_eq!(buffer.clear(), 1);
        assert!(buffer.is_empty());
        assert!(!buffer.contains("1"));
    }
}
