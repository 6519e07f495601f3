//! Per-document field lengths and priorities.
//!
//! BM25 length normalization needs every document's token count per indexed
//! field, and ranking needs the priority, both without decoding stored
//! documents. The body is
//!
//! ```text
//! doc_count | (priority u8, length varint * 5) * doc_count
//! ```

use std::io::{Cursor, Write};

use crate::error::{Result, SatchelError};
use crate::schema::Field;
use crate::storage::structured::{StructReader, StructWriter};

/// Number of length slots per document, one per indexed field.
pub const LENGTH_SLOTS: usize = Field::INDEXED.len();

/// Token counts of one document, indexed by [`Field::slot`].
pub type DocLengths = [u32; LENGTH_SLOTS];

/// Field lengths and priorities for all documents of a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLengths {
    priorities: Vec<u8>,
    lengths: Vec<DocLengths>,
}

impl FieldLengths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next document's priority and lengths.
    pub fn push(&mut self, priority: u8, lengths: DocLengths) {
        self.priorities.push(priority);
        self.lengths.push(lengths);
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.priorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }

    /// Priority of a document.
    pub fn priority(&self, ordinal: u32) -> u8 {
        self.priorities.get(ordinal as usize).copied().unwrap_or(0)
    }

    /// All lengths of a document.
    pub fn lengths(&self, ordinal: u32) -> DocLengths {
        self.lengths
            .get(ordinal as usize)
            .copied()
            .unwrap_or([0; LENGTH_SLOTS])
    }

    /// Token count of one field of a document.
    pub fn field_length(&self, ordinal: u32, slot: usize) -> u32 {
        self.lengths(ordinal)[slot]
    }

    /// Sum of each slot over all documents.
    pub fn totals(&self) -> [u64; LENGTH_SLOTS] {
        let mut totals = [0u64; LENGTH_SLOTS];
        for lengths in &self.lengths {
            for (total, &len) in totals.iter_mut().zip(lengths) {
                *total += len as u64;
            }
        }
        totals
    }

    /// Write the lengths body.
    pub fn write<W: Write>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_varint(self.priorities.len() as u64)?;
        for (priority, lengths) in self.priorities.iter().zip(&self.lengths) {
            writer.write_u8(*priority)?;
            for &len in lengths {
                writer.write_varint(len as u64)?;
            }
        }
        Ok(())
    }

    /// Parse a lengths body.
    pub fn read(body: &[u8]) -> Result<Self> {
        let mut reader = StructReader::new(Cursor::new(body));
        let count = reader.read_varint()?;

        // At least one byte per slot plus the priority.
        if count > body.len() as u64 {
            return Err(SatchelError::corrupt(format!(
                "lengths file claims {count} documents"
            )));
        }

        let mut field_lengths = FieldLengths::new();
        for _ in 0..count {
            let priority = reader.read_u8()?;
            let mut lengths = [0u32; LENGTH_SLOTS];
            for len in lengths.iter_mut() {
                *len = reader.read_varint_u32()?;
            }
            field_lengths.push(priority, lengths);
        }

        Ok(field_lengths)
    }
}
