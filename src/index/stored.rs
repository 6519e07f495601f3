//! Stored fields: the original values of every document, by ordinal.
//!
//! The body is an offsets table followed by one record per document:
//!
//! ```text
//! doc_count | offset delta * doc_count | records (length-prefixed bytes)
//! ```
//!
//! Offsets are decoded at open; records are decoded only when a document is
//! fetched for display.

use std::io::{Cursor, Write};

use crate::document::Document;
use crate::error::{Result, SatchelError};
use crate::storage::structured::{StructReader, StructWriter};

/// Accumulates stored documents for a new segment.
#[derive(Debug, Default)]
pub struct StoredFieldsWriter {
    records: Vec<u8>,
    offsets: Vec<u64>,
}

impl StoredFieldsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document; its ordinal is the number of documents added before it.
    pub fn add(&mut self, doc: &Document) -> Result<()> {
        self.records.try_reserve(doc.approximate_size())?;
        self.offsets.push(self.records.len() as u64);

        let mut writer = StructWriter::new(&mut self.records);
        writer.write_string(&doc.id)?;
        writer.write_string(&doc.title)?;
        writer.write_string(&doc.category)?;
        writer.write_u8(doc.priority)?;
        writer.write_string(&doc.summary)?;
        writer.write_string(&doc.content)?;

        Ok(())
    }

    /// Number of documents added.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Write the stored-fields body.
    pub fn write<W: Write>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_varint(self.offsets.len() as u64)?;

        let mut previous = 0u64;
        for &offset in &self.offsets {
            writer.write_varint(offset - previous)?;
            previous = offset;
        }

        writer.write_bytes(&self.records)
    }
}

/// Read access to a segment's stored documents.
#[derive(Debug)]
pub struct StoredFields {
    records: Vec<u8>,
    offsets: Vec<u64>,
}

impl StoredFields {
    /// Parse a stored-fields body.
    pub fn read(body: &[u8]) -> Result<Self> {
        let mut reader = StructReader::new(Cursor::new(body));
        let count = reader.read_varint()?;

        let mut offsets = Vec::new();
        let mut offset = 0u64;
        for _ in 0..count {
            offset = offset
                .checked_add(reader.read_varint()?)
                .ok_or_else(|| SatchelError::corrupt("stored offset overflow"))?;
            offsets.push(offset);
        }

        let records = reader.read_bytes()?;
        if offsets.last().is_some_and(|&last| last >= records.len() as u64) {
            return Err(SatchelError::corrupt("stored offset beyond records"));
        }

        Ok(StoredFields { records, offsets })
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Decode the document at `ordinal`.
    pub fn document(&self, ordinal: u32) -> Result<Document> {
        let offset = *self
            .offsets
            .get(ordinal as usize)
            .ok_or_else(|| SatchelError::corrupt(format!("no stored document {ordinal}")))?;

        let mut reader = StructReader::new(Cursor::new(&self.records[offset as usize..]));
        Ok(Document {
            id: reader.read_string()?,
            title: reader.read_string()?,
            category: reader.read_string()?,
            priority: reader.read_u8()?,
            summary: reader.read_string()?,
            content: reader.read_string()?,
        })
    }
}
