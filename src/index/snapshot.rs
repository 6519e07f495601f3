//! Point-in-time views of an index.

use std::sync::Arc;

use crate::error::{Result, SatchelError};
use crate::index::lengths::LENGTH_SLOTS;
use crate::index::manifest::Manifest;
use crate::index::segment::SegmentReader;

/// A segment as seen by one snapshot: the shared reader plus the
/// tombstones the snapshot's manifest records for it.
#[derive(Debug, Clone)]
pub struct SegmentView {
    reader: Arc<SegmentReader>,
    deleted: Vec<u32>,
}

impl SegmentView {
    pub fn reader(&self) -> &SegmentReader {
        &self.reader
    }

    /// Whether the document at `ordinal` is visible.
    pub fn is_live(&self, ordinal: u32) -> bool {
        ordinal < self.reader.doc_count() && self.deleted.binary_search(&ordinal).is_err()
    }

    /// Visible ordinals in increasing order.
    pub fn live_ordinals(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.reader.doc_count()).filter(move |&ordinal| self.is_live(ordinal))
    }

    /// Number of visible documents.
    pub fn live_doc_count(&self) -> u64 {
        self.reader.doc_count() as u64 - self.deleted.len() as u64
    }
}

/// An immutable, consistent view of the committed index: a manifest and
/// the open segments it references.
#[derive(Debug)]
pub struct IndexSnapshot {
    manifest: Manifest,
    segments: Vec<SegmentView>,
    live_docs: u64,
    field_length_totals: [u64; LENGTH_SLOTS],
}

impl IndexSnapshot {
    /// Pair a manifest with readers for its segments, in manifest order.
    pub fn new(manifest: Manifest, readers: Vec<Arc<SegmentReader>>) -> Result<Self> {
        if readers.len() != manifest.segments.len() {
            return Err(SatchelError::unknown(format!(
                "snapshot has {} readers for {} segments",
                readers.len(),
                manifest.segments.len()
            )));
        }

        let mut segments = Vec::with_capacity(readers.len());
        let mut field_length_totals = [0u64; LENGTH_SLOTS];

        for (entry, reader) in manifest.segments.iter().zip(readers) {
            if reader.name() != entry.name || reader.doc_count() != entry.doc_count {
                return Err(SatchelError::corrupt(format!(
                    "segment {} does not match its manifest entry",
                    entry.name
                )));
            }

            let mut totals = entry.field_length_totals;
            for &ordinal in &entry.deleted {
                let lengths = reader.lengths().lengths(ordinal);
                for (total, len) in totals.iter_mut().zip(lengths) {
                    *total = total.saturating_sub(len as u64);
                }
            }
            for (sum, total) in field_length_totals.iter_mut().zip(totals) {
                *sum += total;
            }

            segments.push(SegmentView {
                reader,
                deleted: entry.deleted.clone(),
            });
        }

        let live_docs = manifest.live_doc_count();
        Ok(IndexSnapshot {
            manifest,
            segments,
            live_docs,
            field_length_totals,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn generation(&self) -> u64 {
        self.manifest.generation
    }

    pub fn segments(&self) -> &[SegmentView] {
        &self.segments
    }

    /// Shared readers of every segment, in order.
    pub fn readers(&self) -> Vec<Arc<SegmentReader>> {
        self.segments.iter().map(|s| Arc::clone(&s.reader)).collect()
    }

    /// Number of visible documents.
    pub fn live_doc_count(&self) -> u64 {
        self.live_docs
    }

    /// Mean token count of a field slot over visible documents.
    pub fn avg_field_length(&self, slot: usize) -> f32 {
        if self.live_docs == 0 {
            return 0.0;
        }
        self.field_length_totals[slot] as f32 / self.live_docs as f32
    }

    /// Locate a visible document by id: segment index and ordinal.
    pub fn find(&self, id: &str) -> Option<(usize, u32)> {
        // Later segments hold newer copies under the replace policy.
        self.segments
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, segment)| {
                segment
                    .reader
                    .ordinal(id)
                    .filter(|&ordinal| segment.is_live(ordinal))
                    .map(|ordinal| (index, ordinal))
            })
    }

    /// Whether a visible document has this id.
    pub fn contains_id(&self, id: &str) -> bool {
        self.find(id).is_some()
    }
}
