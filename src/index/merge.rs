//! Segment merging: compacting every visible segment into one.
//!
//! Postings are carried over with remapped ordinals rather than
//! re-analyzing stored text, so a merge costs one pass over each segment's
//! dictionary and stored fields.

use serde::Serialize;

use crate::error::Result;
use crate::index::posting::Posting;
use crate::index::segment::SegmentBuilder;
use crate::index::snapshot::IndexSnapshot;

/// Outcome of [`Index::merge_segments`](crate::index::Index::merge_segments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Segments replaced by the merge (0 when there was nothing to do).
    pub segments_merged: usize,
    /// Live documents carried into the merged segment.
    pub docs_kept: u64,
    /// Deleted documents physically dropped.
    pub docs_dropped: u64,
    /// Generation after the merge.
    pub generation: u64,
}

/// Whether merging would change anything.
pub fn needs_merge(snapshot: &IndexSnapshot) -> bool {
    let segments = &snapshot.manifest().segments;
    segments.len() > 1 || segments.iter().any(|s| !s.deleted.is_empty())
}

/// Build the content of a single segment holding every live document of
/// `snapshot`, in segment order.
pub fn merge_snapshot(snapshot: &IndexSnapshot) -> Result<SegmentBuilder> {
    let mut builder = SegmentBuilder::new();

    for segment in snapshot.segments() {
        let reader = segment.reader();
        let mut remap: Vec<Option<u32>> = vec![None; reader.doc_count() as usize];

        for ordinal in segment.live_ordinals() {
            let doc = reader.document(ordinal)?;
            let lengths = reader.lengths().lengths(ordinal);
            remap[ordinal as usize] = Some(builder.add_stored(&doc, lengths)?);
        }

        // This segment's new ordinals all exceed those of earlier segments,
        // so per-term postings stay in increasing order.
        for info in reader.dictionary().iter() {
            for posting in reader.postings_for(info)?.postings {
                if let Some(new_ordinal) = remap.get(posting.ordinal as usize).copied().flatten() {
                    builder.add_posting(&info.term, Posting::new(new_ordinal, posting.positions));
                }
            }
        }
    }

    Ok(builder)
}
