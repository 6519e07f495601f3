//! The index store: segments, the manifest, and the write path.
//!
//! Documents are staged in memory by [`Index::add`] and become durable and
//! searchable only at [`Index::commit`], which writes one immutable segment
//! and then atomically replaces the manifest. Readers work from an
//! [`IndexSnapshot`](snapshot::IndexSnapshot) and never observe a partial
//! commit.

pub mod dictionary;
pub mod lengths;
pub mod manifest;
pub mod merge;
pub mod posting;
pub mod segment;
pub mod snapshot;
pub mod staging;
pub mod stored;
pub mod store;

pub use merge::MergeStats;
pub use store::{CommitStats, Index, IndexStats};
