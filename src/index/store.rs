//! The index store: ingestion, commit, and snapshot publication.
//!
//! # Concurrency
//!
//! - `add` takes only the staging lock.
//! - `commit` and `merge_segments` serialize on the write lock and do their
//!   I/O without holding the snapshot lock; the new snapshot is swapped in
//!   only after the manifest rename succeeds.
//! - Readers clone the current snapshot `Arc` and need no further locking.
//!
//! Lock order is write lock, then staging, then snapshot.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DuplicatePolicy, IndexConfig};
use crate::document::{Document, RawDocument};
use crate::error::{Result, SatchelError};
use crate::index::manifest::{MANIFEST_FILE, MANIFEST_TMP_FILE, Manifest};
use crate::index::merge::{MergeStats, merge_snapshot, needs_merge};
use crate::index::segment::{
    SegmentBuilder, SegmentReader, is_segment_file, remove_segment_files,
};
use crate::index::snapshot::IndexSnapshot;
use crate::index::staging::StagingBuffer;
use crate::schema::Schema;
use crate::search::searcher::Searcher;
use crate::storage::Storage;
use crate::storage::file::FileStorage;

/// Outcome of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitStats {
    /// Documents made durable by this commit.
    pub docs_committed: usize,
    /// Visible documents after the commit.
    pub total_docs: u64,
    /// Generation after the commit.
    pub generation: u64,
}

/// Index statistics, derived from the current manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Visible documents.
    pub doc_count: u64,
    /// Approximate bytes on disk: segment files plus the manifest.
    pub size_bytes: u64,
    pub generation: u64,
    pub segment_count: usize,
    /// Documents staged but not committed.
    pub pending_docs: usize,
    pub last_commit: Option<DateTime<Utc>>,
}

/// An embedded full-text index.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use satchel::config::IndexConfig;
/// use satchel::document::Document;
/// use satchel::index::Index;
/// use satchel::storage::memory::MemoryStorage;
///
/// # fn main() -> satchel::error::Result<()> {
/// let index = Index::open_with_storage(Arc::new(MemoryStorage::new()), IndexConfig::default())?;
/// index.add(Document::builder("1").content("water purification tablets").build())?;
/// index.add(Document::builder("2").content("water filter pump").build())?;
/// index.commit()?;
///
/// let results = index.searcher().search("water AND filter", 10, 0)?;
/// assert_eq!(results.hits[0].id, "2");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Index {
    storage: Arc<dyn Storage>,
    config: Arc<IndexConfig>,
    schema: Schema,
    state: RwLock<Arc<IndexSnapshot>>,
    staging: Mutex<StagingBuffer>,
    write_lock: Mutex<()>,
}

impl Index {
    /// Open the index at `path`, creating an empty one if none exists.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_or_create_with_config(path, IndexConfig::default())
    }

    /// Open or create the index at `path` with the given configuration.
    pub fn open_or_create_with_config<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        let storage = FileStorage::new(path.as_ref(), config.sync_writes)?;
        Self::open_with_storage(Arc::new(storage), config)
    }

    /// Open or create an index over any storage backend.
    pub fn open_with_storage(storage: Arc<dyn Storage>, config: IndexConfig) -> Result<Self> {
        config.validate()?;

        let manifest = match Manifest::load(&*storage)? {
            Some(manifest) => manifest,
            None => {
                let manifest = Manifest::new();
                manifest.publish(&*storage)?;
                info!(index_id = %manifest.index_id, "created new index");
                manifest
            }
        };

        let readers = manifest
            .segments
            .iter()
            .map(|entry| SegmentReader::open(Arc::clone(&storage), entry).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        collect_garbage(&*storage, &manifest);

        let snapshot = IndexSnapshot::new(manifest, readers)?;
        info!(
            generation = snapshot.generation(),
            segments = snapshot.segments().len(),
            docs = snapshot.live_doc_count(),
            "opened index"
        );

        Ok(Index {
            storage,
            config: Arc::new(config),
            schema: Schema::new(),
            state: RwLock::new(Arc::new(snapshot)),
            staging: Mutex::new(StagingBuffer::new()),
            write_lock: Mutex::new(()),
        })
    }

    /// The configuration this index was opened with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The current committed snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.state.read())
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }

    /// Validate a document and stage it for the next commit.
    pub fn add(&self, doc: Document) -> Result<()> {
        doc.validate()?;

        let policy = self.config.duplicate_policy;
        let mut staging = self.staging.lock();

        if policy == DuplicatePolicy::Reject && self.snapshot().contains_id(&doc.id) {
            return Err(SatchelError::invalid_document(format!(
                "duplicate id '{}' is already committed",
                doc.id
            )));
        }

        staging.stage(
            doc,
            policy,
            self.config.max_buffered_docs,
            self.config.max_buffer_memory,
        )
    }

    /// Decode, validate and stage a document given as raw bytes.
    pub fn add_raw(&self, raw: RawDocument) -> Result<()> {
        self.add(raw.into_document()?)
    }

    /// Number of staged, uncommitted documents.
    pub fn pending_docs(&self) -> usize {
        self.staging.lock().len()
    }

    /// Discard staged documents, returning how many were dropped.
    pub fn rollback(&self) -> usize {
        let dropped = self.staging.lock().clear();
        debug!(dropped, "rolled back staging buffer");
        dropped
    }

    /// Make every staged document durable and visible as one new segment.
    ///
    /// On failure nothing visible changes and the documents stay staged.
    pub fn commit(&self) -> Result<CommitStats> {
        let _write = self.write_lock.lock();
        let mut staging = self.staging.lock();
        let current = self.snapshot();

        if staging.is_empty() {
            return Ok(CommitStats {
                docs_committed: 0,
                total_docs: current.live_doc_count(),
                generation: current.generation(),
            });
        }

        let started = Instant::now();
        let mut manifest = current.manifest().clone();
        let name = manifest.allocate_segment_name();

        if self.config.duplicate_policy == DuplicatePolicy::Replace {
            for doc in staging.docs() {
                if let Some((segment, ordinal)) = current.find(&doc.id) {
                    manifest.segments[segment].delete(ordinal);
                }
            }
        }

        let builder = SegmentBuilder::from_documents(staging.docs(), &self.schema)?;
        let mut readers = current.readers();
        readers.push(self.write_segment(builder, &name, &mut manifest)?);

        manifest.generation += 1;
        manifest.last_commit = Some(Utc::now());
        self.publish(manifest, readers, &name)?;

        let docs_committed = staging.clear();
        let snapshot = self.snapshot();
        info!(
            segment = %name,
            docs = docs_committed,
            generation = snapshot.generation(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "commit complete"
        );

        Ok(CommitStats {
            docs_committed,
            total_docs: snapshot.live_doc_count(),
            generation: snapshot.generation(),
        })
    }

    /// Compact all segments into one, physically dropping deleted documents.
    pub fn merge_segments(&self) -> Result<MergeStats> {
        let _write = self.write_lock.lock();
        let current = self.snapshot();

        if !needs_merge(&current) {
            return Ok(MergeStats {
                segments_merged: 0,
                docs_kept: current.live_doc_count(),
                docs_dropped: 0,
                generation: current.generation(),
            });
        }

        let started = Instant::now();
        let old = current.manifest();
        let docs_dropped: u64 = old.segments.iter().map(|s| s.deleted.len() as u64).sum();

        let builder = merge_snapshot(&current)?;
        let mut manifest = old.clone();
        manifest.segments.clear();

        let mut readers = Vec::new();
        let mut name = String::new();
        if builder.doc_count() > 0 {
            name = manifest.allocate_segment_name();
            readers.push(self.write_segment(builder, &name, &mut manifest)?);
        }

        manifest.generation += 1;
        manifest.last_commit = Some(Utc::now());
        self.publish(manifest, readers, &name)?;

        for reader in current.readers() {
            reader.mark_obsolete();
        }

        let stats = MergeStats {
            segments_merged: old.segments.len(),
            docs_kept: current.live_doc_count(),
            docs_dropped,
            generation: old.generation + 1,
        };
        info!(
            segments = stats.segments_merged,
            kept = stats.docs_kept,
            dropped = stats.docs_dropped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "merge complete"
        );

        Ok(stats)
    }

    /// Re-read the manifest from storage and publish it if it differs from
    /// the current snapshot, for example after a content pack replaced the
    /// index files. Staged documents are kept. Returns the generation now
    /// visible.
    pub fn reload(&self) -> Result<u64> {
        let _write = self.write_lock.lock();
        let _staging = self.staging.lock();
        let current = self.snapshot();

        let manifest = Manifest::load(&*self.storage)?
            .ok_or_else(|| SatchelError::corrupt("manifest is missing"))?;

        let unchanged = manifest.index_id == current.manifest().index_id
            && manifest.generation == current.generation();
        if unchanged {
            debug!(generation = manifest.generation, "reload found no changes");
            return Ok(manifest.generation);
        }

        let readers = manifest
            .segments
            .iter()
            .map(|entry| SegmentReader::open(Arc::clone(&self.storage), entry).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let snapshot = IndexSnapshot::new(manifest, readers)?;
        let generation = snapshot.generation();

        collect_garbage(&*self.storage, snapshot.manifest());
        *self.state.write() = Arc::new(snapshot);

        info!(
            previous = current.generation(),
            generation,
            "reloaded index from storage"
        );
        Ok(generation)
    }

    /// Write a segment and open it, appending its entry to `manifest`.
    fn write_segment(
        &self,
        builder: SegmentBuilder,
        name: &str,
        manifest: &mut Manifest,
    ) -> Result<Arc<SegmentReader>> {
        let opened = builder
            .write(&*self.storage, name)
            .and_then(|entry| {
                let reader = SegmentReader::open(Arc::clone(&self.storage), &entry)?;
                Ok((entry, reader))
            });

        match opened {
            Ok((entry, reader)) => {
                manifest.segments.push(entry);
                Ok(Arc::new(reader))
            }
            Err(e) => {
                remove_segment_files(&*self.storage, name);
                Err(e)
            }
        }
    }

    /// Publish a manifest and swap in its snapshot. On failure the segment
    /// `name` (if any) is removed and the current snapshot is left untouched.
    fn publish(&self, manifest: Manifest, readers: Vec<Arc<SegmentReader>>, name: &str) -> Result<()> {
        let published = IndexSnapshot::new(manifest, readers).and_then(|snapshot| {
            snapshot.manifest().publish(&*self.storage)?;
            Ok(snapshot)
        });

        match published {
            Ok(snapshot) => {
                *self.state.write() = Arc::new(snapshot);
                Ok(())
            }
            Err(e) => {
                if !name.is_empty() {
                    remove_segment_files(&*self.storage, name);
                }
                Err(e)
            }
        }
    }

    /// Statistics of the committed index.
    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot();
        let manifest = snapshot.manifest();
        let manifest_bytes = self.storage.file_size(MANIFEST_FILE).unwrap_or(0);

        IndexStats {
            doc_count: snapshot.live_doc_count(),
            size_bytes: manifest.segment_bytes() + manifest_bytes,
            generation: manifest.generation,
            segment_count: manifest.segments.len(),
            pending_docs: self.pending_docs(),
            last_commit: manifest.last_commit,
        }
    }

    /// Cheap health check: the manifest on storage is valid and every file
    /// it references exists with its recorded size.
    pub fn is_healthy(&self) -> bool {
        match Manifest::load(&*self.storage) {
            Ok(Some(manifest)) => manifest.segments.iter().all(|segment| {
                segment.files.iter().all(|file| {
                    self.storage
                        .file_size(&file.name)
                        .is_ok_and(|size| size == file.size)
                })
            }),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "health check failed");
                false
            }
        }
    }

    /// A searcher over the current committed snapshot.
    ///
    /// Acquiring a new searcher after a commit is how readers reload.
    pub fn searcher(&self) -> Searcher {
        Searcher::new(self.snapshot(), self.schema.clone(), Arc::clone(&self.config))
    }

    /// Close the index, discarding any staged documents.
    pub fn close(self) -> Result<()> {
        let pending = self.pending_docs();
        if pending > 0 {
            warn!(pending, "closing index with uncommitted documents");
        }
        debug!(generation = self.generation(), "closed index");
        Ok(())
    }
}

/// Remove files a crashed commit or merge left behind.
fn collect_garbage(storage: &dyn Storage, manifest: &Manifest) {
    let referenced = manifest.referenced_files();
    let files = match storage.list_files() {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "could not list index files for cleanup");
            return;
        }
    };

    for name in files {
        let orphan = name == MANIFEST_TMP_FILE || (is_segment_file(&name) && !referenced.contains(&name));
        if orphan {
            warn!(file = %name, "removing unreferenced file");
            if let Err(e) = storage.delete_file(&name) {
                warn!(file = %name, error = %e, "failed to remove unreferenced file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::write_file;

    fn memory_index(config: IndexConfig) -> (MemoryStorage, Index) {
        let storage = MemoryStorage::new();
        let index = Index::open_with_storage(Arc::new(storage.clone()), config).unwrap();
        (storage, index)
    }

    fn doc(id: &str, content: &str) -> Document {
        Document::builder(id).content(content).build()
    }

    #[test]
    fn test_add_commit_stats() {
        let (_, index) = memory_index(IndexConfig::default());
        assert_eq!(index.stats().doc_count, 0);
        assert_eq!(index.generation(), 0);

        index.add(doc("1", "water purification tablets")).unwrap();
        index.add(doc("2", "water filter pump")).unwrap();
        assert_eq!(index.pending_docs(), 2);
        assert_eq!(index.stats().doc_count, 0);

        let commit = index.commit().unwrap();
        assert_eq!(commit.docs_committed, 2);
        assert_eq!(commit.total_docs, 2);
        assert_eq!(commit.generation, 1);

        let stats = index.stats();
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.segment_count, 1);
        assert_eq!(stats.pending_docs, 0);
        assert!(stats.size_bytes > 0);
        assert!(stats.last_commit.is_some());
        assert!(index.is_healthy());
    }

    #[test]
    fn test_empty_commit_is_noop() {
        let (_, index) = memory_index(IndexConfig::default());
        let commit = index.commit().unwrap();
        assert_eq!(commit.docs_committed, 0);
        assert_eq!(commit.generation, 0);
    }

    #[test]
    fn test_reject_committed_duplicate() {
        let (_, index) = memory_index(IndexConfig::default());
        index.add(doc("1", "a")).unwrap();
        index.commit().unwrap();

        let err = index.add(doc("1", "b")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDocument);
        assert_eq!(index.pending_docs(), 0);
    }

    #[test]
    fn test_replace_tombstones_old_copy() {
        let config = IndexConfig::default().with_duplicate_policy(DuplicatePolicy::Replace);
        let (_, index) = memory_index(config);

        index.add(doc("1", "old text")).unwrap();
        index.commit().unwrap();
        index.add(doc("1", "new text")).unwrap();
        index.commit().unwrap();

        let snapshot = index.snapshot();
        assert_eq!(snapshot.live_doc_count(), 1);
        assert_eq!(snapshot.manifest().segments[0].deleted, vec![0]);
        assert_eq!(snapshot.find("1"), Some((1, 0)));
    }

    #[test]
    fn test_rollback() {
        let (_, index) = memory_index(IndexConfig::default());
        index.add(doc("1", "a")).unwrap();
        assert_eq!(index.rollback(), 1);
        assert_eq!(index.commit().unwrap().docs_committed, 0);
    }

    #[test]
    fn test_invalid_document_leaves_buffer_untouched() {
        let (_, index) = memory_index(IndexConfig::default());
        index.add(doc("1", "a")).unwrap();
        assert!(index.add(doc("", "b")).is_err());
        assert_eq!(index.pending_docs(), 1);
    }

    #[test]
    fn test_reopen_preserves_documents() {
        let (storage, index) = memory_index(IndexConfig::default());
        index.add(doc("1", "a")).unwrap();
        index.commit().unwrap();
        let index_id = index.snapshot().manifest().index_id;
        index.close().unwrap();

        let reopened = Index::open_with_storage(Arc::new(storage), IndexConfig::default()).unwrap();
        assert_eq!(reopened.stats().doc_count, 1);
        assert_eq!(reopened.generation(), 1);
        assert_eq!(reopened.snapshot().manifest().index_id, index_id);
    }

    #[test]
    fn test_garbage_collected_at_open() {
        let (storage, index) = memory_index(IndexConfig::default());
        index.add(doc("1", "a")).unwrap();
        index.commit().unwrap();
        drop(index);

        write_file(&storage, "seg_000099.post", b"partial").unwrap();
        write_file(&storage, MANIFEST_TMP_FILE, b"partial").unwrap();
        write_file(&storage, "notes.txt", b"keep me").unwrap();

        let _index = Index::open_with_storage(Arc::new(storage.clone()), IndexConfig::default()).unwrap();
        assert!(!storage.file_exists("seg_000099.post"));
        assert!(!storage.file_exists(MANIFEST_TMP_FILE));
        assert!(storage.file_exists("notes.txt"));
        assert!(storage.file_exists("seg_000001.post"));
    }

    #[test]
    fn test_merge_drops_deleted() {
        let config = IndexConfig::default().with_duplicate_policy(DuplicatePolicy::Replace);
        let (storage, index) = memory_index(config);

        for round in 0..3 {
            index.add(doc("shared", &format!("round {round}"))).unwrap();
            index.add(doc(&format!("doc{round}"), "unique")).unwrap();
            index.commit().unwrap();
        }
        assert_eq!(index.stats().segment_count, 3);
        assert_eq!(index.stats().doc_count, 4);

        let stats = index.merge_segments().unwrap();
        assert_eq!(stats.segments_merged, 3);
        assert_eq!(stats.docs_kept, 4);
        assert_eq!(stats.docs_dropped, 2);
        assert_eq!(stats.generation, 4);

        let after = index.stats();
        assert_eq!(after.segment_count, 1);
        assert_eq!(after.doc_count, 4);
        // Only the merged segment's files and the manifest remain.
        assert_eq!(storage.file_count(), 5);

        let again = index.merge_segments().unwrap();
        assert_eq!(again.segments_merged, 0);
    }

    #[test]
    fn test_reload_picks_up_replaced_files() {
        let (storage, index) = memory_index(IndexConfig::default());
        index.add(doc("old", "lantern")).unwrap();
        index.commit().unwrap();
        assert_eq!(index.reload().unwrap(), 1);

        // Build a replacement elsewhere and copy its files over.
        let (pack, packed) = memory_index(IndexConfig::default());
        packed.add(doc("new-1", "compass")).unwrap();
        packed.commit().unwrap();
        packed.add(doc("new-2", "compass")).unwrap();
        packed.commit().unwrap();
        drop(packed);

        let before = index.searcher();
        for name in pack.list_files().unwrap() {
            let data = crate::storage::read_file(&pack, &name).unwrap();
            write_file(&storage, &name, &data).unwrap();
        }
        assert_eq!(index.generation(), 1);

        assert_eq!(index.reload().unwrap(), 2);
        assert_eq!(index.stats().doc_count, 2);
        assert_eq!(index.searcher().search("compass", 10, 0).unwrap().total_hits, 2);
        assert_eq!(index.searcher().search("lantern", 10, 0).unwrap().total_hits, 0);

        // A searcher taken before the reload still reads the old snapshot.
        assert_eq!(before.search("lantern", 10, 0).unwrap().total_hits, 1);

        storage.put_file(MANIFEST_FILE, b"SMAN garbage".to_vec());
        assert_eq!(index.reload().unwrap_err().kind(), ErrorKind::CorruptIndex);
        assert_eq!(index.searcher().search("compass", 10, 0).unwrap().total_hits, 2);
    }

    #[test]
    fn test_corrupt_manifest_fails_open() {
        let (storage, index) = memory_index(IndexConfig::default());
        index.add(doc("1", "a")).unwrap();
        index.commit().unwrap();
        drop(index);

        storage.put_file(MANIFEST_FILE, b"SMAN garbage".to_vec());
        let err = Index::open_with_storage(Arc::new(storage), IndexConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptIndex);
    }
}
