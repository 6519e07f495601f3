//! The manifest: the single source of truth for which segments are visible.
//!
//! Layout of `satchel.manifest`:
//!
//! ```text
//! "SMAN" | version u16 | index uuid (16 bytes) | generation u64 | next segment id u64
//!   | has commit time u8 | commit time (millis, i64)
//!   | segment count | segment entry*
//!   | crc32
//! segment entry := name | doc count | deleted ordinals (delta) | 5 length totals
//!   | file count | (file name | size u64 | crc32 u32)*
//! ```
//!
//! A new manifest is written to `satchel.manifest.tmp`, synced, and renamed
//! over the live one. The rename is the commit point.

use std::io::Cursor;

use ahash::AHashSet;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, SatchelError};
use crate::index::lengths::LENGTH_SLOTS;
use crate::storage::structured::{StructReader, StructWriter, verify_frame};
use crate::storage::{Storage, read_file, write_file};

/// Live manifest file name.
pub const MANIFEST_FILE: &str = "satchel.manifest";
/// Temporary manifest written before the rename.
pub const MANIFEST_TMP_FILE: &str = "satchel.manifest.tmp";

const MANIFEST_MAGIC: &[u8; 4] = b"SMAN";
const MANIFEST_VERSION: u16 = 1;

/// Size and checksum of one segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub checksum: u32,
}

/// One visible segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Segment name, the stem of its file names (`seg_000001`).
    pub name: String,
    /// Documents written to the segment, deleted or not.
    pub doc_count: u32,
    /// Tombstoned ordinals, sorted and unique.
    pub deleted: Vec<u32>,
    /// Sum of field lengths per slot over all documents of the segment.
    pub field_length_totals: [u64; LENGTH_SLOTS],
    /// The segment's files.
    pub files: Vec<FileEntry>,
}

impl SegmentEntry {
    /// Documents not tombstoned.
    pub fn live_doc_count(&self) -> u64 {
        self.doc_count as u64 - self.deleted.len() as u64
    }

    /// Bytes on disk.
    pub fn size_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Look up a file by name.
    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Tombstone an ordinal. Returns false if it was already deleted.
    pub fn delete(&mut self, ordinal: u32) -> bool {
        match self.deleted.binary_search(&ordinal) {
            Ok(_) => false,
            Err(pos) => {
                self.deleted.insert(pos, ordinal);
                true
            }
        }
    }
}

/// The durable description of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Identity of the index, fixed at creation.
    pub index_id: Uuid,
    /// Incremented by every published change.
    pub generation: u64,
    /// Number used for the next segment name.
    pub next_segment_id: u64,
    /// Time of the last commit or merge.
    pub last_commit: Option<DateTime<Utc>>,
    /// Visible segments, oldest first.
    pub segments: Vec<SegmentEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// The manifest of a freshly created, empty index.
    pub fn new() -> Self {
        Manifest {
            index_id: Uuid::new_v4(),
            generation: 0,
            next_segment_id: 1,
            last_commit: None,
            segments: Vec::new(),
        }
    }

    /// Reserve the name of the next segment.
    pub fn allocate_segment_name(&mut self) -> String {
        let name = format!("seg_{:06}", self.next_segment_id);
        self.next_segment_id += 1;
        name
    }

    /// Documents not tombstoned, over all segments.
    pub fn live_doc_count(&self) -> u64 {
        self.segments.iter().map(SegmentEntry::live_doc_count).sum()
    }

    /// Bytes of all segment files.
    pub fn segment_bytes(&self) -> u64 {
        self.segments.iter().map(SegmentEntry::size_bytes).sum()
    }

    /// Every file name the manifest references.
    pub fn referenced_files(&self) -> AHashSet<String> {
        self.segments
            .iter()
            .flat_map(|segment| segment.files.iter().map(|f| f.name.clone()))
            .collect()
    }

    /// Serialize the manifest.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = StructWriter::new(Vec::new());
        writer.write_header(MANIFEST_MAGIC, MANIFEST_VERSION)?;
        writer.write_raw(self.index_id.as_bytes())?;
        writer.write_u64(self.generation)?;
        writer.write_u64(self.next_segment_id)?;

        match self.last_commit {
            Some(time) => {
                writer.write_u8(1)?;
                writer.write_i64(time.timestamp_millis())?;
            }
            None => {
                writer.write_u8(0)?;
                writer.write_i64(0)?;
            }
        }

        writer.write_varint(self.segments.len() as u64)?;
        for segment in &self.segments {
            writer.write_string(&segment.name)?;
            writer.write_varint(segment.doc_count as u64)?;
            writer.write_delta_compressed_u32s(&segment.deleted)?;
            for total in segment.field_length_totals {
                writer.write_varint(total)?;
            }
            writer.write_varint(segment.files.len() as u64)?;
            for file in &segment.files {
                writer.write_string(&file.name)?;
                writer.write_u64(file.size)?;
                writer.write_u32(file.checksum)?;
            }
        }

        writer.finish()
    }

    /// Parse and validate a manifest.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let body = verify_frame(data, MANIFEST_MAGIC, MANIFEST_VERSION, MANIFEST_FILE)?;
        let mut reader = StructReader::new(Cursor::new(body));

        let id_bytes: [u8; 16] = reader
            .read_raw(16)?
            .try_into()
            .map_err(|_| SatchelError::corrupt("manifest: bad index id"))?;
        let index_id = Uuid::from_bytes(id_bytes);
        let generation = reader.read_u64()?;
        let next_segment_id = reader.read_u64()?;

        let has_commit = reader.read_u8()? != 0;
        let millis = reader.read_i64()?;
        let last_commit = if has_commit {
            Some(DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                SatchelError::corrupt(format!("manifest: bad commit time {millis}"))
            })?)
        } else {
            None
        };

        let segment_count = reader.read_varint()?;
        let mut segments = Vec::new();
        let mut names = AHashSet::new();
        for _ in 0..segment_count {
            let name = reader.read_string()?;
            let doc_count = reader.read_varint_u32()?;
            let deleted = reader.read_delta_compressed_u32s()?;

            let mut field_length_totals = [0u64; LENGTH_SLOTS];
            for total in field_length_totals.iter_mut() {
                *total = reader.read_varint()?;
            }

            let file_count = reader.read_varint()?;
            let mut files = Vec::new();
            for _ in 0..file_count {
                files.push(FileEntry {
                    name: reader.read_string()?,
                    size: reader.read_u64()?,
                    checksum: reader.read_u32()?,
                });
            }

            let sorted_unique = deleted.windows(2).all(|w| w[0] < w[1]);
            if !sorted_unique || deleted.last().is_some_and(|&last| last >= doc_count) {
                return Err(SatchelError::corrupt(format!(
                    "manifest: bad deleted ordinals for {name}"
                )));
            }

            if !names.insert(name.clone()) {
                return Err(SatchelError::corrupt(format!(
                    "manifest: segment {name} listed twice"
                )));
            }

            segments.push(SegmentEntry {
                name,
                doc_count,
                deleted,
                field_length_totals,
                files,
            });
        }

        if reader.position() != body.len() as u64 {
            return Err(SatchelError::corrupt("manifest: trailing bytes"));
        }

        Ok(Manifest {
            index_id,
            generation,
            next_segment_id,
            last_commit,
            segments,
        })
    }

    /// Load the live manifest, or `None` if the index has never been committed.
    pub fn load(storage: &dyn Storage) -> Result<Option<Self>> {
        if !storage.file_exists(MANIFEST_FILE) {
            return Ok(None);
        }

        let data = read_file(storage, MANIFEST_FILE)?;
        Self::decode(&data).map(Some)
    }

    /// Durably replace the live manifest with this one.
    pub fn publish(&self, storage: &dyn Storage) -> Result<()> {
        let data = self.encode()?;

        let result = write_file(storage, MANIFEST_TMP_FILE, &data)
            .and_then(|_| storage.rename_file(MANIFEST_TMP_FILE, MANIFEST_FILE));

        if result.is_err() && storage.file_exists(MANIFEST_TMP_FILE) {
            let _ = storage.delete_file(MANIFEST_TMP_FILE);
        }
        result?;

        // The rename is the commit point: the new manifest is live even if
        // the directory sync fails, so that failure must not undo the commit.
        if let Err(e) = storage.sync() {
            warn!(generation = self.generation, error = %e, "failed to sync index directory");
        }

        debug!(
            generation = self.generation,
            segments = self.segments.len(),
            bytes = data.len(),
            "published manifest"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::memory::MemoryStorage;

    fn sample() -> Manifest {
        let mut manifest = Manifest::new();
        let name = manifest.allocate_segment_name();
        manifest.generation = 3;
        manifest.last_commit = DateTime::from_timestamp_millis(1_700_000_000_123);
        manifest.segments.push(SegmentEntry {
            name: name.clone(),
            doc_count: 10,
            deleted: vec![2, 7],
            field_length_totals: [10, 40, 10, 0, 900],
            files: vec![FileEntry {
                name: format!("{name}.dict"),
                size: 120,
                checksum: 0xDEADBEEF,
            }],
        });
        manifest
    }

    #[test]
    fn test_encode_decode() {
        let manifest = sample();
        let decoded = Manifest::decode(&manifest.encode().unwrap()).unwrap();

        assert_eq!(decoded, manifest);
        assert_eq!(decoded.live_doc_count(), 8);
        assert_eq!(decoded.segments[0].name, "seg_000001");
        assert_eq!(decoded.next_segment_id, 2);
        assert!(decoded.referenced_files().contains("seg_000001.dict"));
    }

    #[test]
    fn test_corruption_detected() {
        let mut data = sample().encode().unwrap();
        let mid = data.len() / 2;
        data[mid] ^= 0x01;

        let err = Manifest::decode(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptIndex);
    }

    #[test]
    fn test_publish_and_load() {
        let storage = MemoryStorage::new();
        assert!(Manifest::load(&storage).unwrap().is_none());

        let manifest = sample();
        manifest.publish(&storage).unwrap();

        assert!(!storage.file_exists(MANIFEST_TMP_FILE));
        assert_eq!(Manifest::load(&storage).unwrap(), Some(manifest));
    }

    #[test]
    fn test_segment_delete() {
        let mut entry = sample().segments.remove(0);
        assert!(entry.delete(5));
        assert!(!entry.delete(5));
        assert_eq!(entry.deleted, vec![2, 5, 7]);
        assert_eq!(entry.live_doc_count(), 7);
    }
}
