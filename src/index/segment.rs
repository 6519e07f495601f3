//! Segments: immutable, self-contained units of indexed documents.
//!
//! A segment named `seg_000001` consists of four files, each framed with a
//! magic, a format version and a CRC32 trailer:
//!
//! | File    | Content                                      |
//! |---------|----------------------------------------------|
//! | `.dict` | sorted term dictionary                       |
//! | `.post` | posting lists, addressed by the dictionary   |
//! | `.docs` | stored fields                                |
//! | `.lens` | per-document field lengths and priorities    |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{Result, SatchelError};
use crate::index::dictionary::{TermDictionary, TermInfo};
use crate::index::lengths::{DocLengths, FieldLengths, LENGTH_SLOTS};
use crate::index::manifest::{FileEntry, SegmentEntry};
use crate::index::posting::{Posting, PostingList, TermPostingIndex};
use crate::index::stored::{StoredFields, StoredFieldsWriter};
use crate::schema::{Field, Schema};
use crate::storage::structured::{HEADER_LEN, StructWriter, file_checksum, verify_frame};
use crate::storage::{Storage, read_file, write_file};

const SEGMENT_VERSION: u16 = 1;

/// The files of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentFile {
    Dictionary,
    Postings,
    Stored,
    Lengths,
}

impl SegmentFile {
    pub const ALL: [SegmentFile; 4] = [
        SegmentFile::Dictionary,
        SegmentFile::Postings,
        SegmentFile::Stored,
        SegmentFile::Lengths,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            SegmentFile::Dictionary => "dict",
            SegmentFile::Postings => "post",
            SegmentFile::Stored => "docs",
            SegmentFile::Lengths => "lens",
        }
    }

    fn magic(self) -> &'static [u8; 4] {
        match self {
            SegmentFile::Dictionary => b"SDIC",
            SegmentFile::Postings => b"SPST",
            SegmentFile::Stored => b"SDOC",
            SegmentFile::Lengths => b"SLEN",
        }
    }

    /// File name within a segment.
    pub fn file_name(self, segment: &str) -> String {
        format!("{segment}.{}", self.extension())
    }
}

/// Whether `name` looks like a segment file.
pub fn is_segment_file(name: &str) -> bool {
    name.starts_with("seg_")
        && SegmentFile::ALL
            .iter()
            .any(|f| name.ends_with(&format!(".{}", f.extension())))
}

/// Delete every file of a segment, ignoring errors.
pub fn remove_segment_files(storage: &dyn Storage, segment: &str) {
    for file in SegmentFile::ALL {
        let name = file.file_name(segment);
        if let Err(e) = storage.delete_file(&name) {
            warn!(file = %name, error = %e, "failed to remove segment file");
        }
    }
}

/// In-memory content of a segment under construction.
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    postings: TermPostingIndex,
    stored: StoredFieldsWriter,
    lengths: FieldLengths,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze and add documents in order; the first gets ordinal 0.
    pub fn from_documents<'a, I>(docs: I, schema: &Schema) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut builder = SegmentBuilder::new();
        for doc in docs {
            builder.add_document(doc, schema)?;
        }
        Ok(builder)
    }

    /// Number of documents added so far, which is the next ordinal.
    pub fn doc_count(&self) -> u32 {
        self.lengths.len() as u32
    }

    /// Analyze a document and add it under the next ordinal.
    pub fn add_document(&mut self, doc: &Document, schema: &Schema) -> Result<u32> {
        let ordinal = self.doc_count();
        let mut lengths: DocLengths = [0; LENGTH_SLOTS];

        for (slot, field) in Field::INDEXED.into_iter().enumerate() {
            let text = doc.text(field).unwrap_or_default();
            let tokens = schema.analyze(field, text)?;
            lengths[slot] = tokens.len() as u32;

            let mut positions: AHashMap<&str, Vec<u32>> = AHashMap::new();
            for token in &tokens {
                positions
                    .entry(token.text.as_str())
                    .or_default()
                    .push(token.position as u32);
            }

            for (term, term_positions) in positions {
                self.postings
                    .add_posting(&field.term_key(term), Posting::new(ordinal, term_positions));
            }
        }

        self.stored.add(doc)?;
        self.lengths.push(doc.priority, lengths);
        Ok(ordinal)
    }

    /// Add a document's stored fields and lengths without analyzing it.
    ///
    /// Used when merging: postings are carried over with [`add_posting`].
    ///
    /// [`add_posting`]: SegmentBuilder::add_posting
    pub fn add_stored(&mut self, doc: &Document, lengths: DocLengths) -> Result<u32> {
        let ordinal = self.doc_count();
        self.stored.add(doc)?;
        self.lengths.push(doc.priority, lengths);
        Ok(ordinal)
    }

    /// Add a posting for a document already added with [`add_stored`].
    /// Postings of a term must arrive in increasing ordinal order.
    ///
    /// [`add_stored`]: SegmentBuilder::add_stored
    pub fn add_posting(&mut self, term: &str, posting: Posting) {
        self.postings.add_posting(term, posting);
    }

    /// Encode and durably write the segment's files.
    ///
    /// On error some files may exist; the caller removes them.
    pub fn write(self, storage: &dyn Storage, name: &str) -> Result<SegmentEntry> {
        let doc_count = self.doc_count();
        let field_length_totals = self.lengths.totals();
        let term_count = self.postings.term_count();

        // Postings first: the dictionary records their offsets.
        let mut post = StructWriter::new(Vec::new());
        post.write_header(SegmentFile::Postings.magic(), SEGMENT_VERSION)?;
        let mut entries = Vec::with_capacity(term_count);
        for (term, list) in self.postings.into_sorted() {
            let offset = post.position() - HEADER_LEN as u64;
            list.encode(&mut post)?;
            entries.push(TermInfo {
                term,
                doc_freq: list.len() as u32,
                offset,
                length: post.position() - HEADER_LEN as u64 - offset,
            });
        }
        let post = post.finish()?;

        let mut dict = StructWriter::new(Vec::new());
        dict.write_header(SegmentFile::Dictionary.magic(), SEGMENT_VERSION)?;
        TermDictionary::from_sorted(entries)?.write(&mut dict)?;
        let dict = dict.finish()?;

        let mut docs = StructWriter::new(Vec::new());
        docs.write_header(SegmentFile::Stored.magic(), SEGMENT_VERSION)?;
        self.stored.write(&mut docs)?;
        let docs = docs.finish()?;

        let mut lens = StructWriter::new(Vec::new());
        lens.write_header(SegmentFile::Lengths.magic(), SEGMENT_VERSION)?;
        self.lengths.write(&mut lens)?;
        let lens = lens.finish()?;

        let mut files = Vec::with_capacity(4);
        for (kind, data) in [
            (SegmentFile::Dictionary, &dict),
            (SegmentFile::Postings, &post),
            (SegmentFile::Stored, &docs),
            (SegmentFile::Lengths, &lens),
        ] {
            let file_name = kind.file_name(name);
            let size = write_file(storage, &file_name, data)?;
            files.push(FileEntry {
                name: file_name,
                size,
                checksum: file_checksum(data),
            });
        }

        debug!(segment = name, docs = doc_count, terms = term_count, "wrote segment");

        Ok(SegmentEntry {
            name: name.to_string(),
            doc_count,
            deleted: Vec::new(),
            field_length_totals,
            files,
        })
    }
}

/// Read access to a committed segment.
///
/// Files are loaded and verified once at open. A reader marked obsolete
/// (superseded by a merge) deletes its files when the last reference to it
/// is dropped, so searchers holding an older snapshot keep working.
#[derive(Debug)]
pub struct SegmentReader {
    name: String,
    storage: Arc<dyn Storage>,
    dictionary: TermDictionary,
    postings: Vec<u8>,
    stored: StoredFields,
    lengths: FieldLengths,
    ids: Vec<String>,
    ordinals: AHashMap<String, u32>,
    obsolete: AtomicBool,
}

impl SegmentReader {
    /// Open a segment described by a manifest entry, verifying every file.
    pub fn open(storage: Arc<dyn Storage>, entry: &SegmentEntry) -> Result<Self> {
        let dict = load_file(&*storage, entry, SegmentFile::Dictionary)?;
        let post = load_file(&*storage, entry, SegmentFile::Postings)?;
        let docs = load_file(&*storage, entry, SegmentFile::Stored)?;
        let lens = load_file(&*storage, entry, SegmentFile::Lengths)?;

        let postings_len = frame_body(&post, entry, SegmentFile::Postings)?.len() as u64;
        let dictionary = TermDictionary::read(
            frame_body(&dict, entry, SegmentFile::Dictionary)?,
            postings_len,
        )?;
        let stored = StoredFields::read(frame_body(&docs, entry, SegmentFile::Stored)?)?;
        let lengths = FieldLengths::read(frame_body(&lens, entry, SegmentFile::Lengths)?)?;

        let doc_count = entry.doc_count as usize;
        if stored.len() != doc_count || lengths.len() != doc_count {
            return Err(SatchelError::corrupt(format!(
                "segment {}: expected {doc_count} documents, found {} stored and {} lengths",
                entry.name,
                stored.len(),
                lengths.len()
            )));
        }

        let mut reader = SegmentReader {
            name: entry.name.clone(),
            storage,
            dictionary,
            postings: post,
            stored,
            lengths,
            ids: vec![String::new(); doc_count],
            ordinals: AHashMap::with_capacity(doc_count),
            obsolete: AtomicBool::new(false),
        };
        reader.build_id_map()?;

        debug!(segment = %reader.name, docs = doc_count, terms = reader.dictionary.len(), "opened segment");
        Ok(reader)
    }

    /// Resolve every ordinal to its id through the `id:` postings.
    fn build_id_map(&mut self) -> Result<()> {
        let prefix = Field::Id.term_key("");
        let mut ids = vec![String::new(); self.ids.len()];
        let mut ordinals = AHashMap::with_capacity(ids.len());

        for info in self.dictionary.prefixed(&prefix) {
            let id = &info.term[prefix.len()..];
            for posting in self.read_postings(info)?.iter() {
                let slot = ids.get_mut(posting.ordinal as usize).ok_or_else(|| {
                    SatchelError::corrupt(format!("segment {}: id posting out of range", self.name))
                })?;
                *slot = id.to_string();
                ordinals.insert(id.to_string(), posting.ordinal);
            }
        }

        if ordinals.len() != ids.len() {
            return Err(SatchelError::corrupt(format!(
                "segment {}: {} ids for {} documents",
                self.name,
                ordinals.len(),
                ids.len()
            )));
        }

        self.ids = ids;
        self.ordinals = ordinals;
        Ok(())
    }

    fn read_postings(&self, info: &TermInfo) -> Result<PostingList> {
        // Offsets are relative to the postings body, which follows the header.
        let start = HEADER_LEN + info.offset as usize;
        let end = start + info.length as usize;
        PostingList::decode(&self.postings[start..end])
    }

    /// The segment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Documents in the segment, including deleted ones.
    pub fn doc_count(&self) -> u32 {
        self.ids.len() as u32
    }

    /// The term dictionary.
    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    /// Postings for a term key, if the segment contains it.
    pub fn postings(&self, term: &str) -> Result<Option<PostingList>> {
        match self.dictionary.get(term) {
            Some(info) => self.read_postings(info).map(Some),
            None => Ok(None),
        }
    }

    /// Postings for a dictionary entry of this segment.
    pub fn postings_for(&self, info: &TermInfo) -> Result<PostingList> {
        self.read_postings(info)
    }

    /// Fetch the stored document at `ordinal`.
    pub fn document(&self, ordinal: u32) -> Result<Document> {
        self.stored.document(ordinal)
    }

    /// The id of the document at `ordinal`.
    pub fn id(&self, ordinal: u32) -> &str {
        self.ids.get(ordinal as usize).map(String::as_str).unwrap_or("")
    }

    /// The ordinal of a document id.
    pub fn ordinal(&self, id: &str) -> Option<u32> {
        self.ordinals.get(id).copied()
    }

    /// Field lengths and priorities.
    pub fn lengths(&self) -> &FieldLengths {
        &self.lengths
    }

    /// Delete this segment's files once the last reference is dropped.
    pub fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::Release);
    }
}

impl Drop for SegmentReader {
    fn drop(&mut self) {
        if self.obsolete.load(Ordering::Acquire) {
            debug!(segment = %self.name, "removing obsolete segment");
            remove_segment_files(&*self.storage, &self.name);
        }
    }
}

fn load_file(storage: &dyn Storage, entry: &SegmentEntry, kind: SegmentFile) -> Result<Vec<u8>> {
    let name = kind.file_name(&entry.name);
    let recorded = entry
        .file(&name)
        .ok_or_else(|| SatchelError::corrupt(format!("manifest lacks {name}")))?;

    if !storage.file_exists(&name) {
        return Err(SatchelError::corrupt(format!("missing segment file {name}")));
    }

    let data = read_file(storage, &name)?;
    if data.len() as u64 != recorded.size {
        return Err(SatchelError::corrupt(format!(
            "{name}: size {} does not match recorded {}",
            data.len(),
            recorded.size
        )));
    }

    if file_checksum(&data) != recorded.checksum {
        return Err(SatchelError::corrupt(format!("{name}: checksum mismatch")));
    }

    Ok(data)
}

fn frame_body<'a>(data: &'a [u8], entry: &SegmentEntry, kind: SegmentFile) -> Result<&'a [u8]> {
    verify_frame(data, kind.magic(), SEGMENT_VERSION, &kind.file_name(&entry.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::memory::MemoryStorage;

    fn sample_docs() -> Vec<Document> {
        vec![
            Document::builder("1")
                .title("Water purification tablets")
                .content("Drop one tablet per litre of water.")
                .build(),
            Document::builder("2")
                .title("Water filter pump")
                .category("water")
                .priority(2)
                .build(),
        ]
    }

    fn write_sample(storage: &MemoryStorage) -> SegmentEntry {
        let schema = Schema::new();
        SegmentBuilder::from_documents(&sample_docs(), &schema)
            .unwrap()
            .write(storage, "seg_000001")
            .unwrap()
    }

    #[test]
    fn test_write_and_open_segment() {
        let storage = MemoryStorage::new();
        let entry = write_sample(&storage);

        assert_eq!(entry.doc_count, 2);
        assert_eq!(entry.files.len(), 4);
        // Title slot: 3 + 3 tokens.
        assert_eq!(entry.field_length_totals[1], 6);

        let reader = SegmentReader::open(Arc::new(storage.clone()), &entry).unwrap();
        assert_eq!(reader.doc_count(), 2);
        assert_eq!(reader.ordinal("2"), Some(1));
        assert_eq!(reader.id(0), "1");
        assert_eq!(reader.lengths().priority(1), 2);

        let water = reader.postings("title:water").unwrap().unwrap();
        assert_eq!(water.len(), 2);

        let content = reader.postings("content:water").unwrap().unwrap();
        assert_eq!(content.postings[0].positions, vec![6]);

        assert!(reader.postings("title:missing").unwrap().is_none());
        assert_eq!(reader.document(1).unwrap(), sample_docs()[1]);
        assert!(reader.postings("category:water").unwrap().is_some());
    }

    #[test]
    fn test_detects_tampered_file() {
        let storage = MemoryStorage::new();
        let entry = write_sample(&storage);

        let name = SegmentFile::Postings.file_name("seg_000001");
        let mut data = read_file(&storage, &name).unwrap();
        let last = data.len() - 5;
        data[last] ^= 0x10;
        storage.put_file(&name, data);

        let err = SegmentReader::open(Arc::new(storage.clone()), &entry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptIndex);
    }

    #[test]
    fn test_detects_missing_file() {
        let storage = MemoryStorage::new();
        let entry = write_sample(&storage);
        storage
            .delete_file(&SegmentFile::Lengths.file_name("seg_000001"))
            .unwrap();

        let err = SegmentReader::open(Arc::new(storage.clone()), &entry).unwrap_err();
        assert!(err.to_string().contains("missing segment file"));
    }

    #[test]
    fn test_obsolete_segment_removed_on_drop() {
        let storage = MemoryStorage::new();
        let entry = write_sample(&storage);

        let reader = SegmentReader::open(Arc::new(storage.clone()), &entry).unwrap();
        reader.mark_obsolete();
        assert_eq!(storage.file_count(), 4);

        drop(reader);
        assert_eq!(storage.file_count(), 0);
    }

    #[test]
    fn test_segment_file_names() {
        assert!(is_segment_file("seg_000003.post"));
        assert!(!is_segment_file("seg_000003.tmp"));
        assert!(!is_segment_file("satchel.manifest"));
    }
}
