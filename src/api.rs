//! The capability surface exposed to platform bindings.
//!
//! Indexes are addressed by stable integer [`IndexHandle`]s into a
//! process-wide handle table, never by address. Every failure is reduced to
//! an [`ErrorCode`] plus a message, and panics are caught here so that no
//! call unwinds into foreign code.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error};

use crate::document::{Document, RawDocument};
use crate::error::{ErrorKind, SatchelError};
use crate::index::Index;
use crate::search::searcher::SearchResults;

/// Fixed error codes of the binding surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    InvalidPath = 1,
    CorruptIndex = 2,
    QueryParse = 3,
    OutOfMemory = 4,
    InvalidDocument = 5,
    Io = 6,
    InvalidHandle = 7,
    Unknown = 8,
}

impl ErrorCode {
    /// The numeric value passed across the binding boundary.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidPath => ErrorCode::InvalidPath,
            ErrorKind::CorruptIndex => ErrorCode::CorruptIndex,
            ErrorKind::InvalidDocument => ErrorCode::InvalidDocument,
            ErrorKind::QueryParse => ErrorCode::QueryParse,
            ErrorKind::Io => ErrorCode::Io,
            ErrorKind::OutOfMemory => ErrorCode::OutOfMemory,
            ErrorKind::InvalidConfig | ErrorKind::Unknown => ErrorCode::Unknown,
        }
    }
}

/// Static description of an error code.
pub fn error_message(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Ok => "success",
        ErrorCode::InvalidPath => "index path is not a usable directory",
        ErrorCode::CorruptIndex => "index files failed validation",
        ErrorCode::QueryParse => "query could not be parsed",
        ErrorCode::OutOfMemory => "memory budget exceeded",
        ErrorCode::InvalidDocument => "document failed validation",
        ErrorCode::Io => "I/O error",
        ErrorCode::InvalidHandle => "unknown or closed index handle",
        ErrorCode::Unknown => "unknown error",
    }
}

/// An error code with the detailed message of the failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    fn invalid_handle(handle: IndexHandle) -> Self {
        ApiError::new(ErrorCode::InvalidHandle, format!("no open index for handle {}", handle.0))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<SatchelError> for ApiError {
    fn from(err: SatchelError) -> Self {
        ApiError::new(ErrorCode::from(err.kind()), err.to_string())
    }
}

/// Identifier of an open index. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IndexHandle(pub u64);

/// Owned table of open indexes.
#[derive(Debug)]
pub struct HandleTable {
    indexes: RwLock<AHashMap<u64, Arc<Index>>>,
    next: AtomicU64,
}

impl Default for HandleTable {
    fn default() -> Self {
        HandleTable {
            indexes: RwLock::new(AHashMap::new()),
            next: AtomicU64::new(1),
        }
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, index: Index) -> IndexHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.indexes.write().insert(id, Arc::new(index));
        IndexHandle(id)
    }

    pub fn get(&self, handle: IndexHandle) -> Result<Arc<Index>, ApiError> {
        self.indexes
            .read()
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| ApiError::invalid_handle(handle))
    }

    pub fn remove(&self, handle: IndexHandle) -> Result<Arc<Index>, ApiError> {
        self.indexes
            .write()
            .remove(&handle.0)
            .ok_or_else(|| ApiError::invalid_handle(handle))
    }

    pub fn len(&self) -> usize {
        self.indexes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static HANDLES: LazyLock<HandleTable> = LazyLock::new(HandleTable::new);

/// Run `f`, converting a panic into `ErrorCode::Unknown`.
fn guarded<T>(operation: &str, f: impl FnOnce() -> Result<T, ApiError>) -> Result<T, ApiError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(operation, panic = %detail, "panic caught at API boundary");
            Err(ApiError::new(ErrorCode::Unknown, format!("{operation} panicked: {detail}")))
        }
    }
}

fn to_code(result: Result<(), ApiError>) -> ErrorCode {
    match result {
        Ok(()) => ErrorCode::Ok,
        Err(err) => {
            debug!(code = ?err.code, message = %err.message, "api call failed");
            err.code
        }
    }
}

/// Open or create the index at `path`.
pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<IndexHandle, ApiError> {
    guarded("open_or_create", || {
        let index = Index::open_or_create(path)?;
        Ok(HANDLES.insert(index))
    })
}

/// Stage a document for the next commit.
pub fn add_document(handle: IndexHandle, document: RawDocument) -> ErrorCode {
    to_code(guarded("add_document", || {
        HANDLES.get(handle)?.add_raw(document)?;
        Ok(())
    }))
}

/// Commit staged documents.
pub fn commit(handle: IndexHandle) -> ErrorCode {
    to_code(guarded("commit", || {
        HANDLES.get(handle)?.commit()?;
        Ok(())
    }))
}

/// Run a query on the current committed snapshot.
pub fn search(
    handle: IndexHandle,
    query: &str,
    limit: usize,
    offset: usize,
) -> Result<SearchResults, ApiError> {
    guarded("search", || {
        Ok(HANDLES.get(handle)?.searcher().search(query, limit, offset)?)
    })
}

/// [`search`], serialized as JSON.
pub fn search_json(
    handle: IndexHandle,
    query: &str,
    limit: usize,
    offset: usize,
) -> Result<String, ApiError> {
    let results = search(handle, query, limit, offset)?;
    serde_json::to_string(&results).map_err(|e| ApiError::new(ErrorCode::Unknown, e.to_string()))
}

/// Look up a committed document by id.
pub fn get_document(handle: IndexHandle, id: &str) -> Result<Option<Document>, ApiError> {
    guarded("get_document", || {
        Ok(HANDLES.get(handle)?.searcher().get_document(id)?)
    })
}

/// Pick up index files replaced on disk, returning the visible generation.
pub fn reload(handle: IndexHandle) -> Result<u64, ApiError> {
    guarded("reload", || Ok(HANDLES.get(handle)?.reload()?))
}

/// Document count and approximate size in bytes.
pub fn stats(handle: IndexHandle) -> Result<(u64, u64), ApiError> {
    guarded("stats", || {
        let stats = HANDLES.get(handle)?.stats();
        Ok((stats.doc_count, stats.size_bytes))
    })
}

/// Cheap health check. An unknown handle is unhealthy.
pub fn is_healthy(handle: IndexHandle) -> bool {
    guarded("is_healthy", || Ok(HANDLES.get(handle)?.is_healthy())).unwrap_or(false)
}

/// Close an index and invalidate its handle.
///
/// Searchers already handed out keep their snapshot alive.
pub fn close(handle: IndexHandle) -> ErrorCode {
    to_code(guarded("close", || {
        let index = HANDLES.remove(handle)?;
        match Arc::try_unwrap(index) {
            Ok(index) => index.close()?,
            Err(_) => debug!(handle = handle.0, "index still in use by a running call"),
        }
        Ok(())
    }))
}
