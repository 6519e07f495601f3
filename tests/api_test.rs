//! The handle-based binding surface, end to end.

use satchel::api::{self, ErrorCode};
use satchel::document::RawDocument;
use tempfile::TempDir;

fn raw(id: &str, title: &str, content: &str, priority: u32) -> RawDocument {
    RawDocument {
        id: id.as_bytes().to_vec(),
        title: title.as_bytes().to_vec(),
        category: b"Water".to_vec(),
        priority,
        summary: Vec::new(),
        content: content.as_bytes().to_vec(),
    }
}

#[test]
fn test_handle_lifecycle() {
    let dir = TempDir::new().unwrap();
    let handle = api::open_or_create(dir.path()).unwrap();
    assert!(api::is_healthy(handle));
    assert_eq!(api::stats(handle).unwrap().0, 0);

    assert_eq!(
        api::add_document(handle, raw("w1", "Boiling water", "Boil water for one minute.", 1)),
        ErrorCode::Ok
    );
    assert_eq!(
        api::add_document(handle, raw("w2", "Filters", "A ceramic filter removes bacteria.", 0)),
        ErrorCode::Ok
    );

    // Staged documents are not visible until commit.
    assert_eq!(api::search(handle, "water", 10, 0).unwrap().total_hits, 0);
    assert_eq!(api::commit(handle), ErrorCode::Ok);

    let results = api::search(handle, "water", 10, 0).unwrap();
    assert_eq!(results.total_hits, 1);
    assert_eq!(results.hits[0].id, "w1");
    assert_eq!(results.hits[0].priority, 1);

    let json = api::search_json(handle, "filter OR water", 10, 0).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["total_hits"], 2);
    assert_eq!(value["hits"].as_array().unwrap().len(), 2);

    let document = api::get_document(handle, "w2").unwrap().unwrap();
    assert_eq!(document.title, "Filters");
    assert_eq!(document.category, "Water");
    assert!(api::get_document(handle, "missing").unwrap().is_none());
    assert_eq!(api::reload(handle).unwrap(), 1);

    let (doc_count, size_bytes) = api::stats(handle).unwrap();
    assert_eq!(doc_count, 2);
    assert!(size_bytes > 0);

    assert_eq!(api::close(handle), ErrorCode::Ok);
    assert!(!api::is_healthy(handle));
    assert_eq!(api::commit(handle), ErrorCode::InvalidHandle);
    assert_eq!(api::get_document(handle, "w1").unwrap_err().code, ErrorCode::InvalidHandle);
    assert_eq!(api::reload(handle).unwrap_err().code, ErrorCode::InvalidHandle);
    assert_eq!(api::close(handle), ErrorCode::InvalidHandle);

    // The data outlives the handle.
    let handle = api::open_or_create(dir.path()).unwrap();
    assert_eq!(api::stats(handle).unwrap().0, 2);
    assert_eq!(api::close(handle), ErrorCode::Ok);
}

#[test]
fn test_rejected_documents() {
    let dir = TempDir::new().unwrap();
    let handle = api::open_or_create(dir.path()).unwrap();

    let mut bad_utf8 = raw("w1", "Title", "content", 0);
    bad_utf8.content = vec![0x66, 0xff, 0xfe];
    assert_eq!(api::add_document(handle, bad_utf8), ErrorCode::InvalidDocument);

    assert_eq!(api::add_document(handle, raw("", "Title", "content", 0)), ErrorCode::InvalidDocument);
    assert_eq!(api::add_document(handle, raw("w2", "Title", "content", 256)), ErrorCode::InvalidDocument);

    assert_eq!(api::add_document(handle, raw("w3", "Title", "content", 0)), ErrorCode::Ok);
    assert_eq!(api::add_document(handle, raw("w3", "Again", "content", 0)), ErrorCode::InvalidDocument);

    assert_eq!(api::commit(handle), ErrorCode::Ok);
    assert_eq!(api::stats(handle).unwrap().0, 1);
    assert_eq!(api::close(handle), ErrorCode::Ok);
}

#[test]
fn test_query_errors_map_to_codes() {
    let dir = TempDir::new().unwrap();
    let handle = api::open_or_create(dir.path()).unwrap();

    let err = api::search(handle, "water \"pump", 10, 0).unwrap_err();
    assert_eq!(err.code, ErrorCode::QueryParse);
    assert!(err.message.contains("position 6"));

    let err = api::search_json(handle, "(water", 10, 0).unwrap_err();
    assert_eq!(err.code, ErrorCode::QueryParse);

    // Deeply nested input is rejected instead of exhausting the stack.
    for depth in [2_000, 100_000] {
        let query = format!("{}water{}", "(".repeat(depth), ")".repeat(depth));
        let err = api::search(handle, &query, 10, 0).unwrap_err();
        assert_eq!(err.code, ErrorCode::QueryParse);
        assert!(err.message.contains("nested too deeply"));
    }
    let err = api::search(handle, &"NOT ".repeat(20_000), 10, 0).unwrap_err();
    assert_eq!(err.code, ErrorCode::QueryParse);

    assert_eq!(api::close(handle), ErrorCode::Ok);
}

#[test]
fn test_directory_has_one_owner() {
    let dir = TempDir::new().unwrap();
    let handle = api::open_or_create(dir.path()).unwrap();

    let err = api::open_or_create(dir.path()).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidPath);

    assert_eq!(api::close(handle), ErrorCode::Ok);
    let handle = api::open_or_create(dir.path()).unwrap();
    assert_eq!(api::close(handle), ErrorCode::Ok);
}

#[test]
fn test_unusable_path() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let err = api::open_or_create(file.path()).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidPath);
}
