//! Catalog search over indexes loaded from disk.

use std::fs;

use satchel::document::Document;
use satchel::error::ErrorKind;
use satchel::index::Index;
use satchel::search::{CatalogSearchOptions, IndexCatalog};
use tempfile::TempDir;

fn build(dir: &TempDir, docs: &[(&str, &str, &str)]) {
    let index = Index::open_or_create(dir.path()).unwrap();
    for (id, title, content) in docs {
        index
            .add(Document::builder(*id).title(*title).content(*content).build())
            .unwrap();
    }
    index.commit().unwrap();
    index.close().unwrap();
}

#[test]
fn test_load_search_and_reload() {
    let medical = TempDir::new().unwrap();
    let water = TempDir::new().unwrap();
    build(&medical, &[("m1", "Burns", "Cool a burn with clean water.")]);
    build(
        &water,
        &[
            ("w1", "Boiling", "Boil water to purify it."),
            ("w2", "Storage", "Store water in sealed containers."),
        ],
    );

    let catalog = IndexCatalog::with_threads(2).unwrap();
    catalog.load("medical", medical.path(), 1.0).unwrap();
    catalog.load("water", water.path(), 2.0).unwrap();
    assert_eq!(catalog.modules(), vec!["medical", "water"]);

    let results = catalog.search("water", &CatalogSearchOptions::default()).unwrap();
    assert_eq!(results.hits.len(), 3);
    assert_eq!(results.modules.len(), 2);
    assert!(results.hits.iter().take(2).all(|h| h.module == "water"));

    let only_medical = CatalogSearchOptions::default().with_modules(["medical"]);
    let results = catalog.search("water", &only_medical).unwrap();
    assert_eq!(results.hits.len(), 1);
    assert_eq!(results.hits[0].result.id, "m1");

    // A loaded module's directory cannot be opened a second time.
    let err = Index::open_or_create(medical.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);
    let err = catalog.load("medical-again", medical.path(), 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);

    // Install an updated content pack over the medical directory.
    let update = TempDir::new().unwrap();
    build(
        &update,
        &[
            ("m1", "Burns", "Cool a burn with clean water."),
            ("m2", "Dehydration", "Sip water slowly."),
        ],
    );
    build(&update, &[("m3", "Splints", "Immobilize the limb.")]);
    for entry in fs::read_dir(update.path()).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap();
        if name != "satchel.lock" {
            fs::copy(&path, medical.path().join(name)).unwrap();
        }
    }

    let results = catalog.search("dehydration", &only_medical).unwrap();
    assert!(results.hits.is_empty());

    let generation = catalog.reload("medical").unwrap();
    assert_eq!(generation, 2);
    let results = catalog.search("dehydration", &only_medical).unwrap();
    assert_eq!(results.hits.len(), 1);
    assert_eq!(results.hits[0].result.id, "m2");

    let info = catalog.stats();
    assert_eq!(info[0].module, "medical");
    assert_eq!(info[0].stats.doc_count, 3);
    assert_eq!(info[1].weight, 2.0);

    catalog.unload("water").unwrap();
    let err = catalog.search("water", &CatalogSearchOptions::default().with_modules(["water"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[test]
fn test_parse_error_fails_whole_search() {
    let dir = TempDir::new().unwrap();
    build(&dir, &[("a", "Alpha", "alpha")]);

    let catalog = IndexCatalog::with_threads(1).unwrap();
    catalog.load("a", dir.path(), 1.0).unwrap();
    let err = catalog.search("alpha AND", &CatalogSearchOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryParse);
}
