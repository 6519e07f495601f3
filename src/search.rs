//! Search sessions and multi-index search.

pub mod catalog;
pub mod searcher;

pub use self::catalog::{
    CatalogHit, CatalogSearchOptions, CatalogSearchResults, IndexCatalog, ModuleInfo, ModuleStats,
};
pub use self::searcher::{SearchResult, SearchResults, Searcher};
