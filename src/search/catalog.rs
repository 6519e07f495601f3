//! Multi-module search: several named indexes queried as one.
//!
//! Each module is searched on a small rayon pool, its scores are scaled by
//! the module weight, and the merged hits are deduplicated by document id.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::error::{Result, SatchelError};
use crate::index::{Index, IndexStats};
use crate::search::searcher::{SearchResult, SearchResults};

/// Upper bound on catalog search threads on device.
const MAX_CATALOG_THREADS: usize = 4;

/// Options of a catalog search.
#[derive(Debug, Clone)]
pub struct CatalogSearchOptions {
    /// Maximum hits returned after merging.
    pub limit: usize,
    /// Modules to search; all loaded modules when `None`.
    pub modules: Option<Vec<String>>,
}

impl Default for CatalogSearchOptions {
    fn default() -> Self {
        CatalogSearchOptions {
            limit: 10,
            modules: None,
        }
    }
}

impl CatalogSearchOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }
}

/// A hit and the module it came from. `result.score` is weighted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogHit {
    pub module: String,
    #[serde(flatten)]
    pub result: SearchResult,
}

/// Per-module statistics of one catalog search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleStats {
    pub module: String,
    pub total_hits: u64,
    pub returned: usize,
    pub generation: u64,
    pub elapsed_ms: u64,
}

/// Merged hits of a catalog search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSearchResults {
    pub hits: Vec<CatalogHit>,
    pub modules: Vec<ModuleStats>,
}

/// On-demand statistics of one loaded module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleInfo {
    pub module: String,
    pub weight: f32,
    #[serde(flatten)]
    pub stats: IndexStats,
}

#[derive(Debug)]
struct Module {
    index: Arc<Index>,
    weight: f32,
}

/// A set of named indexes searched together.
#[derive(Debug)]
pub struct IndexCatalog {
    modules: RwLock<BTreeMap<String, Module>>,
    thread_pool: ThreadPool,
}

impl IndexCatalog {
    /// Create an empty catalog with a pool of `min(cpus, 4)` threads.
    pub fn new() -> Result<Self> {
        Self::with_threads(num_cpus::get().min(MAX_CATALOG_THREADS))
    }

    pub fn with_threads(threads: usize) -> Result<Self> {
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("satchel-catalog-{i}"))
            .build()
            .map_err(|e| SatchelError::unknown(format!("failed to create thread pool: {e}")))?;

        Ok(IndexCatalog {
            modules: RwLock::new(BTreeMap::new()),
            thread_pool,
        })
    }

    /// Open the index at `path` and register it as `name`.
    pub fn load<P: AsRef<Path>>(&self, name: &str, path: P, weight: f32) -> Result<()> {
        self.load_with_config(name, path, weight, IndexConfig::default())
    }

    pub fn load_with_config<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
        weight: f32,
        config: IndexConfig,
    ) -> Result<()> {
        check_weight(weight)?;
        let index = Index::open_or_create_with_config(path, config)?;
        self.insert(name, Arc::new(index), weight);
        Ok(())
    }

    /// Register an already open index as `name`, replacing any module of
    /// that name.
    pub fn load_index(&self, name: &str, index: Arc<Index>, weight: f32) -> Result<()> {
        check_weight(weight)?;
        self.insert(name, index, weight);
        Ok(())
    }

    fn insert(&self, name: &str, index: Arc<Index>, weight: f32) {
        let generation = index.generation();
        let replaced = self
            .modules
            .write()
            .insert(name.to_string(), Module { index, weight })
            .is_some();
        info!(module = name, weight, generation, replaced, "loaded catalog module");
    }

    /// Remove a module. Searches already running keep their snapshot.
    pub fn unload(&self, name: &str) -> Result<Arc<Index>> {
        let module = self
            .modules
            .write()
            .remove(name)
            .ok_or_else(|| unknown_module(name))?;
        info!(module = name, "unloaded catalog module");
        Ok(module.index)
    }

    /// Pick up index files replaced on disk for a module, keeping the same
    /// open [`Index`]. Returns the module's visible generation.
    pub fn reload(&self, name: &str) -> Result<u64> {
        let index = self.get(name).ok_or_else(|| unknown_module(name))?;
        let generation = index.reload()?;
        info!(module = name, generation, "reloaded catalog module");
        Ok(generation)
    }

    /// Statistics and weight of every loaded module, sorted by name.
    pub fn stats(&self) -> Vec<ModuleInfo> {
        self.modules
            .read()
            .iter()
            .map(|(name, m)| ModuleInfo {
                module: name.clone(),
                weight: m.weight,
                stats: m.index.stats(),
            })
            .collect()
    }

    /// Names of loaded modules, sorted.
    pub fn modules(&self) -> Vec<String> {
        self.modules.read().keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Index>> {
        self.modules.read().get(name).map(|m| Arc::clone(&m.index))
    }

    /// Search the selected modules in parallel and merge their hits.
    ///
    /// A parse error in any module fails the whole search.
    pub fn search(&self, query: &str, options: &CatalogSearchOptions) -> Result<CatalogSearchResults> {
        let selected = self.select(options.modules.as_deref())?;
        let limit = options.limit;

        let per_module: Vec<(String, f32, SearchResults, u64, u64)> = self.thread_pool.install(|| {
            selected
                .par_iter()
                .map(|(name, index, weight)| {
                    let started = Instant::now();
                    let searcher = index.searcher();
                    let results = searcher.search(query, limit, 0)?;
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    Ok((name.clone(), *weight, results, searcher.generation(), elapsed_ms))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut best: AHashMap<String, CatalogHit> = AHashMap::new();
        let mut stats = Vec::with_capacity(per_module.len());

        for (module, weight, results, generation, elapsed_ms) in per_module {
            stats.push(ModuleStats {
                module: module.clone(),
                total_hits: results.total_hits,
                returned: results.hits.len(),
                generation,
                elapsed_ms,
            });

            for mut result in results.hits {
                result.score *= weight;
                let keep = best
                    .get(&result.id)
                    .is_none_or(|existing| result.score > existing.result.score);
                if keep {
                    best.insert(
                        result.id.clone(),
                        CatalogHit {
                            module: module.clone(),
                            result,
                        },
                    );
                }
            }
        }

        let mut hits: Vec<CatalogHit> = best.into_values().collect();
        hits.sort_by(|a, b| {
            b.result
                .score
                .total_cmp(&a.result.score)
                .then_with(|| a.result.id.cmp(&b.result.id))
        });
        hits.truncate(limit);

        debug!(query, modules = stats.len(), hits = hits.len(), "catalog search");
        Ok(CatalogSearchResults { hits, modules: stats })
    }

    fn select(&self, names: Option<&[String]>) -> Result<Vec<(String, Arc<Index>, f32)>> {
        let modules = self.modules.read();
        match names {
            None => Ok(modules
                .iter()
                .map(|(name, m)| (name.clone(), Arc::clone(&m.index), m.weight))
                .collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    modules
                        .get(name)
                        .map(|m| (name.clone(), Arc::clone(&m.index), m.weight))
                        .ok_or_else(|| unknown_module(name))
                })
                .collect(),
        }
    }
}

fn check_weight(weight: f32) -> Result<()> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(SatchelError::invalid_config(format!(
            "module weight must be finite and non-negative, got {weight}"
        )))
    }
}

fn unknown_module(name: &str) -> SatchelError {
    SatchelError::invalid_config(format!("unknown module '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::error::ErrorKind;
    use crate::storage::memory::MemoryStorage;

    fn module(docs: &[(&str, &str)]) -> Arc<Index> {
        let index =
            Index::open_with_storage(Arc::new(MemoryStorage::new()), IndexConfig::default()).unwrap();
        for (id, content) in docs {
            index
                .add(Document::builder(*id).content(*content).build())
                .unwrap();
        }
        index.commit().unwrap();
        Arc::new(index)
    }

    #[test]
    fn test_weighted_merge_and_dedup() {
        let catalog = IndexCatalog::with_threads(2).unwrap();
        catalog
            .load_index("guides", module(&[("shared", "knot tying"), ("g1", "knot basics")]), 1.0)
            .unwrap();
        catalog
            .load_index("gear", module(&[("shared", "knot tying"), ("r1", "rope and knot")]), 2.0)
            .unwrap();
        assert_eq!(catalog.modules(), vec!["gear", "guides"]);

        let results = catalog
            .search("knot", &CatalogSearchOptions::default())
            .unwrap();
        let ids: Vec<&str> = results.hits.iter().map(|h| h.result.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        let shared = results.hits.iter().find(|h| h.result.id == "shared").unwrap();
        assert_eq!(shared.module, "gear");
        assert_eq!(results.modules.len(), 2);
        assert!(results.modules.iter().all(|m| m.total_hits == 2));

        let only = catalog
            .search("knot", &CatalogSearchOptions::default().with_modules(["guides"]).with_limit(1))
            .unwrap();
        assert_eq!(only.hits.len(), 1);
        assert_eq!(only.modules.len(), 1);

        let info = catalog.stats();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].module, "gear");
        assert_eq!(info[0].weight, 2.0);
        assert_eq!(info[0].stats.doc_count, 2);
        assert_eq!(info[1].stats.generation, 1);
    }

    #[test]
    fn test_errors() {
        let catalog = IndexCatalog::with_threads(1).unwrap();
        catalog.load_index("a", module(&[("1", "tent")]), 1.0).unwrap();

        let err = catalog
            .search("tent", &CatalogSearchOptions::default().with_modules(["missing"]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let err = catalog.search("tent AND", &CatalogSearchOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryParse);

        assert!(catalog.load_index("b", module(&[]), f32::NAN).is_err());
        assert_eq!(catalog.reload("a").unwrap(), 1);
        assert_eq!(catalog.reload("missing").unwrap_err().kind(), ErrorKind::InvalidConfig);

        catalog.unload("a").unwrap();
        assert!(catalog.modules().is_empty());
        assert!(catalog.unload("a").is_err());
    }
}
