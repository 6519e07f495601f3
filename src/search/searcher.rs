//! Point-in-time search over a committed snapshot.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IndexConfig;
use crate::document::Document;
use crate::error::Result;
use crate::index::snapshot::IndexSnapshot;
use crate::query::collector::{RankedHit, TopDocsCollector};
use crate::query::highlight::snippet;
use crate::query::matcher::SegmentMatcher;
use crate::query::parser::QueryParser;
use crate::query::plan::QueryPlan;
use crate::query::scorer::TermStats;
use crate::schema::Schema;

/// A single ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub category: String,
    /// The stored summary, or a content snippet when that is empty.
    pub summary: String,
    pub priority: u8,
    pub score: f32,
}

/// One page of results plus the number of matching documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchResult>,
    pub total_hits: u64,
}

/// A consistent, read-only view of an index at one generation.
///
/// Commits after the searcher was acquired are invisible to it, and the
/// segment files it reads stay on disk until it is dropped.
#[derive(Debug, Clone)]
pub struct Searcher {
    snapshot: Arc<IndexSnapshot>,
    parser: QueryParser,
    config: Arc<IndexConfig>,
}

impl Searcher {
    pub fn new(snapshot: Arc<IndexSnapshot>, schema: Schema, config: Arc<IndexConfig>) -> Self {
        Searcher {
            snapshot,
            parser: QueryParser::new(schema),
            config,
        }
    }

    /// Parse and run a query, returning hits `offset..offset + limit`.
    pub fn search(&self, query: &str, limit: usize, offset: usize) -> Result<SearchResults> {
        let plan = self.parser.parse(query)?;
        debug!(query, plan = %plan, "parsed query");
        self.search_plan(&plan, limit, offset)
    }

    /// Run an already built plan.
    pub fn search_plan(&self, plan: &QueryPlan, limit: usize, offset: usize) -> Result<SearchResults> {
        plan.validate()?;

        let snapshot = &*self.snapshot;
        let scoring = &self.config.scoring;
        let stats = TermStats::collect(snapshot, plan)?;

        let capacity = if limit == 0 { 0 } else { offset.saturating_add(limit) };
        let mut collector = TopDocsCollector::new(capacity);

        for (index, segment) in snapshot.segments().iter().enumerate() {
            let matcher = SegmentMatcher::new(snapshot, index, &stats, scoring);
            for (ordinal, score) in matcher.matches(plan) {
                collector.collect(index, ordinal, segment.reader().id(ordinal), score);
            }
        }

        let total_hits = collector.total_hits();
        let terms = plan.highlight_terms();
        let hits = collector
            .into_sorted()
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|hit| self.materialize(hit, &terms))
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchResults { hits, total_hits })
    }

    fn materialize(&self, hit: RankedHit, terms: &[String]) -> Result<SearchResult> {
        let doc = self.snapshot.segments()[hit.segment]
            .reader()
            .document(hit.ordinal)?;

        let summary = if doc.summary.is_empty() {
            snippet(&doc.content, terms, self.config.snippet_chars)
        } else {
            doc.summary
        };

        Ok(SearchResult {
            id: doc.id,
            title: doc.title,
            category: doc.category,
            summary,
            priority: doc.priority,
            score: hit.score,
        })
    }

    /// Look up a visible document by id.
    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        match self.snapshot.find(id) {
            Some((segment, ordinal)) => self.snapshot.segments()[segment]
                .reader()
                .document(ordinal)
                .map(Some),
            None => Ok(None),
        }
    }

    /// Number of visible documents.
    pub fn num_docs(&self) -> u64 {
        self.snapshot.live_doc_count()
    }

    /// Generation of the snapshot this searcher reads.
    pub fn generation(&self) -> u64 {
        self.snapshot.generation()
    }

    pub fn snapshot(&self) -> &Arc<IndexSnapshot> {
        &self.snapshot
    }
}
