//! BM25 scoring and the collection statistics it needs.

use ahash::AHashMap;

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::index::posting::PostingList;
use crate::index::snapshot::IndexSnapshot;
use crate::query::plan::QueryPlan;

/// BM25 scorer implementation.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Scorer {
    /// BM25 k1 parameter.
    k1: f32,
    /// BM25 b parameter.
    b: f32,
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Bm25Scorer { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Scorer {
    pub fn new(k1: f32, b: f32) -> Self {
        Bm25Scorer { k1, b }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Bm25Scorer::new(config.k1, config.b)
    }

    /// Inverse document frequency, `ln(1 + (N - df + 0.5) / (df + 0.5))`.
    ///
    /// Always positive, so a term present in every document still counts.
    pub fn idf(doc_count: u64, doc_freq: u64) -> f32 {
        if doc_freq == 0 || doc_count == 0 {
            return 0.0;
        }
        let n = doc_count as f32;
        let df = doc_freq.min(doc_count) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Score of a term (or phrase) with frequency `term_freq` in a field of
    /// `field_length` tokens.
    pub fn score(&self, idf: f32, term_freq: u32, field_length: u32, avg_field_length: f32) -> f32 {
        if term_freq == 0 {
            return 0.0;
        }

        let tf = term_freq as f32;
        let norm = if avg_field_length > 0.0 {
            1.0 - self.b + self.b * (field_length as f32 / avg_field_length)
        } else {
            1.0
        };

        idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm)
    }
}

/// Postings and document frequencies of every term a plan reads, gathered
/// once per search across all segments of a snapshot.
#[derive(Debug, Default)]
pub struct TermStats {
    postings: AHashMap<String, Vec<Option<PostingList>>>,
    doc_freqs: AHashMap<String, u64>,
    doc_count: u64,
}

impl TermStats {
    /// Decode the postings of every term in `plan`.
    ///
    /// Document frequencies count only live documents, so tombstoned copies
    /// do not skew idf.
    pub fn collect(snapshot: &IndexSnapshot, plan: &QueryPlan) -> Result<Self> {
        let mut stats = TermStats {
            doc_count: snapshot.live_doc_count(),
            ..Default::default()
        };

        for key in plan.term_keys() {
            let mut per_segment = Vec::with_capacity(snapshot.segments().len());
            let mut doc_freq = 0u64;

            for segment in snapshot.segments() {
                let list = segment.reader().postings(&key)?;
                if let Some(list) = &list {
                    doc_freq += list.iter().filter(|p| segment.is_live(p.ordinal)).count() as u64;
                }
                per_segment.push(list);
            }

            stats.doc_freqs.insert(key.clone(), doc_freq);
            stats.postings.insert(key, per_segment);
        }

        Ok(stats)
    }

    /// Postings of `key` in the segment at `segment`.
    pub fn postings(&self, key: &str, segment: usize) -> Option<&PostingList> {
        self.postings.get(key)?.get(segment)?.as_ref()
    }

    /// Live documents containing `key`.
    pub fn doc_freq(&self, key: &str) -> u64 {
        self.doc_freqs.get(key).copied().unwrap_or(0)
    }

    /// Visible documents in the snapshot.
    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }

    pub fn idf(&self, key: &str) -> f32 {
        Bm25Scorer::idf(self.doc_count, self.doc_freq(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_is_positive() {
        assert!(Bm25Scorer::idf(10, 10) > 0.0);
        assert!(Bm25Scorer::idf(10, 1) > Bm25Scorer::idf(10, 5));
        assert_eq!(Bm25Scorer::idf(10, 0), 0.0);
        assert_eq!(Bm25Scorer::idf(0, 0), 0.0);
    }

    #[test]
    fn test_score_behaviour() {
        let scorer = Bm25Scorer::default();
        let idf = Bm25Scorer::idf(100, 10);

        assert_eq!(scorer.score(idf, 0, 10, 10.0), 0.0);
        // Higher frequency scores higher, with saturation.
        let one = scorer.score(idf, 1, 10, 10.0);
        let two = scorer.score(idf, 2, 10, 10.0);
        assert!(two > one);
        assert!(two < 2.0 * one);
        // Shorter fields score higher.
        assert!(scorer.score(idf, 1, 5, 10.0) > scorer.score(idf, 1, 20, 10.0));
        // An empty collection average falls back to no normalization.
        assert!(scorer.score(idf, 1, 0, 0.0) > 0.0);
    }
}
