//! Top-k collection of scored hits.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A hit located in a snapshot: segment index, ordinal, id and score.
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub segment: usize,
    pub ordinal: u32,
    pub id: String,
    pub score: f32,
}

impl RankedHit {
    /// Result ordering: higher score first, then ascending id.
    fn rank_cmp(score: f32, id: &str, other_score: f32, other_id: &str) -> Ordering {
        score
            .total_cmp(&other_score)
            .then_with(|| other_id.cmp(id))
    }
}

impl PartialEq for RankedHit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankedHit {}

impl PartialOrd for RankedHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedHit {
    /// Greater means ranked earlier.
    fn cmp(&self, other: &Self) -> Ordering {
        RankedHit::rank_cmp(self.score, &self.id, other.score, &other.id)
    }
}

/// A collector that keeps the best `capacity` hits.
///
/// Produces exactly the prefix a full sort of every hit would.
#[derive(Debug)]
pub struct TopDocsCollector {
    capacity: usize,
    /// Min-heap on rank: the worst kept hit is on top.
    hits: BinaryHeap<Reverse<RankedHit>>,
    total_hits: u64,
}

impl TopDocsCollector {
    pub fn new(capacity: usize) -> Self {
        TopDocsCollector {
            capacity,
            hits: BinaryHeap::with_capacity(capacity.min(1024)),
            total_hits: 0,
        }
    }

    /// Offer a hit. The id is copied only if the hit is kept.
    pub fn collect(&mut self, segment: usize, ordinal: u32, id: &str, score: f32) {
        self.total_hits += 1;
        if self.capacity == 0 {
            return;
        }

        if self.hits.len() == self.capacity {
            let Some(Reverse(worst)) = self.hits.peek() else {
                return;
            };
            if RankedHit::rank_cmp(score, id, worst.score, &worst.id) != Ordering::Greater {
                return;
            }
            self.hits.pop();
        }

        self.hits.push(Reverse(RankedHit {
            segment,
            ordinal,
            id: id.to_string(),
            score,
        }));
    }

    /// Number of hits offered, kept or not.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Kept hits, best first.
    pub fn into_sorted(self) -> Vec<RankedHit> {
        // Ascending order of Reverse is descending rank.
        self.hits
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(hit)| hit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(hits: &[RankedHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn test_keeps_best_and_breaks_ties_by_id() {
        let mut collector = TopDocsCollector::new(3);
        collector.collect(0, 0, "d", 1.0);
        collector.collect(0, 1, "b", 2.0);
        collector.collect(0, 2, "c", 2.0);
        collector.collect(1, 0, "a", 0.5);
        collector.collect(1, 1, "e", 3.0);
        collector.collect(1, 2, "a2", 2.0);

        assert_eq!(collector.total_hits(), 6);
        assert_eq!(ids(&collector.into_sorted()), vec!["e", "a2", "b"]);
    }

    #[test]
    fn test_matches_full_sort() {
        let scores = [0.3, 1.7, 0.3, 2.2, 0.9, 1.7, 0.0, 2.2, 0.3];
        let mut all: Vec<(String, f32)> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("doc{i}"), *s))
            .collect();
        all.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for k in 0..=scores.len() + 1 {
            let mut collector = TopDocsCollector::new(k);
            for (i, (id, score)) in all.iter().rev().enumerate() {
                collector.collect(0, i as u32, id, *score);
            }
            let expected: Vec<&str> = all.iter().take(k).map(|(id, _)| id.as_str()).collect();
            assert_eq!(ids(&collector.into_sorted()), expected, "k = {k}");
        }
    }
}
