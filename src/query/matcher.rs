//! Evaluation of a [`QueryPlan`] against one segment.
//!
//! Every intermediate result is a list of `(ordinal, score)` sorted by
//! ordinal, so boolean operators are linear merge walks.

use crate::config::ScoringConfig;
use crate::index::lengths::LENGTH_SLOTS;
use crate::index::posting::Posting;
use crate::index::snapshot::{IndexSnapshot, SegmentView};
use crate::query::plan::QueryPlan;
use crate::query::scorer::{Bm25Scorer, TermStats};
use crate::schema::Field;

/// Matching documents of one segment with their scores, sorted by ordinal.
pub type ScoredDocs = Vec<(u32, f32)>;

/// Evaluates plans over a single segment of a snapshot.
#[derive(Debug)]
pub struct SegmentMatcher<'a> {
    segment: usize,
    view: &'a SegmentView,
    stats: &'a TermStats,
    scoring: &'a ScoringConfig,
    scorer: Bm25Scorer,
    avg_lengths: [f32; LENGTH_SLOTS],
}

impl<'a> SegmentMatcher<'a> {
    /// Matcher for the segment at index `segment` of `snapshot`.
    ///
    /// # Panics
    ///
    /// Panics if `segment` is out of range.
    pub fn new(
        snapshot: &'a IndexSnapshot,
        segment: usize,
        stats: &'a TermStats,
        scoring: &'a ScoringConfig,
    ) -> Self {
        SegmentMatcher {
            segment,
            view: &snapshot.segments()[segment],
            stats,
            scoring,
            scorer: Bm25Scorer::from_config(scoring),
            avg_lengths: std::array::from_fn(|slot| snapshot.avg_field_length(slot)),
        }
    }

    /// Live matches of `plan` with final scores, priority boost applied.
    pub fn matches(&self, plan: &QueryPlan) -> ScoredDocs {
        let lengths = self.view.reader().lengths();
        let mut docs = self.evaluate(plan);
        for (ordinal, score) in &mut docs {
            *score *= self.scoring.priority_multiplier(lengths.priority(*ordinal));
        }
        docs
    }

    fn evaluate(&self, plan: &QueryPlan) -> ScoredDocs {
        match plan {
            QueryPlan::Term { field, term } => self.term(*field, term),
            QueryPlan::Phrase { field, terms } => self.phrase(*field, terms),
            QueryPlan::Priority { op, value } => {
                let lengths = self.view.reader().lengths();
                self.view
                    .live_ordinals()
                    .filter(|&ordinal| op.matches(lengths.priority(ordinal), *value))
                    .map(|ordinal| (ordinal, 0.0))
                    .collect()
            }
            QueryPlan::And(children) => {
                let mut positives = Vec::new();
                let mut negatives = Vec::new();
                for child in children {
                    match child {
                        QueryPlan::Not(inner) => negatives.push(self.evaluate(inner)),
                        _ => positives.push(self.evaluate(child)),
                    }
                }

                let mut result = match positives.pop() {
                    Some(first) => positives
                        .into_iter()
                        .fold(first, |acc, docs| intersect(&acc, &docs)),
                    None => self.all(),
                };
                for excluded in &negatives {
                    result = difference(&result, excluded);
                }
                result
            }
            QueryPlan::Or(children) => children
                .iter()
                .map(|child| self.evaluate(child))
                .fold(Vec::new(), |acc, docs| union(&acc, &docs)),
            QueryPlan::Not(child) => difference(&self.all(), &self.evaluate(child)),
            QueryPlan::All => self.all(),
        }
    }

    fn all(&self) -> ScoredDocs {
        self.view.live_ordinals().map(|ordinal| (ordinal, 0.0)).collect()
    }

    fn term(&self, field: Field, term: &str) -> ScoredDocs {
        let key = field.term_key(term);
        let Some(list) = self.stats.postings(&key, self.segment) else {
            return Vec::new();
        };

        let idf = self.stats.idf(&key);
        list.iter()
            .filter(|posting| self.view.is_live(posting.ordinal))
            .map(|posting| {
                (posting.ordinal, self.field_score(field, idf, posting.ordinal, posting.frequency()))
            })
            .collect()
    }

    fn phrase(&self, field: Field, terms: &[String]) -> ScoredDocs {
        let keys: Vec<String> = terms.iter().map(|term| field.term_key(term)).collect();
        let mut lists = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.stats.postings(key, self.segment) {
                Some(list) => lists.push(list),
                None => return Vec::new(),
            }
        }
        let Some((first, rest)) = lists.split_first() else {
            return Vec::new();
        };

        let idf: f32 = keys.iter().map(|key| self.stats.idf(key)).sum();
        let mut cursors = vec![0usize; rest.len()];
        let mut docs = Vec::new();

        'candidates: for lead in first.iter() {
            if !self.view.is_live(lead.ordinal) {
                continue;
            }

            let mut aligned: Vec<&Posting> = Vec::with_capacity(lists.len());
            aligned.push(lead);
            for (list, cursor) in rest.iter().zip(cursors.iter_mut()) {
                let postings = &list.postings;
                while *cursor < postings.len() && postings[*cursor].ordinal < lead.ordinal {
                    *cursor += 1;
                }
                match postings.get(*cursor) {
                    Some(posting) if posting.ordinal == lead.ordinal => aligned.push(posting),
                    _ => continue 'candidates,
                }
            }

            let frequency = phrase_frequency(&aligned);
            if frequency > 0 {
                docs.push((lead.ordinal, self.field_score(field, idf, lead.ordinal, frequency)));
            }
        }

        docs
    }

    fn field_score(&self, field: Field, idf: f32, ordinal: u32, frequency: u32) -> f32 {
        let Some(slot) = field.slot() else {
            return 0.0;
        };
        let field_length = self.view.reader().lengths().field_length(ordinal, slot);
        self.scoring.field_boost(field)
            * self
                .scorer
                .score(idf, frequency, field_length, self.avg_lengths[slot])
    }
}

/// Number of positions where every posting's term follows the previous one.
fn phrase_frequency(aligned: &[&Posting]) -> u32 {
    let Some((lead, rest)) = aligned.split_first() else {
        return 0;
    };

    lead.positions
        .iter()
        .filter(|&&start| {
            rest.iter().enumerate().all(|(offset, posting)| {
                start
                    .checked_add(offset as u32 + 1)
                    .is_some_and(|expected| posting.positions.binary_search(&expected).is_ok())
            })
        })
        .count() as u32
}

/// Documents in both lists; scores add.
pub fn intersect(left: &[(u32, f32)], right: &[(u32, f32)]) -> ScoredDocs {
    let mut result = Vec::with_capacity(left.len().min(right.len()));
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (a, sa) = left[i];
        let (b, sb) = right[j];
        match a.cmp(&b) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                result.push((a, sa + sb));
                i += 1;
                j += 1;
            }
        }
    }
    result
}

/// Documents in either list; scores of shared documents add.
pub fn union(left: &[(u32, f32)], right: &[(u32, f32)]) -> ScoredDocs {
    let mut result = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (a, sa) = left[i];
        let (b, sb) = right[j];
        match a.cmp(&b) {
            std::cmp::Ordering::Less => {
                result.push((a, sa));
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                result.push((b, sb));
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                result.push((a, sa + sb));
                i += 1;
                j += 1;
            }
        }
    }
    result.extend_from_slice(&left[i..]);
    result.extend_from_slice(&right[j..]);
    result
}

/// Documents of `left` absent from `right`, keeping `left`'s scores.
pub fn difference(left: &[(u32, f32)], right: &[(u32, f32)]) -> ScoredDocs {
    let mut result = Vec::with_capacity(left.len());
    let mut j = 0;
    for &(ordinal, score) in left {
        while j < right.len() && right[j].0 < ordinal {
            j += 1;
        }
        if right.get(j).is_none_or(|&(other, _)| other != ordinal) {
            result.push((ordinal, score));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordinals(docs: &[(u32, f32)]) -> Vec<u32> {
        docs.iter().map(|(ordinal, _)| *ordinal).collect()
    }

    #[test]
    fn test_set_operations() {
        let a = vec![(1, 1.0), (3, 1.0), (5, 1.0)];
        let b = vec![(3, 2.0), (4, 2.0), (5, 2.0)];

        let both = intersect(&a, &b);
        assert_eq!(ordinals(&both), vec![3, 5]);
        assert_eq!(both[0].1, 3.0);

        let either = union(&a, &b);
        assert_eq!(ordinals(&either), vec![1, 3, 4, 5]);
        assert_eq!(either[1].1, 3.0);
        assert_eq!(either[2].1, 2.0);

        assert_eq!(ordinals(&difference(&a, &b)), vec![1]);
        assert_eq!(ordinals(&difference(&a, &[])), vec![1, 3, 5]);
        assert!(intersect(&a, &[]).is_empty());
    }

    #[test]
    fn test_phrase_frequency() {
        let water = Posting::new(0, vec![0, 4, 9]);
        let filter = Posting::new(0, vec![1, 7, 10]);
        assert_eq!(phrase_frequency(&[&water, &filter]), 2);
        assert_eq!(phrase_frequency(&[&filter, &water]), 0);

        let pump = Posting::new(0, vec![11]);
        assert_eq!(phrase_frequency(&[&water, &filter, &pump]), 1);
    }
}
