//! In-memory BM25 [`SearchIndex`].
//!
//! A plain inverted index over lower-cased alphanumeric terms. Scoring is
//! Okapi BM25 with the non-negative idf variant, so every matching term
//! contributes a positive amount.

use std::collections::HashMap;

use super::{tokenize, SearchIndex};

const K1: f64 = 1.2;
const B: f64 = 0.75;

struct Entry {
    id: String,
    len: usize,
}

/// In-memory BM25 engine.
#[derive(Default)]
pub struct Bm25Index {
    entries: Vec<Entry>,
    /// term -> (entry index, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    total_len: usize,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    fn avg_len(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.total_len as f64 / self.entries.len() as f64
        }
    }

    fn idf(&self, doc_freq: usize) -> f64 {
        let n = self.entries.len() as f64;
        let df = doc_freq as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

impl SearchIndex for Bm25Index {
    fn index(&mut self, id: &str, text: &str) {
        let terms = tokenize(text);
        let slot = self.entries.len();
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for term in &terms {
            *freqs.entry(term.clone()).or_insert(0) += 1;
        }
        for (term, tf) in freqs {
            self.postings.entry(term).or_default().push((slot, tf));
        }
        self.total_len += terms.len();
        self.entries.push(Entry {
            id: id.to_string(),
            len: terms.len(),
        });
    }

    fn search(&self, query: &str, limit: usize) -> Vec<(String, f64)> {
        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();
        if terms.is_empty() || self.entries.is_empty() || limit == 0 {
            return Vec::new();
        }

        let avg_len = self.avg_len().max(1.0);
        let mut scores: HashMap<usize, f64> = HashMap::new();
        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(postings.len());
            for &(slot, tf) in postings {
                let tf = tf as f64;
                let len_norm = 1.0 - B + B * self.entries[slot].len as f64 / avg_len;
                let score = idf * tf * (K1 + 1.0) / (tf + K1 * len_norm);
                *scores.entry(slot).or_insert(0.0) += score;
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(limit);
        ranked
            .into_iter()
            .map(|(slot, score)| (self.entries[slot].id.clone(), score))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bm25Index {
        let mut index = Bm25Index::new();
        index.index("c0", "Value added tax is charged at 7.5 percent on taxable supplies.");
        index.index("c1", "Companies income tax applies to the profits of companies.");
        index.index("c2", "Penalties for late filing of returns.");
        index
    }

    #[test]
    fn test_empty_index_and_query() {
        let index = Bm25Index::new();
        assert!(index.is_empty());
        assert!(index.search("tax", 5).is_empty());
        assert!(sample().search("   ", 5).is_empty());
    }

    #[test]
    fn test_ranks_best_match_first() {
        let hits = sample().search("companies profits", 5);
        assert_eq!(hits[0].0, "c1");
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_case_insensitive() {
        let hits = sample().search("PENALTIES", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "c2");
    }

    #[test]
    fn test_common_term_matches_all_containing_entries() {
        let hits = sample().search("tax", 5);
        let ids: Vec<&str> = hits.iter().map(|h| h.0.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"c0") && ids.contains(&"c1"));
        for (_, score) in &hits {
            assert!(*score > 0.0);
        }
    }

    #[test]
    fn test_limit_and_descending_scores() {
        let mut index = Bm25Index::new();
        for i in 0..10 {
            index.index(&format!("c{}", i), &"relief ".repeat(i + 1));
        }
        let hits = index.search("relief", 3);
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_no_match() {
        assert!(sample().search("cryptocurrency", 5).is_empty());
    }
}
