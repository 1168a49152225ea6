// File: src/core/context.rs
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// Marker used as the previous tag at the start of a message.
pub const MESSAGE_START: &str = "<s>";

/// Tag transition counts within messages, used to pick a tag from context.
#[derive(Debug, Clone, Default)]
pub struct ContextModel {
    /// Maps prev_tag -> (tag -> frequency)
    bigrams: HashMap<String, BTreeMap<String, u64>>,
}

impl ContextModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `tag` followed `prev` once. O(1) amortized.
    pub fn add_transition(&mut self, prev: &str, tag: &str) {
        *self
            .bigrams
            .entry(prev.to_string())
            .or_default()
            .entry(tag.to_string())
            .or_insert(0) += 1;
    }

    pub fn transition_count(&self, prev: &str, tag: &str) -> u64 {
        self.bigrams
            .get(prev)
            .and_then(|next| next.get(tag))
            .copied()
            .unwrap_or(0)
    }

    /// The tag seen most often after `prev`, ties going to the smaller name.
    pub fn most_likely_after(&self, prev: &str) -> Option<&str> {
        self.bigrams
            .get(prev)?
            .iter()
            .max_by_key(|&(tag, &count)| (count, Reverse(tag)))
            .map(|(tag, _)| tag.as_str())
    }

    /// Re-ranks candidate tags given the previous tag. Candidates that form
    /// frequent transitions get a score boost; the list ends up sorted by
    /// descending score, then by tag name.
    pub fn rerank(&self, prev: &str, candidates: &mut [(String, u64)]) {
        for (tag, score) in candidates.iter_mut() {
            let count = self.transition_count(prev, tag);
            if count > 0 {
                let boost = ((count + 1) as f64).log2() * 10.0;
                *score += boost as u64;
            }
        }
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    }
}
