// --- File: src/core/lexicon.rs
use crate::core::types::Strategy;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// All normalizations observed for one original token, with how often each
/// was seen. Sorted maps keep every derived ranking reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSet {
    counts: BTreeMap<String, u64>,
}

impl CandidateSet {
    fn add(&mut self, normalization: &str, increment: u64) {
        *self.counts.entry(normalization.to_string()).or_insert(0) += increment;
    }

    /// Number of training occurrences of the original token.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, normalization: &str) -> u64 {
        self.counts.get(normalization).copied().unwrap_or(0)
    }

    /// Candidates by descending count, equal counts in lexicographic order.
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .counts
            .iter()
            .map(|(candidate, &count)| (candidate.as_str(), count))
            .collect();
        ranked.sort_by_key(|&(candidate, count)| (Reverse(count), candidate));
        ranked
    }

    /// Every candidate sharing the highest count, in lexicographic order.
    pub fn top_candidates(&self) -> Vec<&str> {
        let top = self.counts.values().copied().max().unwrap_or(0);
        self.counts
            .iter()
            .filter(|&(_, &count)| count == top)
            .map(|(candidate, _)| candidate.as_str())
            .collect()
    }
}

/// Frequency table from original token to its observed normalizations.
///
/// Only `ModelBuilder` can add counts; once built the model is read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationModel {
    entries: BTreeMap<String, CandidateSet>,
    token_count: u64,
    message_count: usize,
}

impl NormalizationModel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, original: &str, normalization: &str, increment: u64) {
        self.entries
            .entry(original.to_string())
            .or_default()
            .add(normalization, increment);
        self.token_count += increment;
    }

    pub(crate) fn close_message(&mut self) {
        self.message_count += 1;
    }

    pub fn candidates(&self, original: &str) -> Option<&CandidateSet> {
        self.entries.get(original)
    }

    /// Strategy a token would get, based on the number of distinct
    /// normalizations seen for it in training.
    pub fn classify(&self, original: &str) -> Strategy {
        match self.entries.get(original).map(CandidateSet::distinct) {
            None | Some(0) => Strategy::New,
            Some(1) => Strategy::Unique,
            Some(_) => Strategy::Ambiguous,
        }
    }

    /// Originals in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CandidateSet)> {
        self.entries.iter().map(|(original, set)| (original.as_str(), set))
    }

    /// Number of distinct original tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    pub fn ambiguous_count(&self) -> usize {
        self.entries.values().filter(|set| set.distinct() > 1).count()
    }
}
