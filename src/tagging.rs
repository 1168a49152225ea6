// File: src/tagging.rs
use crate::core::context::{ContextModel, MESSAGE_START};
use crate::core::types::{Condition, Message, PredictedMessage, TaggedMessage};
use crate::error::{NormError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Separator between the tags of a multi-word surface form, e.g. `VVFIN+PPER`
/// for `geht es`.
pub const TAG_JOINER: char = '+';

/// A POS tagger seen as a black box: one tag per input token, same order.
/// Implementations may use the whole sequence as context.
pub trait Tagger {
    fn tag(&self, tokens: &[String]) -> Result<Vec<String>>;
}

impl<T: Tagger + ?Sized> Tagger for Box<T> {
    fn tag(&self, tokens: &[String]) -> Result<Vec<String>> {
        (**self).tag(tokens)
    }
}

fn split_words(surface: &str) -> Vec<&str> {
    let words: Vec<&str> = surface.split_whitespace().collect();
    if words.is_empty() {
        vec![surface]
    } else {
        words
    }
}

/// Tags one sequence of surface forms. Surfaces made of several words are
/// split, the flattened words go to the tagger in a single call, and the
/// word tags are joined back with `+` so there is one tag per surface.
pub fn tag_surfaces<T: Tagger + ?Sized>(tagger: &T, surfaces: &[&str], what: &str) -> Result<Vec<String>> {
    let split: Vec<Vec<&str>> = surfaces.iter().map(|s| split_words(s)).collect();
    let words: Vec<String> = split.iter().flatten().map(|w| w.to_string()).collect();

    let word_tags = tagger.tag(&words)?;
    if word_tags.len() != words.len() {
        return Err(NormError::LengthMismatch {
            what: format!("tagger output for {what}"),
            expected: words.len(),
            actual: word_tags.len(),
        });
    }

    let mut tags = word_tags.into_iter();
    let joined = split
        .iter()
        .map(|group| {
            let parts: Vec<String> = tags.by_ref().take(group.len()).collect();
            parts.join(&TAG_JOINER.to_string())
        })
        .collect();
    Ok(joined)
}

/// Tags one message under all three conditions, one tagger call per
/// condition so surfaces of different conditions never share a sequence.
pub fn tag_message<T: Tagger + ?Sized>(tagger: &T, message: &PredictedMessage, index: usize) -> Result<TaggedMessage> {
    let mut tagged = TaggedMessage {
        records: message.clone(),
        ..TaggedMessage::default()
    };
    for condition in Condition::ALL {
        let surfaces: Vec<&str> = message.iter().map(|r| r.surface(condition)).collect();
        let what = format!("message {} ({})", index + 1, condition.label());
        *tagged.tags_mut(condition) = tag_surfaces(tagger, &surfaces, &what)?;
    }
    tagged.verify(index)?;
    Ok(tagged)
}

pub fn tag_conditions<T: Tagger + ?Sized>(tagger: &T, messages: &[PredictedMessage]) -> Result<Vec<TaggedMessage>> {
    let tagged = messages
        .iter()
        .enumerate()
        .map(|(index, message)| tag_message(tagger, message, index))
        .collect::<Result<Vec<_>>>()?;
    debug!(messages = tagged.len(), "tagged all conditions");
    Ok(tagged)
}

/// Greedy left-to-right tagger trained from an annotated corpus.
///
/// Emission counts come from the gold-normalization column, transition
/// counts from consecutive gold tags within a message. Words are looked up
/// exactly first, then lower-cased.
#[derive(Debug, Clone)]
pub struct LexiconTagger {
    emissions: HashMap<String, HashMap<String, u64>>,
    folded: HashMap<String, HashMap<String, u64>>,
    context: ContextModel,
    fallback_tag: String,
}

impl LexiconTagger {
    pub fn new(fallback_tag: impl Into<String>) -> Self {
        Self {
            emissions: HashMap::new(),
            folded: HashMap::new(),
            context: ContextModel::new(),
            fallback_tag: fallback_tag.into(),
        }
    }

    pub fn from_corpus(messages: &[Message], fallback_tag: impl Into<String>) -> Self {
        let mut tagger = Self::new(fallback_tag);
        tagger.train(messages);
        tagger
    }

    pub fn train(&mut self, messages: &[Message]) {
        for message in messages {
            let mut prev = MESSAGE_START.to_string();
            for record in message {
                let words: Vec<&str> = record.gold_normalization.split_whitespace().collect();
                let tags: Vec<&str> = record.gold_pos.split(TAG_JOINER).collect();

                let pairs: Vec<(&str, &str)> = if words.len() == tags.len() {
                    words.iter().copied().zip(tags.iter().copied()).collect()
                } else if words.len() == 1 {
                    vec![(words[0], record.gold_pos.as_str())]
                } else {
                    Vec::new()
                };

                for &(word, tag) in &pairs {
                    self.add_emission(word, tag);
                }

                let sequence: Vec<&str> = if pairs.is_empty() {
                    vec![record.gold_pos.as_str()]
                } else {
                    pairs.iter().map(|&(_, tag)| tag).collect()
                };
                for tag in sequence {
                    self.context.add_transition(&prev, tag);
                    prev = tag.to_string();
                }
            }
        }
        debug!(
            words = self.emissions.len(),
            "lexicon tagger trained"
        );
    }

    fn add_emission(&mut self, word: &str, tag: &str) {
        *self
            .emissions
            .entry(word.to_string())
            .or_default()
            .entry(tag.to_string())
            .or_insert(0) += 1;
        *self
            .folded
            .entry(word.to_lowercase())
            .or_default()
            .entry(tag.to_string())
            .or_insert(0) += 1;
    }

    pub fn vocabulary_size(&self) -> usize {
        self.emissions.len()
    }

    fn lookup(&self, word: &str) -> Option<&HashMap<String, u64>> {
        self.emissions
            .get(word)
            .or_else(|| self.folded.get(&word.to_lowercase()))
    }

    fn tag_word(&self, word: &str, prev: &str) -> String {
        match self.lookup(word) {
            Some(counts) => {
                let mut candidates: Vec<(String, u64)> =
                    counts.iter().map(|(tag, &count)| (tag.clone(), count)).collect();
                self.context.rerank(prev, &mut candidates);
                candidates
                    .into_iter()
                    .next()
                    .map(|(tag, _)| tag)
                    .unwrap_or_else(|| self.fallback_tag.clone())
            }
            None => self
                .context
                .most_likely_after(prev)
                .unwrap_or(self.fallback_tag.as_str())
                .to_string(),
        }
    }
}

impl Tagger for LexiconTagger {
    fn tag(&self, tokens: &[String]) -> Result<Vec<String>> {
        let mut prev = MESSAGE_START.to_string();
        let mut tags = Vec::with_capacity(tokens.len());
        for token in tokens {
            let tag = self.tag_word(token, &prev);
            prev = tag.clone();
            tags.push(tag);
        }
        Ok(tags)
    }
}
