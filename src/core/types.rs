// src/core/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// One annotated token of a corpus: the dialect form as written, its
/// standard-language normalization and the gold POS tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub original: String,
    pub gold_normalization: String,
    pub gold_pos: String,
}

impl TokenRecord {
    pub fn new(
        original: impl Into<String>,
        gold_normalization: impl Into<String>,
        gold_pos: impl Into<String>,
    ) -> Self {
        Self {
            original: original.into(),
            gold_normalization: gold_normalization.into(),
            gold_pos: gold_pos.into(),
        }
    }
}

/// A message is the unit the tagger sees. Boundaries come from blank lines.
pub type Message = Vec<TokenRecord>;

/// How a prediction was derived from the training counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One distinct normalization was observed in training.
    Unique,
    /// Two or more distinct normalizations were observed.
    Ambiguous,
    /// Never seen in training; the token is copied through.
    New,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Unique, Strategy::Ambiguous, Strategy::New];

    /// Single-letter code used in the output files.
    pub fn code(self) -> &'static str {
        match self {
            Strategy::Unique => "U",
            Strategy::Ambiguous => "A",
            Strategy::New => "N",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Unique => "unique",
            Strategy::Ambiguous => "ambiguous",
            Strategy::New => "new",
        }
    }

    /// Accepts the short code or the long name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "U" | "unique" => Some(Strategy::Unique),
            "A" | "ambiguous" => Some(Strategy::Ambiguous),
            "N" | "new" => Some(Strategy::New),
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which surface form of a token is handed to the tagger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Raw dialect text.
    Lower,
    /// Gold normalization.
    Upper,
    /// Our predicted normalization.
    Baseline,
}

impl Condition {
    pub const ALL: [Condition; 3] = [Condition::Lower, Condition::Upper, Condition::Baseline];

    pub fn label(self) -> &'static str {
        match self {
            Condition::Lower => "Lower bound",
            Condition::Upper => "Upper bound",
            Condition::Baseline => "Baseline",
        }
    }
}

/// A token record together with the normalization we predicted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedRecord {
    pub record: TokenRecord,
    pub strategy: Strategy,
    pub predicted_normalization: String,
}

impl PredictedRecord {
    pub fn surface(&self, condition: Condition) -> &str {
        match condition {
            Condition::Lower => &self.record.original,
            Condition::Upper => &self.record.gold_normalization,
            Condition::Baseline => &self.predicted_normalization,
        }
    }
}

pub type PredictedMessage = Vec<PredictedRecord>;

/// A message after tagging: the predicted records plus one tag sequence per
/// condition. The sequences are positionally aligned with `records` once
/// `verify` has passed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaggedMessage {
    pub records: Vec<PredictedRecord>,
    pub tags_lower: Vec<String>,
    pub tags_upper: Vec<String>,
    pub tags_baseline: Vec<String>,
}

/// Borrowed row view of a tagged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedRecord<'a> {
    pub record: &'a PredictedRecord,
    pub tag_lower: &'a str,
    pub tag_upper: &'a str,
    pub tag_baseline: &'a str,
}

impl TaggedRecord<'_> {
    pub fn tag(&self, condition: Condition) -> &str {
        match condition {
            Condition::Lower => self.tag_lower,
            Condition::Upper => self.tag_upper,
            Condition::Baseline => self.tag_baseline,
        }
    }

    pub fn is_correct(&self, condition: Condition) -> bool {
        self.tag(condition) == self.record.record.gold_pos
    }
}

impl TaggedMessage {
    pub fn tags(&self, condition: Condition) -> &[String] {
        match condition {
            Condition::Lower => &self.tags_lower,
            Condition::Upper => &self.tags_upper,
            Condition::Baseline => &self.tags_baseline,
        }
    }

    pub fn tags_mut(&mut self, condition: Condition) -> &mut Vec<String> {
        match condition {
            Condition::Lower => &mut self.tags_lower,
            Condition::Upper => &mut self.tags_upper,
            Condition::Baseline => &mut self.tags_baseline,
        }
    }

    /// Checks that every tag sequence has one tag per record. `index` is
    /// only used to name the message in the error.
    pub fn verify(&self, index: usize) -> crate::error::Result<()> {
        for condition in Condition::ALL {
            let actual = self.tags(condition).len();
            if actual != self.records.len() {
                return Err(crate::error::NormError::LengthMismatch {
                    what: format!("message {} ({} tags)", index + 1, condition.label()),
                    expected: self.records.len(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Rows of the message. Stops at the shortest sequence, so call
    /// `verify` first when alignment matters.
    pub fn rows(&self) -> impl Iterator<Item = TaggedRecord<'_>> {
        self.records
            .iter()
            .zip(&self.tags_lower)
            .zip(&self.tags_upper)
            .zip(&self.tags_baseline)
            .map(|(((record, lower), upper), baseline)| TaggedRecord {
                record,
                tag_lower: lower,
                tag_upper: upper,
                tag_baseline: baseline,
            })
    }
}
