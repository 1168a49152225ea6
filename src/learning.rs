// File: src/learning.rs
use crate::core::lexicon::NormalizationModel;
use crate::core::types::{Message, TokenRecord};
use crate::error::{NormError, Result};
use tracing::debug;

/// Counts `(original -> gold normalization)` pairs from training records.
///
/// Records are fed one at a time with `observe`, and `end_message` marks a
/// boundary. Nothing is normalized here; this is a pure counting pass.
pub struct ModelBuilder {
    model: NormalizationModel,
    frequency_increment: u64,
    message_index: usize,
    token_index: usize,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            model: NormalizationModel::new(),
            frequency_increment: 1,
            message_index: 0,
            token_index: 0,
        }
    }

    /// Builds a model from a whole training corpus in one go.
    pub fn build(training: &[Message]) -> Result<NormalizationModel> {
        let mut builder = Self::new();
        for message in training {
            for record in message {
                builder.observe(record)?;
            }
            builder.end_message();
        }
        let model = builder.finish();
        debug!(
            originals = model.len(),
            tokens = model.token_count(),
            "normalization model built"
        );
        Ok(model)
    }

    /// Adds one training occurrence. A record with an empty field is
    /// rejected rather than skipped, since a gap would skew the counts.
    pub fn observe(&mut self, record: &TokenRecord) -> Result<()> {
        let fields = [
            ("original", &record.original),
            ("gold normalization", &record.gold_normalization),
            ("gold POS", &record.gold_pos),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(NormError::malformed(
                    format!(
                        "training message {}, token {}",
                        self.message_index + 1,
                        self.token_index + 1
                    ),
                    format!("empty {name}"),
                ));
            }
        }

        self.model.insert(
            &record.original,
            &record.gold_normalization,
            self.frequency_increment,
        );
        self.token_index += 1;
        Ok(())
    }

    pub fn end_message(&mut self) {
        if self.token_index > 0 {
            self.model.close_message();
            self.message_index += 1;
            self.token_index = 0;
        }
    }

    pub fn finish(mut self) -> NormalizationModel {
        self.end_message();
        self.model
    }
}
