use crate::core::lexicon::NormalizationModel;
use crate::core::types::{Message, PredictedMessage, PredictedRecord, Strategy, TokenRecord};
use crate::error::{NormError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

// The predictor owns its model and its random source. Tie-breaks are drawn
// once per original, in sorted order, when a model is loaded, so a token
// resolves the same way in every message and in every file of a run.
pub struct NormalizationEngine {
    model: Option<NormalizationModel>,
    resolved: HashMap<String, String>,
    seed: u64,
    rng: StdRng,
}

impl NormalizationEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            model: None,
            resolved: HashMap::new(),
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_model(model: NormalizationModel, seed: u64) -> Result<Self> {
        let mut engine = Self::new(seed);
        engine.load_model(model)?;
        Ok(engine)
    }

    /// Installs a model and resolves every original to its prediction.
    /// The random source is re-seeded, so loading the same model twice gives
    /// the same resolutions.
    pub fn load_model(&mut self, model: NormalizationModel) -> Result<()> {
        if model.token_count() == 0 {
            return Err(NormError::EmptyModel);
        }

        self.rng = StdRng::seed_from_u64(self.seed);
        self.resolved.clear();

        let mut ties = 0usize;
        for (original, candidates) in model.iter() {
            let top = candidates.top_candidates();
            let choice = match top.len() {
                0 => continue,
                1 => top[0],
                n => {
                    ties += 1;
                    top[self.rng.gen_range(0..n)]
                }
            };
            self.resolved.insert(original.to_string(), choice.to_string());
        }

        debug!(
            originals = model.len(),
            ambiguous = model.ambiguous_count(),
            ties,
            seed = self.seed,
            "model loaded into predictor"
        );
        self.model = Some(model);
        Ok(())
    }

    pub fn predict(&self, original: &str) -> Result<(Strategy, String)> {
        let model = self.model.as_ref().ok_or(NormError::EmptyModel)?;
        match (model.classify(original), self.resolved.get(original)) {
            (Strategy::New, _) | (_, None) => Ok((Strategy::New, original.to_string())),
            (strategy, Some(prediction)) => Ok((strategy, prediction.clone())),
        }
    }

    pub fn predict_record(&self, record: &TokenRecord) -> Result<PredictedRecord> {
        let (strategy, predicted_normalization) = self.predict(&record.original)?;
        Ok(PredictedRecord {
            record: record.clone(),
            strategy,
            predicted_normalization,
        })
    }

    /// Predicts every token, keeping message grouping and token order.
    pub fn predict_all(&self, messages: &[Message]) -> Result<Vec<PredictedMessage>> {
        if self.model.is_none() {
            return Err(NormError::EmptyModel);
        }
        messages
            .iter()
            .map(|message| {
                message
                    .iter()
                    .map(|r| self.predict_record(r))
                    .collect::<Result<PredictedMessage>>()
            })
            .collect()
    }
}

/// How many tokens of a dataset fell into each strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyCounts {
    pub unique: usize,
    pub ambiguous: usize,
    pub new: usize,
}

impl StrategyCounts {
    pub fn tally(messages: &[PredictedMessage]) -> Self {
        let mut counts = Self::default();
        for record in messages.iter().flatten() {
            match record.strategy {
                Strategy::Unique => counts.unique += 1,
                Strategy::Ambiguous => counts.ambiguous += 1,
                Strategy::New => counts.new += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.unique + self.ambiguous + self.new
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::ModelBuilder;

    fn train(pairs: &[(&str, &str)]) -> NormalizationModel {
        let message: Message = pairs
            .iter()
            .map(|(original, gold)| TokenRecord::new(*original, *gold, "X"))
            .collect();
        ModelBuilder::build(&[message]).unwrap()
    }

    #[test]
    fn test_unique_token_gets_its_only_normalization() {
        let engine = NormalizationEngine::with_model(train(&[("i", "ich")]), 42).unwrap();
        assert_eq!(engine.predict("i").unwrap(), (Strategy::Unique, "ich".to_string()));
    }

    #[test]
    fn test_new_token_is_copied_through() {
        let engine = NormalizationEngine::with_model(train(&[("i", "ich")]), 42).unwrap();
        assert_eq!(engine.predict("sushi").unwrap(), (Strategy::New, "sushi".to_string()));
    }

    #[test]
    fn test_majority_wins() {
        let model = train(&[("hett", "hätte"), ("hett", "hät"), ("hett", "hätte"), ("hett", "hätte")]);
        for seed in 0..20 {
            let engine = NormalizationEngine::with_model(model.clone(), seed).unwrap();
            assert_eq!(
                engine.predict("hett").unwrap(),
                (Strategy::Ambiguous, "hätte".to_string())
            );
        }
    }

    #[test]
    fn test_tie_resolves_to_observed_candidate() {
        let model = train(&[("gohts", "gohts"), ("gohts", "geht es")]);
        let mut seen = std::collections::HashSet::new();
        for seed in 0..64 {
            let engine = NormalizationEngine::with_model(model.clone(), seed).unwrap();
            let (strategy, prediction) = engine.predict("gohts").unwrap();
            assert_eq!(strategy, Strategy::Ambiguous);
            assert!(prediction == "gohts" || prediction == "geht es");
            seen.insert(prediction);
        }
        // Across many seeds both tied candidates should turn up.
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_same_seed_same_resolution() {
        let model = train(&[
            ("a", "x"),
            ("a", "y"),
            ("b", "x"),
            ("b", "y"),
            ("c", "p"),
            ("c", "q"),
            ("c", "r"),
        ]);
        let first = NormalizationEngine::with_model(model.clone(), 7).unwrap();
        let second = NormalizationEngine::with_model(model, 7).unwrap();
        for token in ["a", "b", "c"] {
            assert_eq!(first.predict(token).unwrap(), second.predict(token).unwrap());
        }
    }

    #[test]
    fn test_prediction_is_consistent_across_messages() {
        let model = train(&[("gohts", "gohts"), ("gohts", "geht es")]);
        let engine = NormalizationEngine::with_model(model, 3).unwrap();
        let dev = vec![
            vec![TokenRecord::new("gohts", "geht es", "VVFIN+PPER")],
            vec![
                TokenRecord::new("sushi", "Sushi", "NN"),
                TokenRecord::new("gohts", "gohts", "VVFIN"),
            ],
        ];
        let predicted = engine.predict_all(&dev).unwrap();

        assert_eq!(predicted.len(), 2);
        assert_eq!(predicted[1].len(), 2);
        assert_eq!(
            predicted[0][0].predicted_normalization,
            predicted[1][1].predicted_normalization
        );
        assert_eq!(predicted[1][0].strategy, Strategy::New);
    }

    #[test]
    fn test_predict_without_model_fails() {
        let engine = NormalizationEngine::new(42);
        assert!(matches!(engine.predict("i"), Err(NormError::EmptyModel)));
        assert!(matches!(engine.predict_all(&[]), Err(NormError::EmptyModel)));
    }

    #[test]
    fn test_empty_model_is_rejected() {
        let model = ModelBuilder::build(&[]).unwrap();
        assert!(matches!(
            NormalizationEngine::with_model(model, 42),
            Err(NormError::EmptyModel)
        ));
    }

    #[test]
    fn test_strategy_counts() {
        let model = train(&[("i", "ich"), ("hett", "hätte"), ("hett", "hät")]);
        let engine = NormalizationEngine::with_model(model, 42).unwrap();
        let dev = vec![vec![
            TokenRecord::new("i", "ich", "PPER"),
            TokenRecord::new("hett", "hätte", "VAFIN"),
            TokenRecord::new("sushi", "Sushi", "NN"),
            TokenRecord::new("i", "ich", "PPER"),
        ]];
        let counts = StrategyCounts::tally(&engine.predict_all(&dev).unwrap());
        assert_eq!(counts, StrategyCounts { unique: 2, ambiguous: 1, new: 1 });
        assert_eq!(counts.total(), 4);
    }
}
