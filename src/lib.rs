// src/lib.rs

pub mod config;
pub mod core;
pub mod error;
pub mod learning;
pub mod persistence;
pub mod scoring;
pub mod tagging;

pub use crate::config::PipelineConfig;
pub use crate::core::engine::{NormalizationEngine, StrategyCounts};
pub use crate::core::lexicon::NormalizationModel;
pub use crate::core::types::{Condition, Message, PredictedRecord, Strategy, TaggedMessage, TokenRecord};
pub use crate::error::{NormError, Result};
pub use crate::learning::ModelBuilder;
pub use crate::scoring::{score, Report};
pub use crate::tagging::{LexiconTagger, Tagger};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
