// File: src/config.rs
use crate::error::{NormError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_SEED: u64 = 42;

/// Run parameters shared by both commands. Every field has a default, so a
/// config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed for the tie-break random source of the predictor.
    pub seed: u64,
    /// Tag given to words the built-in tagger has never seen and cannot
    /// guess from context.
    pub fallback_tag: String,
    /// Appended to a corpus file stem: `dev.txt` -> `dev_norm_out.txt`.
    pub norm_suffix: String,
    /// Appended to a normalization output: `dev_norm_out.txt` -> `dev_norm_POS_out.txt`.
    pub pos_suffix: String,
    pub report_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            fallback_tag: "NN".to_string(),
            norm_suffix: "_norm_out.txt".to_string(),
            pos_suffix: "_POS_out.txt".to_string(),
            report_name: "eval_report.txt".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NormError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|e| NormError::io(path, e))?;
        let config: PipelineConfig = serde_json::from_str(&raw)
            .map_err(|e| NormError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fallback_tag.trim().is_empty() {
            return Err(NormError::Config("fallback_tag must not be empty".into()));
        }
        for (name, value) in [
            ("norm_suffix", &self.norm_suffix),
            ("pos_suffix", &self.pos_suffix),
            ("report_name", &self.report_name),
        ] {
            if value.is_empty() || value.contains(|c: char| c == '/' || c == '\\') {
                return Err(NormError::Config(format!(
                    "{name} must be a plain file name fragment, got {value:?}"
                )));
            }
        }
        Ok(())
    }
}
