//! Runtime configuration
//!
//! Loaded from JSON; every field has a default so partial files are valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cleaner::DEFAULT_STAGE_SUM_TOLERANCE;
use crate::error::ComputeError;
use crate::evaluation::DEFAULT_FOLDS;
use crate::forest::ForestConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnoozelessConfig {
    pub forest: ForestConfig,
    pub cross_validation_folds: usize,
    /// Keep fitted forests per target inside a `SleepAnalyzer`
    pub memoize_models: bool,
    /// Allowed deviation of REM + deep + light from 100 before warning
    pub stage_sum_tolerance: f64,
}

impl Default for SnoozelessConfig {
    fn default() -> Self {
        Self {
            forest: ForestConfig::default(),
            cross_validation_folds: DEFAULT_FOLDS,
            memoize_models: false,
            stage_sum_tolerance: DEFAULT_STAGE_SUM_TOLERANCE,
        }
    }
}

impl SnoozelessConfig {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: SnoozelessConfig =
            serde_json::from_str(json).map_err(|e| ComputeError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ComputeError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        self.forest.validate()?;
        if self.cross_validation_folds < 2 {
            return Err(ComputeError::ConfigError(
                "cross_validation_folds must be at least 2".to_string(),
            ));
        }
        if !self.stage_sum_tolerance.is_finite() || self.stage_sum_tolerance < 0.0 {
            return Err(ComputeError::ConfigError(
                "stage_sum_tolerance must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}
