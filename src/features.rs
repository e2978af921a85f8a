//! Feature selection
//!
//! This module derives the ordered list of predictor columns from an
//! encoded table: every column except the identifier and the sleep quality
//! targets. Light sleep percentage is always excluded, since it is nearly
//! determined by the REM and deep percentages.

use crate::error::ComputeError;
use crate::schema;
use crate::table::{Cell, SleepTable};

/// Columns never used as predictors
pub const ALWAYS_EXCLUDED: [&str; 5] = [
    schema::ID,
    schema::SLEEP_EFFICIENCY,
    schema::REM_PERCENTAGE,
    schema::DEEP_PERCENTAGE,
    schema::LIGHT_PERCENTAGE,
];

/// Selector for computing predictor column names
pub struct FeatureSelector;

impl FeatureSelector {
    /// Predictor columns in table order.
    ///
    /// `extra_excluded` names further columns to drop. Every excluded name
    /// must exist in the table, and every selected column must be numeric.
    pub fn select(
        table: &SleepTable,
        extra_excluded: &[&str],
    ) -> Result<Vec<String>, ComputeError> {
        for name in ALWAYS_EXCLUDED.iter().chain(extra_excluded) {
            if !table.has_column(name) {
                return Err(ComputeError::UnknownFeature(format!(
                    "excluded column '{name}' not in table"
                )));
            }
        }

        let features: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| {
                !ALWAYS_EXCLUDED.contains(&c.as_str()) && !extra_excluded.contains(&c.as_str())
            })
            .cloned()
            .collect();

        for feature in &features {
            let idx = table.column_index(feature)?;
            if table
                .rows()
                .iter()
                .any(|row| matches!(row[idx], Cell::Text(_)))
            {
                return Err(ComputeError::EncodingMismatch(format!(
                    "feature '{feature}' holds text; encode it before selection"
                )));
            }
        }

        log::debug!("selected {} features: {:?}", features.len(), features);
        Ok(features)
    }
}
