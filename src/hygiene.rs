//! Sleep hygiene profiles
//!
//! Four lifestyle axes (awakenings, caffeine, alcohol, exercise) for the
//! average study participant and for one user. Caffeine is compared on a
//! `ln(1 + mg)` scale so it sits in the same range as the other axes.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::schema;
use crate::table::SleepTable;
use crate::types::SleepAnswers;

fn caffeine_scale(mg: f64) -> f64 {
    (1.0 + mg).ln()
}

/// Values on the four hygiene axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HygieneProfile {
    pub awakenings: f64,
    /// `ln(1 + mg)` of caffeine taken in the 24 hours before sleep
    pub caffeine_log: f64,
    pub alcohol_oz: f64,
    pub exercise_per_week: f64,
}

impl HygieneProfile {
    /// Column means over a cleaned study table
    pub fn study_average(table: &SleepTable) -> Result<Self, ComputeError> {
        if table.is_empty() {
            return Err(ComputeError::InsufficientData(
                "no rows to average".to_string(),
            ));
        }
        let mean = |values: Vec<f64>| values.iter().sum::<f64>() / values.len() as f64;
        let caffeine: Vec<f64> = table
            .numeric_column(schema::CAFFEINE)?
            .into_iter()
            .map(caffeine_scale)
            .collect();

        Ok(Self {
            awakenings: mean(table.numeric_column(schema::AWAKENINGS)?),
            caffeine_log: mean(caffeine),
            alcohol_oz: mean(table.numeric_column(schema::ALCOHOL)?),
            exercise_per_week: mean(table.numeric_column(schema::EXERCISE)?),
        })
    }

    pub fn from_answers(answers: &SleepAnswers) -> Self {
        Self {
            awakenings: answers.awakenings as f64,
            caffeine_log: caffeine_scale(answers.caffeine_mg as f64),
            alcohol_oz: answers.alcohol_oz as f64,
            exercise_per_week: answers.exercise_count as f64,
        }
    }

    /// `(column name, value)` pairs in axis order
    pub fn axes(&self) -> [(&'static str, f64); 4] {
        [
            (schema::HYGIENE_COLUMNS[0], self.awakenings),
            (schema::HYGIENE_COLUMNS[1], self.caffeine_log),
            (schema::HYGIENE_COLUMNS[2], self.alcohol_oz),
            (schema::HYGIENE_COLUMNS[3], self.exercise_per_week),
        ]
    }
}

/// A user's hygiene next to the study average
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HygieneComparison {
    pub study: HygieneProfile,
    pub user: HygieneProfile,
}

impl HygieneComparison {
    pub fn compare(table: &SleepTable, answers: &SleepAnswers) -> Result<Self, ComputeError> {
        Ok(Self {
            study: HygieneProfile::study_average(table)?,
            user: HygieneProfile::from_answers(answers),
        })
    }

    /// User minus study average, per axis
    pub fn differences(&self) -> Vec<(&'static str, f64)> {
        self.user
            .axes()
            .iter()
            .zip(self.study.axes().iter())
            .map(|((name, user), (_, study))| (*name, user - study))
            .collect()
    }
}
