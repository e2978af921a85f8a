//! Core types for the Snoozeless pipeline
//!
//! This module defines the request and response structures that cross the
//! boundary between a user interface and the prediction pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ComputeError;
use crate::schema;

/// Sleep quality statistic a model can be trained to predict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    SleepEfficiency,
    RemPercentage,
    DeepPercentage,
}

impl TargetField {
    pub const ALL: [TargetField; 3] = [
        TargetField::SleepEfficiency,
        TargetField::RemPercentage,
        TargetField::DeepPercentage,
    ];

    /// Column holding this statistic in the cleaned table
    pub fn column(&self) -> &'static str {
        match self {
            TargetField::SleepEfficiency => schema::SLEEP_EFFICIENCY,
            TargetField::RemPercentage => schema::REM_PERCENTAGE,
            TargetField::DeepPercentage => schema::DEEP_PERCENTAGE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetField::SleepEfficiency => "sleep_efficiency",
            TargetField::RemPercentage => "rem_percentage",
            TargetField::DeepPercentage => "deep_percentage",
        }
    }
}

impl fmt::Display for TargetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for TargetField {
    type Err = ComputeError;

    /// Accepts either the snake_case identifier or the column name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        TargetField::ALL
            .into_iter()
            .find(|t| {
                t.as_str().eq_ignore_ascii_case(needle) || t.column().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| ComputeError::UnknownFeature(format!("no prediction target named '{s}'")))
    }
}

/// Biological sex as recorded by the study
///
/// Deserialises through `FromStr`, so JSON accepts the same labels as the
/// CLI ("female", "Biological Male", "M").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum BiologicalSex {
    Female,
    Male,
}

impl BiologicalSex {
    /// Category label used in the study file
    pub fn category(&self) -> &'static str {
        match self {
            BiologicalSex::Female => "Female",
            BiologicalSex::Male => "Male",
        }
    }
}

impl FromStr for BiologicalSex {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.trim_start_matches("biological ") {
            "female" | "f" => Ok(BiologicalSex::Female),
            "male" | "m" => Ok(BiologicalSex::Male),
            _ => Err(ComputeError::InvalidInput(format!(
                "unrecognised biological sex '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for BiologicalSex {
    type Error = ComputeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Smoking status category label used in the study file
pub fn smoking_category(smoker: bool) -> &'static str {
    if smoker {
        "Yes"
    } else {
        "No"
    }
}

/// Lifestyle answers entered by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepAnswers {
    /// Age in years
    pub age: u32,
    /// Bedtime as fractional hour of day [0, 24)
    pub bedtime: f64,
    /// Wake time as fractional hour of day [0, 24)
    pub wake_time: f64,
    /// Awakenings during a typical night
    pub awakenings: u32,
    /// Caffeine in the 24 hours before bed (mg)
    pub caffeine_mg: u32,
    /// Alcohol in the 24 hours before bed (oz)
    pub alcohol_oz: u32,
    /// Exercise sessions per week
    pub exercise_count: u32,
    pub sex: BiologicalSex,
    pub smoker: bool,
}

/// A single point prediction with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub target: TargetField,
    /// Predicted value, in the target column's unit (percent)
    pub value: f64,
    /// Identifier of the forest that produced the value
    pub model_id: Uuid,
    /// Seed the forest was fitted with
    pub seed: u64,
    /// Number of rows the forest was trained on
    pub training_rows: usize,
    /// Feature names, in vector order
    pub features: Vec<String>,
    /// The assembled feature vector
    pub feature_vector: Vec<f64>,
    pub computed_at: DateTime<Utc>,
}

/// Importance of one feature in a fitted forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Features ranked by decreasing importance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceReport {
    pub target: TargetField,
    pub model_id: Uuid,
    pub seed: u64,
    pub training_rows: usize,
    pub features: Vec<FeatureImportance>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_str() {
        assert_eq!(
            "Sleep efficiency".parse::<TargetField>().unwrap(),
            TargetField::SleepEfficiency
        );
        assert_eq!(
            "rem_percentage".parse::<TargetField>().unwrap(),
            TargetField::RemPercentage
        );
        assert_eq!(
            "deep sleep percentage".parse::<TargetField>().unwrap(),
            TargetField::DeepPercentage
        );
        assert!(matches!(
            "Light sleep percentage".parse::<TargetField>(),
            Err(ComputeError::UnknownFeature(_))
        ));
    }

    #[test]
    fn test_sex_from_str() {
        assert_eq!(
            "Biological Male".parse::<BiologicalSex>().unwrap(),
            BiologicalSex::Male
        );
        assert_eq!("female".parse::<BiologicalSex>().unwrap(), BiologicalSex::Female);
        assert!("other".parse::<BiologicalSex>().is_err());
    }

    #[test]
    fn test_answers_serde() {
        let json = r#"{
            "age": 25, "bedtime": 23.0, "wake_time": 7.0, "awakenings": 1,
            "caffeine_mg": 50, "alcohol_oz": 0, "exercise_count": 3,
            "sex": "male", "smoker": false
        }"#;
        let answers: SleepAnswers = serde_json::from_str(json).unwrap();
        assert_eq!(answers.sex, BiologicalSex::Male);
        assert_eq!(answers.exercise_count, 3);
    }

    #[test]
    fn test_sex_serde_accepts_study_labels() {
        let male: BiologicalSex = serde_json::from_str(r#""Biological Male""#).unwrap();
        assert_eq!(male, BiologicalSex::Male);
        let female: BiologicalSex = serde_json::from_str(r#""Female""#).unwrap();
        assert_eq!(female, BiologicalSex::Female);
        assert!(serde_json::from_str::<BiologicalSex>(r#""other""#).is_err());
        assert_eq!(serde_json::to_string(&BiologicalSex::Male).unwrap(), r#""male""#);
    }
}
