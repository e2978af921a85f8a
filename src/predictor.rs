//! Prediction front-end
//!
//! Turns a user's lifestyle answers into a feature vector laid out exactly
//! like the training table and asks a freshly fitted forest for a value.

use chrono::Utc;

use crate::encoder::EncodingMap;
use crate::error::ComputeError;
use crate::features::FeatureSelector;
use crate::forest::{ForestConfig, SleepForest};
use crate::schema;
use crate::table::SleepTable;
use crate::time::sleep_duration_hours;
use crate::types::{smoking_category, Prediction, SleepAnswers, TargetField};

/// Front-end for single-user predictions
pub struct SleepPredictor;

impl SleepPredictor {
    /// Reject answers outside the ranges the study covers
    pub fn validate(answers: &SleepAnswers) -> Result<(), ComputeError> {
        for (name, hour) in [("bedtime", answers.bedtime), ("wake time", answers.wake_time)] {
            if !hour.is_finite() || !(0.0..24.0).contains(&hour) {
                return Err(ComputeError::InvalidInput(format!(
                    "{name} must be an hour of day in [0, 24), got {hour}"
                )));
            }
        }
        Ok(())
    }

    /// Assemble the answers into a vector ordered like `feature_names`.
    ///
    /// Categorical answers go through `encoding` so they match the training
    /// table's indicator columns.
    pub fn feature_vector(
        answers: &SleepAnswers,
        encoding: &EncodingMap,
        feature_names: &[String],
    ) -> Result<Vec<f64>, ComputeError> {
        Self::validate(answers)?;
        feature_names
            .iter()
            .map(|name| match name.as_str() {
                schema::AGE => Ok(answers.age as f64),
                schema::BEDTIME => Ok(answers.bedtime),
                schema::WAKEUP_TIME => Ok(answers.wake_time),
                schema::SLEEP_DURATION => {
                    Ok(sleep_duration_hours(answers.bedtime, answers.wake_time))
                }
                schema::AWAKENINGS => Ok(answers.awakenings as f64),
                schema::CAFFEINE => Ok(answers.caffeine_mg as f64),
                schema::ALCOHOL => Ok(answers.alcohol_oz as f64),
                schema::EXERCISE => Ok(answers.exercise_count as f64),
                schema::GENDER => encoding.encode_value(schema::GENDER, answers.sex.category()),
                schema::SMOKING_STATUS => {
                    encoding.encode_value(schema::SMOKING_STATUS, smoking_category(answers.smoker))
                }
                other => Err(ComputeError::UnknownFeature(format!(
                    "answers cannot supply feature '{other}'"
                ))),
            })
            .collect()
    }

    /// Fit a fresh forest on `encoded` and predict `target` for `answers`
    pub fn predict(
        target: TargetField,
        encoded: &SleepTable,
        encoding: &EncodingMap,
        answers: &SleepAnswers,
        config: &ForestConfig,
    ) -> Result<Prediction, ComputeError> {
        let features = FeatureSelector::select(encoded, &[])?;
        let vector = Self::feature_vector(answers, encoding, &features)?;
        let forest = SleepForest::fit(encoded, &features, target.column(), config)?;
        Self::predict_with(&forest, target, vector)
    }

    /// Predict with an already fitted forest
    pub fn predict_with_forest(
        forest: &SleepForest,
        target: TargetField,
        encoding: &EncodingMap,
        answers: &SleepAnswers,
    ) -> Result<Prediction, ComputeError> {
        if forest.target() != target.column() {
            return Err(ComputeError::InvalidInput(format!(
                "forest predicts '{}', not '{}'",
                forest.target(),
                target.column()
            )));
        }
        let vector = Self::feature_vector(answers, encoding, forest.feature_names())?;
        Self::predict_with(forest, target, vector)
    }

    fn predict_with(
        forest: &SleepForest,
        target: TargetField,
        vector: Vec<f64>,
    ) -> Result<Prediction, ComputeError> {
        let value = forest.predict_one(&vector)?;
        log::debug!("predicted {target} = {value:.3} with forest {}", forest.model_id());
        Ok(Prediction {
            target,
            value,
            model_id: forest.model_id(),
            seed: forest.seed(),
            training_rows: forest.training_rows(),
            features: forest.feature_names().to_vec(),
            feature_vector: vector,
            computed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SleepDataset;
    use crate::synthetic::SyntheticStudy;
    use crate::types::BiologicalSex;
    use pretty_assertions::assert_eq;

    fn answers() -> SleepAnswers {
        SleepAnswers {
            age: 25,
            bedtime: 23.0,
            wake_time: 7.0,
            awakenings: 1,
            caffeine_mg: 50,
            alcohol_oz: 0,
            exercise_count: 3,
            sex: BiologicalSex::Male,
            smoker: false,
        }
    }

    #[test]
    fn test_feature_vector_order() {
        let ds = SleepDataset::from_raw(SyntheticStudy::generate(20, 3)).unwrap();
        let vector = SleepPredictor::feature_vector(&answers(), ds.encoding(), ds.features()).unwrap();
        assert_eq!(
            vector,
            vec![25.0, 23.0, 7.0, 8.0, 1.0, 50.0, 0.0, 3.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_seeded_prediction_reproducible() {
        let ds = SleepDataset::from_raw(SyntheticStudy::generate(50, 42)).unwrap();
        let config = ForestConfig::seeded(7);

        let first = SleepPredictor::predict(
            TargetField::SleepEfficiency,
            ds.encoded(),
            ds.encoding(),
            &answers(),
            &config,
        )
        .unwrap();
        let second = SleepPredictor::predict(
            TargetField::SleepEfficiency,
            ds.encoded(),
            ds.encoding(),
            &answers(),
            &config,
        )
        .unwrap();

        assert!((0.0..=100.0).contains(&first.value));
        assert_eq!(first.value.to_bits(), second.value.to_bits());
        assert_eq!(first.seed, 7);
        assert_eq!(first.training_rows, 50);
        assert_eq!(first.features, ds.features());
    }

    #[test]
    fn test_time_out_of_range() {
        let ds = SleepDataset::from_raw(SyntheticStudy::generate(20, 3)).unwrap();
        let bad = SleepAnswers {
            bedtime: 24.0,
            ..answers()
        };
        assert!(matches!(
            SleepPredictor::feature_vector(&bad, ds.encoding(), ds.features()),
            Err(ComputeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unsuppliable_feature() {
        let ds = SleepDataset::from_raw(SyntheticStudy::generate(20, 3)).unwrap();
        let names = vec!["Heart rate".to_string()];
        assert!(matches!(
            SleepPredictor::feature_vector(&answers(), ds.encoding(), &names),
            Err(ComputeError::UnknownFeature(_))
        ));
    }

    #[test]
    fn test_forest_target_mismatch() {
        let ds = SleepDataset::from_raw(SyntheticStudy::generate(20, 3)).unwrap();
        let forest = SleepForest::fit(
            ds.encoded(),
            ds.features(),
            TargetField::RemPercentage.column(),
            &ForestConfig {
                n_trees: 5,
                ..ForestConfig::seeded(1)
            },
        )
        .unwrap();
        assert!(matches!(
            SleepPredictor::predict_with_forest(
                &forest,
                TargetField::SleepEfficiency,
                ds.encoding(),
                &answers()
            ),
            Err(ComputeError::InvalidInput(_))
        ));
    }
}
