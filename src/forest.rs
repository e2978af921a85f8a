//! Random-forest regression
//!
//! This module fits `smartcore`'s random-forest regressor on the selected
//! feature columns of an encoded table and scores each feature.
//!
//! Importances are permutation importances on the training data, not
//! impurity-reduction (MDI) importances: the mean increase in training MSE
//! when one feature column is shuffled, clipped at zero and normalised to
//! sum to one. They are computed on first request and then kept with the
//! model, so prediction-only fits never pay for them.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::ComputeError;
use crate::evaluation::mean_squared_error;
use crate::table::SleepTable;
use crate::types::FeatureImportance;

/// Fewest rows a forest can be fitted on
pub const MIN_TRAINING_ROWS: usize = 2;

/// Default number of trees (scikit-learn's default)
pub const DEFAULT_N_TREES: usize = 100;

/// Default number of shuffles per feature when scoring importance
pub const DEFAULT_IMPORTANCE_ROUNDS: usize = 3;

/// Mixed into the fit seed so importance shuffles use their own stream
const IMPORTANCE_SEED_SALT: u64 = 0x5EED_1A9E;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Hyperparameters for forest fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    /// Features tried per split; all features when `None`
    pub max_features: Option<usize>,
    /// Fixed seed for reproducible fits; a fresh seed is drawn when `None`
    pub seed: Option<u64>,
    /// Shuffles per feature for permutation importance
    pub importance_rounds: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            max_depth: None,
            min_samples_leaf: 1,
            min_samples_split: 2,
            max_features: None,
            seed: None,
            importance_rounds: DEFAULT_IMPORTANCE_ROUNDS,
        }
    }
}

impl ForestConfig {
    /// Default hyperparameters with a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.n_trees == 0 {
            return Err(ComputeError::ConfigError("n_trees must be at least 1".to_string()));
        }
        if self.importance_rounds == 0 {
            return Err(ComputeError::ConfigError(
                "importance_rounds must be at least 1".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 || self.min_samples_split < 2 {
            return Err(ComputeError::ConfigError(
                "min_samples_leaf must be >= 1 and min_samples_split >= 2".to_string(),
            ));
        }
        if self.max_features == Some(0) {
            return Err(ComputeError::ConfigError(
                "max_features must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Feature matrix and target vector extracted from a table
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    /// One row per record, columns in feature-name order
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingData {
    pub fn from_table(
        table: &SleepTable,
        feature_names: &[String],
        target: &str,
    ) -> Result<Self, ComputeError> {
        let targets = table.numeric_column(target)?;
        let columns = feature_names
            .iter()
            .map(|name| table.numeric_column(name))
            .collect::<Result<Vec<_>, _>>()?;

        let features = (0..table.len())
            .map(|row| columns.iter().map(|col| col[row]).collect())
            .collect();

        Ok(Self { features, targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Rows at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }
}

/// A fitted forest for one target column
pub struct SleepForest {
    model: Forest,
    model_id: Uuid,
    target: String,
    feature_names: Vec<String>,
    training: TrainingData,
    importance_rounds: usize,
    importances: OnceLock<Vec<f64>>,
    seed: u64,
}

impl fmt::Debug for SleepForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SleepForest")
            .field("model_id", &self.model_id)
            .field("target", &self.target)
            .field("feature_names", &self.feature_names)
            .field("importances", &self.importances.get())
            .field("training_rows", &self.training.len())
            .field("seed", &self.seed)
            .finish()
    }
}

impl SleepForest {
    /// Fit a forest predicting `target` from `feature_names` columns of `table`
    pub fn fit(
        table: &SleepTable,
        feature_names: &[String],
        target: &str,
        config: &ForestConfig,
    ) -> Result<Self, ComputeError> {
        let data = TrainingData::from_table(table, feature_names, target)?;
        Self::fit_data(&data, feature_names, target, config)
    }

    /// Fit on an already extracted matrix
    pub fn fit_data(
        data: &TrainingData,
        feature_names: &[String],
        target: &str,
        config: &ForestConfig,
    ) -> Result<Self, ComputeError> {
        config.validate()?;
        check_trainable(data, feature_names)?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let n_features = feature_names.len();
        let parameters = RandomForestRegressorParameters {
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf,
            min_samples_split: config.min_samples_split,
            n_trees: config.n_trees,
            m: Some(config.max_features.unwrap_or(n_features).min(n_features)),
            keep_samples: false,
            seed,
        };

        let x = DenseMatrix::from_2d_vec(&data.features);
        let model = Forest::fit(&x, &data.targets, parameters)
            .map_err(|e| ComputeError::ModelError(e.to_string()))?;

        let forest = Self {
            model,
            model_id: Uuid::new_v4(),
            target: target.to_string(),
            feature_names: feature_names.to_vec(),
            training: data.clone(),
            importance_rounds: config.importance_rounds,
            importances: OnceLock::new(),
            seed,
        };
        log::info!(
            "fitted forest {} for '{}' on {} rows x {} features (seed {})",
            forest.model_id,
            forest.target,
            forest.training.len(),
            n_features,
            seed
        );
        Ok(forest)
    }

    /// Predict a single feature vector
    pub fn predict_one(&self, features: &[f64]) -> Result<f64, ComputeError> {
        let predictions = self.predict_rows(&[features.to_vec()])?;
        predictions
            .into_iter()
            .next()
            .ok_or_else(|| ComputeError::ModelError("forest returned no prediction".to_string()))
    }

    /// Predict several feature vectors at once
    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ComputeError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        for row in rows {
            if row.len() != self.feature_names.len() {
                return Err(ComputeError::InvalidInput(format!(
                    "feature vector has {} entries, model expects {}",
                    row.len(),
                    self.feature_names.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(ComputeError::InvalidInput(
                    "feature vector contains non-finite values".to_string(),
                ));
            }
        }
        predict_matrix(&self.model, rows)
    }

    pub fn model_id(&self) -> Uuid {
        self.model_id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Importances in feature-name order, scored on first call
    pub fn feature_importances(&self) -> Result<&[f64], ComputeError> {
        if let Some(importances) = self.importances.get() {
            return Ok(importances);
        }
        let scored = permutation_importances(
            &self.model,
            &self.training,
            self.importance_rounds,
            self.seed,
        )?;
        log::debug!("scored importances for forest {}", self.model_id);
        Ok(self.importances.get_or_init(|| scored))
    }

    pub fn training_rows(&self) -> usize {
        self.training.len()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Features sorted by decreasing importance, ties kept in feature order
    pub fn importance_ranking(&self) -> Result<Vec<FeatureImportance>, ComputeError> {
        let importances = self.feature_importances()?;
        let mut ranking: Vec<FeatureImportance> = self
            .feature_names
            .iter()
            .zip(importances)
            .map(|(feature, importance)| FeatureImportance {
                feature: feature.clone(),
                importance: *importance,
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(ranking)
    }
}

fn check_trainable(data: &TrainingData, feature_names: &[String]) -> Result<(), ComputeError> {
    if feature_names.is_empty() {
        return Err(ComputeError::InsufficientData(
            "no feature columns selected".to_string(),
        ));
    }
    if data.features.len() != data.targets.len() {
        return Err(ComputeError::InvalidInput(format!(
            "{} feature rows but {} targets",
            data.features.len(),
            data.targets.len()
        )));
    }
    if let Some((idx, row)) = data
        .features
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != feature_names.len())
    {
        return Err(ComputeError::InvalidInput(format!(
            "feature row {} has {} entries, expected {}",
            idx,
            row.len(),
            feature_names.len()
        )));
    }
    if data.len() < MIN_TRAINING_ROWS {
        return Err(ComputeError::InsufficientData(format!(
            "{} rows available, at least {} required",
            data.len(),
            MIN_TRAINING_ROWS
        )));
    }
    let first = data.targets[0];
    if data.targets.iter().all(|&v| v == first) {
        return Err(ComputeError::InsufficientData(
            "target has zero variance".to_string(),
        ));
    }
    Ok(())
}

fn predict_matrix(model: &Forest, rows: &[Vec<f64>]) -> Result<Vec<f64>, ComputeError> {
    let x = DenseMatrix::from_2d_vec(&rows.to_vec());
    model
        .predict(&x)
        .map_err(|e| ComputeError::ModelError(e.to_string()))
}

fn permutation_importances(
    model: &Forest,
    data: &TrainingData,
    rounds: usize,
    seed: u64,
) -> Result<Vec<f64>, ComputeError> {
    let baseline = mean_squared_error(&data.targets, &predict_matrix(model, &data.features)?);
    let mut rng = StdRng::seed_from_u64(seed ^ IMPORTANCE_SEED_SALT);
    let n_features = data.features.first().map(Vec::len).unwrap_or(0);

    let mut raw = Vec::with_capacity(n_features);
    for feature in 0..n_features {
        let mut increase = 0.0;
        for _ in 0..rounds {
            let mut column: Vec<f64> = data.features.iter().map(|row| row[feature]).collect();
            column.shuffle(&mut rng);
            let permuted: Vec<Vec<f64>> = data
                .features
                .iter()
                .zip(column)
                .map(|(row, value)| {
                    let mut row = row.clone();
                    row[feature] = value;
                    row
                })
                .collect();
            let predictions = predict_matrix(model, &permuted)?;
            increase += mean_squared_error(&data.targets, &predictions) - baseline;
        }
        raw.push(increase / rounds as f64);
    }

    Ok(normalize_importances(raw))
}

/// Clip negative scores to zero and scale to sum to one.
///
/// All-zero input yields uniform weights.
pub fn normalize_importances(raw: Vec<f64>) -> Vec<f64> {
    let clipped: Vec<f64> = raw
        .into_iter()
        .map(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 })
        .collect();
    if clipped.is_empty() {
        return clipped;
    }
    let total: f64 = clipped.iter().sum();
    if total <= 0.0 {
        let uniform = 1.0 / clipped.len() as f64;
        return vec![uniform; clipped.len()];
    }
    clipped.into_iter().map(|v| v / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SleepDataset;
    use crate::schema;
    use crate::synthetic::SyntheticStudy;

    fn dataset() -> SleepDataset {
        SleepDataset::from_raw(SyntheticStudy::generate(50, 42)).unwrap()
    }

    fn small_config(seed: u64) -> ForestConfig {
        ForestConfig {
            n_trees: 25,
            ..ForestConfig::seeded(seed)
        }
    }

    #[test]
    fn test_importances_normalized() {
        let ds = dataset();
        let forest = SleepForest::fit(
            ds.encoded(),
            ds.features(),
            schema::SLEEP_EFFICIENCY,
            &small_config(1),
        )
        .unwrap();

        let importances = forest.feature_importances().unwrap();
        assert_eq!(importances.len(), ds.features().len());
        assert!(importances.iter().all(|v| *v >= 0.0));
        let total: f64 = importances.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let ds = dataset();
        let fit = || {
            SleepForest::fit(
                ds.encoded(),
                ds.features(),
                schema::DEEP_PERCENTAGE,
                &small_config(99),
            )
            .unwrap()
        };
        let a = fit();
        let b = fit();
        let row = vec![30.0, 23.0, 7.0, 8.0, 1.0, 0.0, 0.0, 3.0, 1.0, 0.0];
        assert_eq!(
            a.predict_one(&row).unwrap().to_bits(),
            b.predict_one(&row).unwrap().to_bits()
        );
        assert_eq!(a.feature_importances().unwrap(), b.feature_importances().unwrap());
        assert_ne!(a.model_id(), b.model_id());
    }

    #[test]
    fn test_unseeded_fit_draws_seed() {
        let ds = dataset();
        let config = ForestConfig {
            n_trees: 5,
            importance_rounds: 1,
            ..ForestConfig::default()
        };
        let forest =
            SleepForest::fit(ds.encoded(), ds.features(), schema::REM_PERCENTAGE, &config)
                .unwrap();
        assert_eq!(forest.training_rows(), 50);
    }

    #[test]
    fn test_ranking_sorted() {
        let ds = dataset();
        let forest = SleepForest::fit(
            ds.encoded(),
            ds.features(),
            schema::SLEEP_EFFICIENCY,
            &small_config(3),
        )
        .unwrap();
        let ranking = forest.importance_ranking().unwrap();
        assert_eq!(ranking.len(), ds.features().len());
        for pair in ranking.windows(2) {
            assert!(pair[0].importance >= pair[1].importance);
        }
    }

    #[test]
    fn test_wrong_vector_length() {
        let ds = dataset();
        let forest = SleepForest::fit(
            ds.encoded(),
            ds.features(),
            schema::SLEEP_EFFICIENCY,
            &small_config(4),
        )
        .unwrap();
        assert!(matches!(
            forest.predict_one(&[1.0, 2.0]),
            Err(ComputeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_insufficient_rows() {
        let data = TrainingData {
            features: vec![vec![1.0]],
            targets: vec![2.0],
        };
        let result = SleepForest::fit_data(&data, &["x".to_string()], "y", &small_config(0));
        assert!(matches!(result, Err(ComputeError::InsufficientData(_))));
    }

    #[test]
    fn test_row_width_must_match_feature_names() {
        let data = TrainingData {
            features: vec![vec![1.0], vec![2.0], vec![3.0]],
            targets: vec![1.0, 2.0, 2.0],
        };
        let names = ["a".to_string(), "b".to_string()];
        let result = SleepForest::fit_data(&data, &names, "y", &small_config(0));
        assert!(matches!(result, Err(ComputeError::InvalidInput(_))));
    }

    #[test]
    fn test_targets_must_match_rows() {
        let data = TrainingData {
            features: vec![vec![1.0], vec![2.0], vec![3.0]],
            targets: vec![1.0, 2.0],
        };
        let result = SleepForest::fit_data(&data, &["x".to_string()], "y", &small_config(0));
        assert!(matches!(result, Err(ComputeError::InvalidInput(_))));
    }

    #[test]
    fn test_importances_scored_once_on_demand() {
        let ds = dataset();
        let forest = SleepForest::fit(
            ds.encoded(),
            ds.features(),
            schema::SLEEP_EFFICIENCY,
            &small_config(5),
        )
        .unwrap();
        assert!(forest.importances.get().is_none());

        let first = forest.feature_importances().unwrap().to_vec();
        assert!(forest.importances.get().is_some());
        assert_eq!(forest.feature_importances().unwrap(), first.as_slice());
        assert_eq!(first.len(), forest.feature_names().len());
    }

    #[test]
    fn test_zero_variance_target() {
        let data = TrainingData {
            features: vec![vec![1.0], vec![2.0], vec![3.0]],
            targets: vec![5.0, 5.0, 5.0],
        };
        let result = SleepForest::fit_data(&data, &["x".to_string()], "y", &small_config(0));
        assert!(matches!(result, Err(ComputeError::InsufficientData(_))));
    }

    #[test]
    fn test_unknown_target() {
        let ds = dataset();
        let result = SleepForest::fit(ds.encoded(), ds.features(), "Dream vividness", &small_config(0));
        assert!(matches!(result, Err(ComputeError::UnknownFeature(_))));
    }

    #[test]
    fn test_normalize_importances() {
        assert_eq!(normalize_importances(vec![1.0, 3.0, -2.0]), vec![0.25, 0.75, 0.0]);
        assert_eq!(normalize_importances(vec![0.0, -1.0]), vec![0.5, 0.5]);
        assert!(normalize_importances(Vec::new()).is_empty());
    }

    #[test]
    fn test_config_validation() {
        let config = ForestConfig {
            n_trees: 0,
            ..ForestConfig::default()
        };
        assert!(matches!(config.validate(), Err(ComputeError::ConfigError(_))));
        assert!(ForestConfig::default().validate().is_ok());
    }
}
