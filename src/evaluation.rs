//! Model evaluation
//!
//! Regression scores and shuffled k-fold cross-validation of the forest.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::forest::{ForestConfig, SleepForest, TrainingData};
use crate::table::SleepTable;

/// Default number of folds
pub const DEFAULT_FOLDS: usize = 10;

/// Mean of squared residuals. Empty input scores 0.
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n as f64
}

/// Coefficient of determination.
///
/// `None` when `y_true` is empty or has zero variance.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return None;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let total: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if total == 0.0 {
        return None;
    }
    let residual: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Some(1.0 - residual / total)
}

/// Out-of-fold scores for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub target: String,
    pub folds: usize,
    pub rows: usize,
    /// r² over all out-of-fold predictions
    pub r_squared: Option<f64>,
    pub mse: f64,
    /// MSE of each held-out fold
    pub fold_mse: Vec<f64>,
    pub seed: u64,
}

/// Partition `0..rows` into `folds` shuffled test sets of near-equal size
pub fn kfold_indices(rows: usize, folds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let base = rows / folds;
    let extra = rows % folds;
    let mut start = 0;
    (0..folds)
        .map(|fold| {
            let size = base + usize::from(fold < extra);
            let chunk = order[start..start + size].to_vec();
            start += size;
            chunk
        })
        .collect()
}

/// Shuffled k-fold cross-validation of the forest on `table`
pub fn cross_validate(
    table: &SleepTable,
    feature_names: &[String],
    target: &str,
    config: &ForestConfig,
    folds: usize,
) -> Result<CrossValidation, ComputeError> {
    let data = TrainingData::from_table(table, feature_names, target)?;
    if folds < 2 || folds > data.len() {
        return Err(ComputeError::InsufficientData(format!(
            "{} folds requested for {} rows",
            folds,
            data.len()
        )));
    }

    let seed = config.seed.unwrap_or_else(rand::random);
    let test_sets = kfold_indices(data.len(), folds, seed);

    let mut predictions = vec![0.0; data.len()];
    let mut fold_mse = Vec::with_capacity(folds);
    for (fold, test) in test_sets.iter().enumerate() {
        let train: Vec<usize> = (0..data.len()).filter(|i| !test.contains(i)).collect();
        let forest = SleepForest::fit_data(&data.subset(&train), feature_names, target, config)?;

        let held_out = data.subset(test);
        let fold_predictions = forest.predict_rows(&held_out.features)?;
        fold_mse.push(mean_squared_error(&held_out.targets, &fold_predictions));
        for (&row, value) in test.iter().zip(fold_predictions) {
            predictions[row] = value;
        }
        log::debug!("fold {}/{} mse {:.3}", fold + 1, folds, fold_mse[fold]);
    }

    let report = CrossValidation {
        target: target.to_string(),
        folds,
        rows: data.len(),
        r_squared: r2_score(&data.targets, &predictions),
        mse: mean_squared_error(&data.targets, &predictions),
        fold_mse,
        seed,
    };
    log::info!(
        "{}-fold cross-validation for '{}': r2 {:?}",
        folds,
        target,
        report.r_squared
    );
    Ok(report)
}
