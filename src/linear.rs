//! Multiple linear regression baseline
//!
//! Ordinary least squares via `linfa-linear`, used as a reference point
//! for the forest's fit.

use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::evaluation::r2_score;
use crate::forest::TrainingData;
use crate::table::SleepTable;

/// One fitted coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub feature: String,
    pub weight: f64,
}

/// Fitted linear model with its in-sample fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearBaseline {
    pub target: String,
    pub intercept: f64,
    /// Coefficients in feature order
    pub coefficients: Vec<Coefficient>,
    pub r_squared: Option<f64>,
    pub training_rows: usize,
}

impl LinearBaseline {
    pub fn fit(
        table: &SleepTable,
        feature_names: &[String],
        target: &str,
    ) -> Result<Self, ComputeError> {
        let data = TrainingData::from_table(table, feature_names, target)?;
        let (n, p) = (data.len(), feature_names.len());
        if p == 0 || n <= p + 1 {
            return Err(ComputeError::InsufficientData(format!(
                "linear fit of {p} features needs more than {} rows, got {n}",
                p + 1
            )));
        }

        let x = Array2::from_shape_vec((n, p), data.features.concat())
            .map_err(|e| ComputeError::ModelError(e.to_string()))?;
        let y = Array1::from_vec(data.targets.clone());
        let dataset = Dataset::new(x.clone(), y);

        let model = LinearRegression::new()
            .fit(&dataset)
            .map_err(|e| ComputeError::ModelError(e.to_string()))?;

        let intercept = model.intercept();
        let fitted = x.dot(model.params()) + intercept;
        let r_squared = r2_score(&data.targets, &fitted.to_vec());

        let coefficients = feature_names
            .iter()
            .zip(model.params().iter())
            .map(|(feature, &weight)| Coefficient {
                feature: feature.clone(),
                weight,
            })
            .collect();

        log::info!("linear baseline for '{target}' on {n} rows: r2 {r_squared:?}");
        Ok(Self {
            target: target.to_string(),
            intercept,
            coefficients,
            r_squared,
            training_rows: n,
        })
    }

    pub fn predict_one(&self, features: &[f64]) -> Result<f64, ComputeError> {
        if features.len() != self.coefficients.len() {
            return Err(ComputeError::InvalidInput(format!(
                "feature vector has {} entries, model expects {}",
                features.len(),
                self.coefficients.len()
            )));
        }
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c.weight * x)
                .sum::<f64>())
    }

    /// Coefficients sorted by decreasing magnitude
    pub fn ranked_coefficients(&self) -> Vec<Coefficient> {
        let mut ranked = self.coefficients.clone();
        ranked.sort_by(|a, b| {
            b.weight
                .abs()
                .partial_cmp(&a.weight.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SleepDataset;
    use crate::schema;
    use crate::synthetic::SyntheticStudy;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_recovers_exact_plane() {
        // y = 1 + 2a + 3b
        let table = SleepTable::from_csv_str(
            "a,b,y\n0,0,1\n1,0,3\n0,1,4\n1,1,6\n2,1,8\n1,3,12\n",
        )
        .unwrap();
        let model = LinearBaseline::fit(&table, &names(&["a", "b"]), "y").unwrap();

        assert!((model.intercept - 1.0).abs() < 1e-8);
        assert!((model.coefficients[0].weight - 2.0).abs() < 1e-8);
        assert!((model.coefficients[1].weight - 3.0).abs() < 1e-8);
        assert!((model.r_squared.unwrap() - 1.0).abs() < 1e-8);
        assert!((model.predict_one(&[2.0, 2.0]).unwrap() - 11.0).abs() < 1e-8);

        let ranked = model.ranked_coefficients();
        assert_eq!(ranked[0].feature, "b");
    }

    #[test]
    fn test_study_fit() {
        let ds = SleepDataset::from_raw(SyntheticStudy::generate(60, 4)).unwrap();
        let features: Vec<String> = ds
            .features()
            .iter()
            .filter(|f| f.as_str() != schema::SLEEP_DURATION)
            .cloned()
            .collect();
        let model = LinearBaseline::fit(ds.encoded(), &features, schema::SLEEP_EFFICIENCY).unwrap();
        assert_eq!(model.coefficients.len(), 9);
        assert_eq!(model.training_rows, 60);
        let r2 = model.r_squared.unwrap();
        assert!((0.0..=1.0 + 1e-9).contains(&r2));
    }

    #[test]
    fn test_too_few_rows() {
        let table = SleepTable::from_csv_str("a,b,y\n0,0,1\n1,0,3\n0,1,4\n").unwrap();
        assert!(matches!(
            LinearBaseline::fit(&table, &names(&["a", "b"]), "y"),
            Err(ComputeError::InsufficientData(_))
        ));
    }
}
