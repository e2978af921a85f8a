//! Pipeline orchestration
//!
//! This module provides the public API for Snoozeless.
//! It runs the full pipeline from a raw study CSV to predictions and
//! importance rankings.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use crate::cleaner::RecordCleaner;
use crate::config::SnoozelessConfig;
use crate::encoder::{CategoricalEncoder, EncodingMap};
use crate::error::ComputeError;
use crate::evaluation::{cross_validate, CrossValidation};
use crate::features::FeatureSelector;
use crate::forest::{ForestConfig, SleepForest};
use crate::hygiene::HygieneComparison;
use crate::linear::LinearBaseline;
use crate::predictor::SleepPredictor;
use crate::schema;
use crate::table::SleepTable;
use crate::types::{ImportanceReport, Prediction, SleepAnswers, TargetField};

/// Prepared study data, ready for model fitting.
///
/// Built once from the raw table and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepDataset {
    cleaned: SleepTable,
    encoded: SleepTable,
    encoding: EncodingMap,
    features: Vec<String>,
}

impl SleepDataset {
    /// Prepare a raw study table with default cleaning settings
    pub fn from_raw(raw: SleepTable) -> Result<Self, ComputeError> {
        Self::prepare(raw, &RecordCleaner::default())
    }

    /// Pipeline stages:
    /// 1. RecordCleaner - Drop incomplete rows, rescale, rename, parse times
    /// 2. CategoricalEncoder - Replace sex and smoking status with indicators
    /// 3. FeatureSelector - Fix the predictor column order
    pub fn prepare(raw: SleepTable, cleaner: &RecordCleaner) -> Result<Self, ComputeError> {
        let cleaned = cleaner.prepare(raw)?;
        if cleaned.is_empty() {
            return Err(ComputeError::InsufficientData(
                "no complete rows left after cleaning".to_string(),
            ));
        }
        let (encoded, encoding) = CategoricalEncoder::encode(&cleaned, &schema::CATEGORICAL_COLUMNS)?;
        let features = FeatureSelector::select(&encoded, &[])?;
        log::info!(
            "prepared {} rows with {} features",
            encoded.len(),
            features.len()
        );
        Ok(Self {
            cleaned,
            encoded,
            encoding,
            features,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ComputeError> {
        Self::from_raw(SleepTable::from_path(path)?)
    }

    pub fn from_csv_str(csv: &str) -> Result<Self, ComputeError> {
        Self::from_raw(SleepTable::from_csv_str(csv)?)
    }

    /// Cleaned table with categorical columns still as text
    pub fn cleaned(&self) -> &SleepTable {
        &self.cleaned
    }

    pub fn encoded(&self) -> &SleepTable {
        &self.encoded
    }

    pub fn encoding(&self) -> &EncodingMap {
        &self.encoding
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }
}

/// Predict one sleep quality statistic for a user, fitting a fresh forest.
///
/// # Example
/// ```ignore
/// let dataset = SleepDataset::load("Sleep_Efficiency.csv")?;
/// let prediction = predict_sleep_quality(
///     TargetField::SleepEfficiency,
///     &dataset,
///     &answers,
///     &ForestConfig::seeded(42),
/// )?;
/// ```
pub fn predict_sleep_quality(
    target: TargetField,
    dataset: &SleepDataset,
    answers: &SleepAnswers,
    config: &ForestConfig,
) -> Result<Prediction, ComputeError> {
    SleepPredictor::predict(
        target,
        dataset.encoded(),
        dataset.encoding(),
        answers,
        config,
    )
}

/// Rank features by importance for one target, fitting a fresh forest.
///
/// `limit` keeps only the most important entries.
pub fn rank_feature_importance(
    target: TargetField,
    dataset: &SleepDataset,
    config: &ForestConfig,
    limit: Option<usize>,
) -> Result<ImportanceReport, ComputeError> {
    let forest = fit_target(dataset, target, config)?;
    importance_report(&forest, target, limit)
}

fn fit_target(
    dataset: &SleepDataset,
    target: TargetField,
    config: &ForestConfig,
) -> Result<SleepForest, ComputeError> {
    SleepForest::fit(dataset.encoded(), dataset.features(), target.column(), config)
}

fn importance_report(
    forest: &SleepForest,
    target: TargetField,
    limit: Option<usize>,
) -> Result<ImportanceReport, ComputeError> {
    let mut features = forest.importance_ranking()?;
    if let Some(limit) = limit {
        features.truncate(limit);
    }
    Ok(ImportanceReport {
        target,
        model_id: forest.model_id(),
        seed: forest.seed(),
        training_rows: forest.training_rows(),
        features,
    })
}

/// Analyzer holding a dataset and configuration across requests.
///
/// With model caching enabled, one forest per target is fitted on first use
/// and reused until the dataset is replaced.
pub struct SleepAnalyzer {
    dataset: SleepDataset,
    config: SnoozelessConfig,
    cache: Option<HashMap<TargetField, SleepForest>>,
}

impl SleepAnalyzer {
    pub fn new(dataset: SleepDataset, config: SnoozelessConfig) -> Self {
        let cache = config.memoize_models.then(HashMap::new);
        Self {
            dataset,
            config,
            cache,
        }
    }

    /// Load and prepare a study CSV using the config's cleaning settings
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        config: SnoozelessConfig,
    ) -> Result<Self, ComputeError> {
        config.validate()?;
        let cleaner = RecordCleaner::new(config.stage_sum_tolerance);
        let dataset = SleepDataset::prepare(SleepTable::from_path(path)?, &cleaner)?;
        Ok(Self::new(dataset, config))
    }

    /// Enable per-target forest caching
    pub fn with_model_cache(mut self) -> Self {
        if self.cache.is_none() {
            self.cache = Some(HashMap::new());
        }
        self
    }

    pub fn dataset(&self) -> &SleepDataset {
        &self.dataset
    }

    pub fn config(&self) -> &SnoozelessConfig {
        &self.config
    }

    /// Number of forests currently cached
    pub fn cached_models(&self) -> usize {
        self.cache.as_ref().map_or(0, HashMap::len)
    }

    /// Swap in a new dataset, discarding cached forests
    pub fn replace_dataset(&mut self, dataset: SleepDataset) {
        self.dataset = dataset;
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }

    pub fn predict(
        &mut self,
        target: TargetField,
        answers: &SleepAnswers,
    ) -> Result<Prediction, ComputeError> {
        if self.cache.is_none() {
            return predict_sleep_quality(target, &self.dataset, answers, &self.config.forest);
        }
        let encoding = self.dataset.encoding().clone();
        self.with_forest(target, |forest| {
            SleepPredictor::predict_with_forest(forest, target, &encoding, answers)
        })
    }

    pub fn importance_report(
        &mut self,
        target: TargetField,
        limit: Option<usize>,
    ) -> Result<ImportanceReport, ComputeError> {
        self.with_forest(target, |forest| importance_report(forest, target, limit))
    }

    /// K-fold cross-validation using the configured fold count
    pub fn cross_validate(&self, target: TargetField) -> Result<CrossValidation, ComputeError> {
        cross_validate(
            self.dataset.encoded(),
            self.dataset.features(),
            target.column(),
            &self.config.forest,
            self.config.cross_validation_folds,
        )
    }

    pub fn linear_baseline(&self, target: TargetField) -> Result<LinearBaseline, ComputeError> {
        LinearBaseline::fit(
            self.dataset.encoded(),
            self.dataset.features(),
            target.column(),
        )
    }

    pub fn hygiene_comparison(
        &self,
        answers: &SleepAnswers,
    ) -> Result<HygieneComparison, ComputeError> {
        HygieneComparison::compare(self.dataset.cleaned(), answers)
    }

    fn with_forest<T, F>(&mut self, target: TargetField, f: F) -> Result<T, ComputeError>
    where
        F: FnOnce(&SleepForest) -> Result<T, ComputeError>,
    {
        match self.cache.as_mut() {
            Some(cache) => {
                let forest = match cache.entry(target) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        entry.insert(fit_target(&self.dataset, target, &self.config.forest)?)
                    }
                };
                f(forest)
            }
            None => f(&fit_target(&self.dataset, target, &self.config.forest)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticStudy;
    use crate::types::BiologicalSex;

    fn dataset() -> SleepDataset {
        SleepDataset::from_raw(SyntheticStudy::generate(40, 17)).unwrap()
    }

    fn config() -> SnoozelessConfig {
        SnoozelessConfig {
            forest: ForestConfig {
                n_trees: 20,
                importance_rounds: 1,
                ..ForestConfig::seeded(11)
            },
            cross_validation_folds: 4,
            ..SnoozelessConfig::default()
        }
    }

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
    fn test_dataset_from_csv_str() {
        let raw = SyntheticStudy::generate(12, 1);
        let ds = SleepDataset::from_csv_str(&raw.to_csv_string().unwrap()).unwrap();
        assert_eq!(ds.len(), 12);
        assert_eq!(ds.features().len(), 10);
        assert!(ds.cleaned().has_column(schema::CAFFEINE));
        assert!(ds.encoded().is_efficiency_scaled());
    }

    #[test]
    fn test_dataset_load() {
        let path = std::env::temp_dir().join(format!("snoozeless-{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(&path, SyntheticStudy::generate(10, 2).to_csv_string().unwrap()).unwrap();
        let ds = SleepDataset::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(ds.len(), 10);
    }

    #[test]
    fn test_all_rows_incomplete() {
        let csv = "ID,Age,Gender,Bedtime,Wakeup time,Sleep duration,Sleep efficiency,\
                   REM sleep percentage,Deep sleep percentage,Light sleep percentage,Awakenings,\
                   Caffeine consumption,Alcohol consumption,Smoking status,Exercise frequency\n\
                   1,65,Female,2021-03-06 01:00:00,2021-03-06 07:00:00,6,0.88,18,70,12,,0,0,Yes,3\n";
        assert!(matches!(
            SleepDataset::from_csv_str(csv),
            Err(ComputeError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_predict_sleep_quality() {
        let ds = dataset();
        let prediction =
            predict_sleep_quality(TargetField::DeepPercentage, &ds, &answers(), &config().forest)
                .unwrap();
        assert!((0.0..=100.0).contains(&prediction.value));
        assert_eq!(prediction.feature_vector.len(), ds.features().len());
    }

    #[test]
    fn test_rank_feature_importance_limit() {
        let ds = dataset();
        let report =
            rank_feature_importance(TargetField::SleepEfficiency, &ds, &config().forest, Some(3))
                .unwrap();
        assert_eq!(report.features.len(), 3);
        assert!(report.features[0].importance >= report.features[2].importance);

        let full =
            rank_feature_importance(TargetField::SleepEfficiency, &ds, &config().forest, None)
                .unwrap();
        let total: f64 = full.features.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_analyzer_refits_without_cache() {
        let mut analyzer = SleepAnalyzer::new(dataset(), config());
        let a = analyzer.predict(TargetField::RemPercentage, &answers()).unwrap();
        let b = analyzer.predict(TargetField::RemPercentage, &answers()).unwrap();
        assert_ne!(a.model_id, b.model_id);
        assert_eq!(a.value.to_bits(), b.value.to_bits());
        assert_eq!(analyzer.cached_models(), 0);
    }

    #[test]
    fn test_analyzer_model_cache() {
        let mut analyzer = SleepAnalyzer::new(dataset(), config()).with_model_cache();
        let a = analyzer.predict(TargetField::RemPercentage, &answers()).unwrap();
        let report = analyzer
            .importance_report(TargetField::RemPercentage, None)
            .unwrap();
        assert_eq!(a.model_id, report.model_id);
        assert_eq!(analyzer.cached_models(), 1);

        analyzer.replace_dataset(SleepDataset::from_raw(SyntheticStudy::generate(30, 5)).unwrap());
        assert_eq!(analyzer.cached_models(), 0);
        let b = analyzer.predict(TargetField::RemPercentage, &answers()).unwrap();
        assert_ne!(a.model_id, b.model_id);
        assert_eq!(b.training_rows, 30);
    }

    #[test]
    fn test_analyzer_supplementary_analyses() {
        let analyzer = SleepAnalyzer::new(dataset(), config());
        let cv = analyzer.cross_validate(TargetField::SleepEfficiency).unwrap();
        assert_eq!(cv.folds, 4);

        let baseline = analyzer.linear_baseline(TargetField::SleepEfficiency).unwrap();
        assert_eq!(baseline.coefficients.len(), 10);

        let hygiene = analyzer.hygiene_comparison(&answers()).unwrap();
        assert_eq!(hygiene.user.awakenings, 1.0);
    }
}
