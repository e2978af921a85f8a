//! Snoozeless - Sleep-study analytics engine
//!
//! Snoozeless turns a sleep-study table into on-demand sleep quality
//! predictions through a deterministic pipeline: record cleaning → time
//! parsing → categorical encoding → feature selection → random-forest fit.
//!
//! ## Modules
//!
//! - **Preparation**: `table`, `time`, `cleaner`, `encoder`, `features`
//! - **Modelling**: `forest`, `predictor`, `pipeline`
//! - **Analyses**: `evaluation`, `linear`, `hygiene`, `summary`

pub mod cleaner;
pub mod config;
pub mod encoder;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod forest;
pub mod hygiene;
pub mod linear;
pub mod pipeline;
pub mod predictor;
pub mod schema;
pub mod summary;
pub mod synthetic;
pub mod table;
pub mod time;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::SnoozelessConfig;
pub use encoder::{CategoricalEncoder, EncodingMap};
pub use error::ComputeError;
pub use forest::{ForestConfig, SleepForest};
pub use pipeline::{predict_sleep_quality, rank_feature_importance, SleepAnalyzer, SleepDataset};
pub use table::{Cell, SleepTable};
pub use types::{
    BiologicalSex, FeatureImportance, ImportanceReport, Prediction, SleepAnswers, TargetField,
};

/// Snoozeless version reported by the CLI and FFI
pub const SNOOZELESS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by diagnostics
pub const PRODUCER_NAME: &str = "snoozeless";
