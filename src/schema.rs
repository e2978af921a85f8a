//! Sleep-study input schema
//!
//! Column names of the study CSV, before and after cleaning. Every stage of
//! the pipeline addresses columns through these constants.

pub const ID: &str = "ID";
pub const AGE: &str = "Age";
pub const GENDER: &str = "Gender";
pub const BEDTIME: &str = "Bedtime";
pub const WAKEUP_TIME: &str = "Wakeup time";
pub const SLEEP_DURATION: &str = "Sleep duration";
pub const SLEEP_EFFICIENCY: &str = "Sleep efficiency";
pub const REM_PERCENTAGE: &str = "REM sleep percentage";
pub const DEEP_PERCENTAGE: &str = "Deep sleep percentage";
pub const LIGHT_PERCENTAGE: &str = "Light sleep percentage";
pub const AWAKENINGS: &str = "Awakenings";
pub const SMOKING_STATUS: &str = "Smoking status";

/// Raw names as they appear in the study file
pub const RAW_CAFFEINE: &str = "Caffeine consumption";
pub const RAW_ALCOHOL: &str = "Alcohol consumption";
pub const RAW_EXERCISE: &str = "Exercise frequency";

/// Unit-suffixed names used after cleaning
pub const CAFFEINE: &str = "Caffeine consumption 24 hrs before sleeping (mg)";
pub const ALCOHOL: &str = "Alcohol consumption 24 hrs before sleeping (oz)";
pub const EXERCISE: &str = "Exercise frequency (in days per week)";

/// Header of the raw study file, in file order
pub const RAW_COLUMNS: [&str; 15] = [
    ID,
    AGE,
    GENDER,
    BEDTIME,
    WAKEUP_TIME,
    SLEEP_DURATION,
    SLEEP_EFFICIENCY,
    REM_PERCENTAGE,
    DEEP_PERCENTAGE,
    LIGHT_PERCENTAGE,
    AWAKENINGS,
    RAW_CAFFEINE,
    RAW_ALCOHOL,
    SMOKING_STATUS,
    RAW_EXERCISE,
];

/// Renames applied by the cleaner (raw name, cleaned name)
pub const COLUMN_RENAMES: [(&str, &str); 3] = [
    (RAW_EXERCISE, EXERCISE),
    (RAW_CAFFEINE, CAFFEINE),
    (RAW_ALCOHOL, ALCOHOL),
];

/// Columns that hold text timestamps in the raw file
pub const TIME_COLUMNS: [&str; 2] = [BEDTIME, WAKEUP_TIME];

/// Nominal columns converted to indicators before modelling
pub const CATEGORICAL_COLUMNS: [&str; 2] = [GENDER, SMOKING_STATUS];

/// Every column that can be a prediction target
pub const TARGET_COLUMNS: [&str; 4] = [
    SLEEP_EFFICIENCY,
    REM_PERCENTAGE,
    DEEP_PERCENTAGE,
    LIGHT_PERCENTAGE,
];

/// Sleep stage percentages that should sum to ~100
pub const STAGE_COLUMNS: [&str; 3] = [REM_PERCENTAGE, DEEP_PERCENTAGE, LIGHT_PERCENTAGE];

/// Hygiene axes, in radar order
pub const HYGIENE_COLUMNS: [&str; 4] = [AWAKENINGS, CAFFEINE, ALCOHOL, EXERCISE];

/// Cleaned name for a raw column (identity for columns that are not renamed)
pub fn cleaned_name(raw: &str) -> &str {
    COLUMN_RENAMES
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| *to)
        .unwrap_or(raw)
}
