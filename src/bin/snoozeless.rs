//! Snoozeless CLI - Command-line interface for Snoozeless
//!
//! Commands:
//! - predict: Predict a sleep quality statistic from lifestyle answers
//! - importance: Rank features by importance for a statistic
//! - evaluate: Cross-validate the forest and compare with a linear baseline
//! - hygiene: Compare lifestyle answers with the study average
//! - summary: Describe a statistic per category, optionally with a trend line
//! - synth: Generate a synthetic study CSV
//! - doctor: Diagnose study file and configuration

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use snoozeless::hygiene::HygieneComparison;
use snoozeless::summary::{distribution_by_group, fit_trend};
use snoozeless::synthetic::SyntheticStudy;
use snoozeless::{
    BiologicalSex, ComputeError, SleepAnalyzer, SleepAnswers, SnoozelessConfig, TargetField,
    PRODUCER_NAME, SNOOZELESS_VERSION,
};

/// Snoozeless - Sleep-study analytics engine
#[derive(Parser)]
#[command(name = "snoozeless")]
#[command(version = SNOOZELESS_VERSION)]
#[command(about = "Predict sleep quality from lifestyle habits", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StudyArgs {
    /// Study CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fixed seed for reproducible forests (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of trees (overrides config)
    #[arg(long)]
    trees: Option<usize>,
}

#[derive(Args)]
struct AnswerArgs {
    /// Age in years
    #[arg(long, default_value = "30")]
    age: u32,

    /// Bedtime as hour of day (e.g. 23.5)
    #[arg(long, default_value = "23")]
    bedtime: f64,

    /// Wake time as hour of day (e.g. 7)
    #[arg(long, default_value = "7")]
    wake: f64,

    /// Awakenings per night
    #[arg(long, default_value = "1")]
    awakenings: u32,

    /// Caffeine in the 24 hours before bed (mg)
    #[arg(long, default_value = "0")]
    caffeine: u32,

    /// Alcohol in the 24 hours before bed (oz)
    #[arg(long, default_value = "0")]
    alcohol: u32,

    /// Exercise sessions per week
    #[arg(long, default_value = "3")]
    exercise: u32,

    /// Biological sex (female or male)
    #[arg(long, default_value = "female")]
    sex: String,

    /// The user smokes
    #[arg(long)]
    smoker: bool,
}

impl AnswerArgs {
    fn to_answers(&self) -> Result<SleepAnswers, ComputeError> {
        Ok(SleepAnswers {
            age: self.age,
            bedtime: self.bedtime,
            wake_time: self.wake,
            awakenings: self.awakenings,
            caffeine_mg: self.caffeine,
            alcohol_oz: self.alcohol,
            exercise_count: self.exercise,
            sex: self.sex.parse::<BiologicalSex>()?,
            smoker: self.smoker,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Predict a sleep quality statistic from lifestyle answers
    Predict {
        #[command(flatten)]
        study: StudyArgs,

        /// Statistic to predict (sleep_efficiency, rem_percentage, deep_percentage)
        #[arg(short, long, default_value = "sleep_efficiency")]
        target: String,

        #[command(flatten)]
        answers: AnswerArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank features by importance for a statistic
    Importance {
        #[command(flatten)]
        study: StudyArgs,

        /// Statistic to explain
        #[arg(short, long, default_value = "sleep_efficiency")]
        target: String,

        /// Show only the most important features
        #[arg(long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cross-validate the forest and compare with a linear baseline
    Evaluate {
        #[command(flatten)]
        study: StudyArgs,

        /// Statistic to evaluate
        #[arg(short, long, default_value = "sleep_efficiency")]
        target: String,

        /// Number of folds (overrides config)
        #[arg(long)]
        folds: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare lifestyle answers with the study average
    Hygiene {
        #[command(flatten)]
        study: StudyArgs,

        #[command(flatten)]
        answers: AnswerArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe a statistic per category, optionally with a trend line
    Summary {
        #[command(flatten)]
        study: StudyArgs,

        /// Column to group by
        #[arg(long, default_value = "Gender")]
        group: String,

        /// Column to describe
        #[arg(long, default_value = "Sleep efficiency")]
        stat: String,

        /// Also fit a least-squares trend of the statistic against this column
        #[arg(long)]
        trend: Option<String>,

        /// Only keep rows whose statistic lies in [MIN, MAX]
        #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
        range: Option<Vec<f64>>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a synthetic study CSV
    Synth {
        /// Number of participants
        #[arg(long, default_value = "452")]
        rows: usize,

        /// Generator seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Diagnose study file and configuration
    Doctor {
        /// Study CSV file to check
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> Result<(), SnoozelessCliError> {
    match cli.command {
        Commands::Predict {
            study,
            target,
            answers,
            json,
        } => cmd_predict(&study, &target, &answers, json),

        Commands::Importance {
            study,
            target,
            limit,
            json,
        } => cmd_importance(&study, &target, limit, json),

        Commands::Evaluate {
            study,
            target,
            folds,
            json,
        } => cmd_evaluate(&study, &target, folds, json),

        Commands::Hygiene {
            study,
            answers,
            json,
        } => cmd_hygiene(&study, &answers, json),

        Commands::Summary {
            study,
            group,
            stat,
            trend,
            range,
            json,
        } => cmd_summary(&study, &group, &stat, trend.as_deref(), range.as_deref(), json),

        Commands::Synth { rows, seed, output } => cmd_synth(rows, seed, &output),

        Commands::Doctor {
            input,
            config,
            json,
        } => cmd_doctor(input.as_deref(), config.as_deref(), json),
    }
}

fn load_config(study: &StudyArgs) -> Result<SnoozelessConfig, SnoozelessCliError> {
    let mut config = match &study.config {
        Some(path) => SnoozelessConfig::from_path(path)?,
        None => SnoozelessConfig::default(),
    };
    if study.seed.is_some() {
        config.forest.seed = study.seed;
    }
    if let Some(trees) = study.trees {
        config.forest.n_trees = trees;
    }
    config.validate()?;
    Ok(config)
}

fn load_analyzer(study: &StudyArgs) -> Result<SleepAnalyzer, SnoozelessCliError> {
    let config = load_config(study)?;
    Ok(SleepAnalyzer::from_path(&study.input, config)?)
}

fn cmd_predict(
    study: &StudyArgs,
    target: &str,
    answers: &AnswerArgs,
    json: bool,
) -> Result<(), SnoozelessCliError> {
    let target: TargetField = target.parse()?;
    let answers = answers.to_answers()?;
    let mut analyzer = load_analyzer(study)?;
    let prediction = analyzer.predict(target, &answers)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        println!("Predicted {}: {:.1}%", prediction.target, prediction.value);
        println!(
            "Model {} (seed {}, {} training rows)",
            prediction.model_id, prediction.seed, prediction.training_rows
        );
    }
    Ok(())
}

fn cmd_importance(
    study: &StudyArgs,
    target: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<(), SnoozelessCliError> {
    let target: TargetField = target.parse()?;
    let mut analyzer = load_analyzer(study)?;
    let report = analyzer.importance_report(target, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Feature importance for {}", report.target);
        println!("==============================");
        for (rank, entry) in report.features.iter().enumerate() {
            println!("{:>2}. {:<50} {:.4}", rank + 1, entry.feature, entry.importance);
        }
    }
    Ok(())
}

fn cmd_evaluate(
    study: &StudyArgs,
    target: &str,
    folds: Option<usize>,
    json: bool,
) -> Result<(), SnoozelessCliError> {
    let target: TargetField = target.parse()?;
    let mut config = load_config(study)?;
    if let Some(folds) = folds {
        config.cross_validation_folds = folds;
    }
    config.validate()?;
    let analyzer = SleepAnalyzer::from_path(&study.input, config)?;

    let cross_validation = analyzer.cross_validate(target)?;
    let linear = analyzer.linear_baseline(target)?;

    if json {
        let report = EvaluationReport {
            cross_validation,
            linear_baseline: linear,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Evaluation for {}", target);
        println!("==============================");
        println!(
            "Random forest, {}-fold r2: {}  (mse {:.3})",
            cross_validation.folds,
            format_r2(cross_validation.r_squared),
            cross_validation.mse
        );
        println!(
            "Linear baseline, in-sample r2: {}",
            format_r2(linear.r_squared)
        );
        println!("\nLinear coefficients (by magnitude):");
        for c in linear.ranked_coefficients() {
            println!("  {:<50} {:+.4}", c.feature, c.weight);
        }
    }
    Ok(())
}

fn cmd_hygiene(
    study: &StudyArgs,
    answers: &AnswerArgs,
    json: bool,
) -> Result<(), SnoozelessCliError> {
    let answers = answers.to_answers()?;
    let analyzer = load_analyzer(study)?;
    let comparison: HygieneComparison = analyzer.hygiene_comparison(&answers)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        println!("{:<50} {:>8} {:>8}", "Axis", "You", "Average");
        let study_axes = comparison.study.axes();
        for ((name, user), (_, average)) in comparison.user.axes().iter().zip(study_axes.iter()) {
            println!("{:<50} {:>8.2} {:>8.2}", name, user, average);
        }
    }
    Ok(())
}

fn cmd_summary(
    study: &StudyArgs,
    group: &str,
    stat: &str,
    trend: Option<&str>,
    range: Option<&[f64]>,
    json: bool,
) -> Result<(), SnoozelessCliError> {
    let analyzer = load_analyzer(study)?;
    let mut table = analyzer.dataset().cleaned().clone();
    if let Some(&[min, max]) = range {
        table = table.filter_range(stat, min, max)?;
    }

    let groups = distribution_by_group(&table, group, stat)?;
    let trend = trend.map(|x| fit_trend(&table, x, stat)).transpose()?;

    if json {
        let report = SummaryReport {
            rows: table.len(),
            groups,
            trend,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} by {} ({} rows)", stat, group, table.len());
        for g in &groups {
            println!(
                "  {:<12} n={:<4} mean={:.2} sd={:.2} median={:.2} [{:.2}, {:.2}]",
                g.group, g.count, g.mean, g.std_dev, g.median, g.min, g.max
            );
        }
        if let Some(t) = trend {
            println!(
                "Trend: {} = {:.4} * {} + {:.4} (r2 {})",
                t.y,
                t.slope,
                t.x,
                t.intercept,
                format_r2(t.r_squared)
            );
        }
    }
    Ok(())
}

fn cmd_synth(rows: usize, seed: u64, output: &Path) -> Result<(), SnoozelessCliError> {
    let csv = SyntheticStudy::generate(rows, seed).to_csv_string()?;
    if output.to_string_lossy() == "-" {
        io::stdout().write_all(csv.as_bytes())?;
    } else {
        fs::write(output, csv)?;
        log::info!("wrote {} synthetic rows to {}", rows, output.display());
    }
    Ok(())
}

fn cmd_doctor(
    input: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), SnoozelessCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Snoozeless version {}", SNOOZELESS_VERSION),
    });

    let loaded_config = match config {
        Some(path) => match SnoozelessConfig::from_path(path) {
            Ok(cfg) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Config valid ({} trees)", cfg.forest.n_trees),
                });
                cfg
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                });
                SnoozelessConfig::default()
            }
        },
        None => SnoozelessConfig::default(),
    };

    if let Some(path) = input {
        if path.exists() {
            match SleepAnalyzer::from_path(path, loaded_config) {
                Ok(analyzer) => {
                    let dataset = analyzer.dataset();
                    checks.push(DoctorCheck {
                        name: "study".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "{} complete rows, {} features",
                            dataset.len(),
                            dataset.features().len()
                        ),
                    });
                    if dataset.len() < 30 {
                        checks.push(DoctorCheck {
                            name: "study_size".to_string(),
                            status: CheckStatus::Warning,
                            message: "Fewer than 30 rows; predictions will be noisy".to_string(),
                        });
                    }
                }
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "study".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot prepare study file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "study".to_string(),
                status: CheckStatus::Error,
                message: "Study file does not exist".to_string(),
            });
        }
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: SNOOZELESS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Snoozeless Doctor Report");
        println!("========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(SnoozelessCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn format_r2(r2: Option<f64>) -> String {
    r2.map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

// Error types

#[derive(Debug)]
enum SnoozelessCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for SnoozelessCliError {
    fn from(e: io::Error) -> Self {
        SnoozelessCliError::Io(e)
    }
}

impl From<ComputeError> for SnoozelessCliError {
    fn from(e: ComputeError) -> Self {
        SnoozelessCliError::Compute(e)
    }
}

impl From<serde_json::Error> for SnoozelessCliError {
    fn from(e: serde_json::Error) -> Self {
        SnoozelessCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SnoozelessCliError> for CliError {
    fn from(e: SnoozelessCliError) -> Self {
        match e {
            SnoozelessCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SnoozelessCliError::Compute(e) => {
                let (code, hint) = compute_error_hint(&e);
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            SnoozelessCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SnoozelessCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

fn compute_error_hint(e: &ComputeError) -> (&'static str, &'static str) {
    match e {
        ComputeError::ParseError(_) => (
            "PARSE_ERROR",
            "Bedtime and wake time must look like 'YYYY-MM-DD HH:MM:SS'",
        ),
        ComputeError::InsufficientData(_) => (
            "INSUFFICIENT_DATA",
            "The study needs more complete rows",
        ),
        ComputeError::UnknownFeature(_) => (
            "UNKNOWN_FEATURE",
            "Check column and target names; run 'snoozeless doctor' on the input",
        ),
        ComputeError::EncodingMismatch(_) => (
            "ENCODING_MISMATCH",
            "Categorical answers must match categories seen in the study",
        ),
        ComputeError::InvalidValue(_) | ComputeError::InvalidInput(_) => {
            ("INVALID_INPUT", "Check argument values and ranges")
        }
        ComputeError::ModelError(_) => ("MODEL_ERROR", "Try different forest settings"),
        ComputeError::ConfigError(_) => ("CONFIG_ERROR", "Fix the configuration file"),
        ComputeError::CsvError(_) => ("CSV_ERROR", "Check the CSV header and row lengths"),
        ComputeError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
        ComputeError::IoError(_) => ("IO_ERROR", "Check file paths and permissions"),
    }
}

// Report types

#[derive(serde::Serialize)]
struct EvaluationReport {
    cross_validation: snoozeless::evaluation::CrossValidation,
    linear_baseline: snoozeless::linear::LinearBaseline,
}

#[derive(serde::Serialize)]
struct SummaryReport {
    rows: usize,
    groups: Vec<snoozeless::summary::GroupSummary>,
    trend: Option<snoozeless::summary::TrendLine>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
