//! Record cleaning
//!
//! This module prepares the raw study table for modelling:
//! - Rows with any missing field are dropped (no imputation)
//! - Sleep efficiency is rescaled from a ratio to a percentage, once
//! - Ambiguous column names gain unit suffixes
//! - Bedtime and wake time are parsed into hours of day

use crate::error::ComputeError;
use crate::schema;
use crate::table::{Cell, SleepTable};
use crate::time::TimeParser;

/// Default tolerance (percentage points) for REM + deep + light ≈ 100
pub const DEFAULT_STAGE_SUM_TOLERANCE: f64 = 5.0;

/// Cleaner for converting raw study tables to model-ready tables
#[derive(Debug, Clone)]
pub struct RecordCleaner {
    stage_sum_tolerance: f64,
}

impl Default for RecordCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_STAGE_SUM_TOLERANCE)
    }
}

impl RecordCleaner {
    pub fn new(stage_sum_tolerance: f64) -> Self {
        Self {
            stage_sum_tolerance,
        }
    }

    /// Drop incomplete rows, rescale efficiency, rename columns.
    ///
    /// Safe to call on an already cleaned table: nothing is dropped and the
    /// efficiency column is not rescaled a second time.
    pub fn clean(&self, mut table: SleepTable) -> Result<SleepTable, ComputeError> {
        let rows_in = table.len();
        table.retain_rows(|row| !row.iter().any(Cell::is_null));
        let dropped = rows_in - table.len();
        if dropped > 0 {
            log::warn!("dropped {dropped} of {rows_in} rows with missing fields");
        }

        if already_cleaned(&table) {
            table.mark_efficiency_scaled();
        } else {
            scale_efficiency(&mut table)?;
        }

        for (from, to) in schema::COLUMN_RENAMES {
            if table.rename_column(from, to) {
                log::debug!("renamed column '{from}' to '{to}'");
            }
        }

        let violations = self.stage_sum_violations(&table)?;
        if !violations.is_empty() {
            log::warn!(
                "{} rows have sleep stage percentages deviating from 100 by more than {}",
                violations.len(),
                self.stage_sum_tolerance
            );
        }

        Ok(table)
    }

    /// Clean, then parse the bedtime and wake time columns
    pub fn prepare(&self, table: SleepTable) -> Result<SleepTable, ComputeError> {
        let cleaned = self.clean(table)?;
        TimeParser::parse_columns(cleaned, &schema::TIME_COLUMNS)
    }

    /// Indices of rows whose stage percentages do not sum to ~100.
    ///
    /// Tables without all three stage columns have no violations.
    pub fn stage_sum_violations(&self, table: &SleepTable) -> Result<Vec<usize>, ComputeError> {
        if !schema::STAGE_COLUMNS.iter().all(|c| table.has_column(c)) {
            return Ok(Vec::new());
        }
        let rem = table.numeric_column(schema::REM_PERCENTAGE)?;
        let deep = table.numeric_column(schema::DEEP_PERCENTAGE)?;
        let light = table.numeric_column(schema::LIGHT_PERCENTAGE)?;

        Ok((0..table.len())
            .filter(|&i| (rem[i] + deep[i] + light[i] - 100.0).abs() > self.stage_sum_tolerance)
            .collect())
    }
}

/// True when `clean` has already run on this table.
///
/// The in-memory flag does not survive a CSV round trip, so the unit-suffixed
/// column names written by `clean` count as proof too.
fn already_cleaned(table: &SleepTable) -> bool {
    table.is_efficiency_scaled()
        || schema::COLUMN_RENAMES
            .iter()
            .any(|(_, cleaned)| table.has_column(cleaned))
}

/// Multiply sleep efficiency by 100 and flag the table as scaled.
///
/// A column holding any value above 1.0 is already a percentage and is
/// left untouched.
fn scale_efficiency(table: &mut SleepTable) -> Result<(), ComputeError> {
    let idx = table.column_index(schema::SLEEP_EFFICIENCY)?;
    let above_one = table
        .rows()
        .iter()
        .filter(|row| row[idx].as_f64().is_some_and(|v| v > 1.0))
        .count();
    if above_one > 0 {
        log::warn!(
            "{above_one} sleep efficiency values exceed 1.0; treating the column as percentages"
        );
    } else {
        table.map_column(schema::SLEEP_EFFICIENCY, |cell| match cell {
            Cell::Number(ratio) => Ok(Cell::Number(ratio * 100.0)),
            other => Err(ComputeError::InvalidValue(format!(
                "sleep efficiency must be numeric, found {other:?}"
            ))),
        })?;
    }
    table.mark_efficiency_scaled();
    Ok(())
}
