//! Clock-time parsing
//!
//! Converts the study's text timestamps ("2021-03-06 01:00:00") into
//! fractional hours of the day. Only the time of day is read: the date
//! token is ignored whatever its layout, and so are seconds.

use chrono::{NaiveTime, Timelike};

use crate::error::ComputeError;
use crate::table::{Cell, SleepTable};

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Parse a timestamp into `HH + MM/60`
pub fn parse_clock_hours(text: &str) -> Result<f64, ComputeError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let time = match tokens.as_slice() {
        [_, time] | [time] => parse_time_of_day(time),
        _ => None,
    };

    time.map(|t| t.hour() as f64 + t.minute() as f64 / 60.0)
        .ok_or_else(|| ComputeError::ParseError(format!("malformed timestamp '{text}'")))
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

/// Parse a time cell. Cells that already hold an hour of day pass through.
pub fn parse_time_cell(cell: &Cell) -> Result<f64, ComputeError> {
    match cell {
        Cell::Number(hours) if (0.0..24.0).contains(hours) => Ok(*hours),
        Cell::Number(hours) => Err(ComputeError::ParseError(format!(
            "hour of day {hours} outside [0, 24)"
        ))),
        Cell::Text(text) => parse_clock_hours(text),
        Cell::Null => Err(ComputeError::ParseError("missing timestamp".to_string())),
    }
}

/// Hours slept between bedtime and wake time, wrapping past midnight
pub fn sleep_duration_hours(bedtime: f64, wake_time: f64) -> f64 {
    if wake_time < bedtime {
        wake_time + 24.0 - bedtime
    } else {
        wake_time - bedtime
    }
}

/// Column-level time parser
pub struct TimeParser;

impl TimeParser {
    /// Rewrite the named columns as fractional hours
    pub fn parse_columns(
        mut table: SleepTable,
        columns: &[&str],
    ) -> Result<SleepTable, ComputeError> {
        for column in columns {
            table.map_column(column, |cell| parse_time_cell(cell).map(Cell::Number))?;
            log::debug!("parsed time column '{column}'");
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_timestamp() {
        assert_eq!(parse_clock_hours("2023-01-01 23:30:00").unwrap(), 23.5);
        assert_eq!(parse_clock_hours("2021-03-06 01:00:00").unwrap(), 1.0);
    }

    #[test]
    fn test_date_layout_ignored() {
        assert_eq!(parse_clock_hours("3/6/2021 01:00:00").unwrap(), 1.0);
        assert_eq!(parse_clock_hours("06.03.2021 22:30").unwrap(), 22.5);
    }

    #[test]
    fn test_seconds_ignored() {
        let hours = parse_clock_hours("2021-12-05 07:15:59").unwrap();
        assert!((hours - 7.25).abs() < 1e-12);
    }

    #[test]
    fn test_time_only() {
        assert_eq!(parse_clock_hours("22:45").unwrap(), 22.75);
        assert_eq!(parse_clock_hours("06:30:00").unwrap(), 6.5);
    }

    #[test]
    fn test_malformed_timestamp() {
        for bad in ["", "yesterday", "2023-01-01 25:00:00", "2023-01-01", "a b c"] {
            assert!(
                matches!(parse_clock_hours(bad), Err(ComputeError::ParseError(_))),
                "expected parse error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_numeric_cell_is_idempotent() {
        assert_eq!(parse_time_cell(&Cell::Number(23.5)).unwrap(), 23.5);
        assert_eq!(parse_time_cell(&Cell::Number(0.0)).unwrap(), 0.0);
        assert!(parse_time_cell(&Cell::Number(24.0)).is_err());
        assert!(parse_time_cell(&Cell::Null).is_err());
    }

    #[test]
    fn test_duration_wraparound() {
        assert_eq!(sleep_duration_hours(23.0, 7.0), 8.0);
        assert_eq!(sleep_duration_hours(22.0, 23.0), 1.0);
        assert_eq!(sleep_duration_hours(1.5, 9.0), 7.5);
    }

    #[test]
    fn test_parse_columns_twice() {
        let table = SleepTable::from_csv_str(
            "Bedtime,Wakeup time\n2021-03-06 01:00:00,2021-03-06 07:00:00\n",
        )
        .unwrap();
        let parsed = TimeParser::parse_columns(table, &["Bedtime", "Wakeup time"]).unwrap();
        assert_eq!(parsed.rows()[0], vec![Cell::Number(1.0), Cell::Number(7.0)]);

        let reparsed =
            TimeParser::parse_columns(parsed.clone(), &["Bedtime", "Wakeup time"]).unwrap();
        assert_eq!(reparsed, parsed);
    }
}
