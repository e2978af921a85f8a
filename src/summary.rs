//! Descriptive summaries
//!
//! Per-category distribution statistics and least-squares trend lines over
//! table columns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ComputeError;
use crate::table::{Cell, SleepTable};

/// Distribution of one statistic within one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; zero for a single value
    pub std_dev: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl GroupSummary {
    fn from_values(group: String, mut values: Vec<f64>) -> Self {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std_dev = if count > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self {
            group,
            count,
            mean,
            std_dev,
            min: values[0],
            q1: quantile(&values, 0.25),
            median: quantile(&values, 0.5),
            q3: quantile(&values, 0.75),
            max: values[count - 1],
        }
    }
}

/// Linear-interpolated quantile of sorted, non-empty values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

/// Summaries of `stat` for each distinct value of `group`, ordered by group.
///
/// Numeric group values are labelled by their display form.
pub fn distribution_by_group(
    table: &SleepTable,
    group: &str,
    stat: &str,
) -> Result<Vec<GroupSummary>, ComputeError> {
    let group_idx = table.column_index(group)?;
    let values = table.numeric_column(stat)?;

    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (row, value) in table.rows().iter().zip(values) {
        let label = match &row[group_idx] {
            Cell::Text(text) => text.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Null => continue,
        };
        groups.entry(label).or_default().push(value);
    }

    Ok(groups
        .into_iter()
        .map(|(label, values)| GroupSummary::from_values(label, values))
        .collect())
}

/// Ordinary least-squares line `y = slope * x + intercept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    pub x: String,
    pub y: String,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: Option<f64>,
    pub points: usize,
}

impl TrendLine {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

pub fn fit_trend(table: &SleepTable, x: &str, y: &str) -> Result<TrendLine, ComputeError> {
    let xs = table.numeric_column(x)?;
    let ys = table.numeric_column(y)?;
    let n = xs.len();
    if n < 2 {
        return Err(ComputeError::InsufficientData(format!(
            "trend needs at least 2 points, got {n}"
        )));
    }

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;
    let sxx: f64 = xs.iter().map(|v| (v - mean_x).powi(2)).sum();
    let sxy: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum();
    if sxx == 0.0 {
        return Err(ComputeError::InsufficientData(format!(
            "'{x}' has zero variance"
        )));
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let fitted: Vec<f64> = xs.iter().map(|v| slope * v + intercept).collect();

    Ok(TrendLine {
        x: x.to_string(),
        y: y.to_string(),
        slope,
        intercept,
        r_squared: crate::evaluation::r2_score(&ys, &fitted),
        points: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SleepTable {
        SleepTable::from_csv_str(
            "Gender,Age,Sleep efficiency\n\
             Male,20,70\n\
             Female,30,80\n\
             Male,40,90\n\
             Female,50,100\n\
             Male,60,110\n",
        )
        .unwrap()
    }

    #[test]
    fn test_distribution_by_group() {
        let summaries = distribution_by_group(&table(), "Gender", "Sleep efficiency").unwrap();
        assert_eq!(summaries.len(), 2);

        let female = &summaries[0];
        assert_eq!(female.group, "Female");
        assert_eq!(female.count, 2);
        assert_eq!(female.mean, 90.0);
        assert_eq!(female.median, 90.0);

        let male = &summaries[1];
        assert_eq!(male.count, 3);
        assert_eq!((male.min, male.q1, male.median, male.q3, male.max), (70.0, 80.0, 90.0, 100.0, 110.0));
        assert!((male.std_dev - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_trend() {
        let trend = fit_trend(&table(), "Age", "Sleep efficiency").unwrap();
        assert!((trend.slope - 1.0).abs() < 1e-12);
        assert!((trend.intercept - 50.0).abs() < 1e-12);
        assert_eq!(trend.r_squared, Some(1.0));
        assert_eq!(trend.at(35.0), 85.0);
    }

    #[test]
    fn test_trend_needs_spread() {
        let flat = SleepTable::from_csv_str("a,b\n1,2\n1,3\n").unwrap();
        assert!(matches!(
            fit_trend(&flat, "a", "b"),
            Err(ComputeError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_unknown_stat() {
        assert!(matches!(
            distribution_by_group(&table(), "Gender", "Dreams"),
            Err(ComputeError::UnknownFeature(_))
        ));
    }
}
