//! Categorical encoding
//!
//! Binary nominal columns (biological sex, smoking status) are replaced by a
//! single 0/1 indicator column carrying the field's own name. The
//! alphabetically first category is the reference and encodes as 0.
//!
//! The mapping is returned as an explicit `EncodingMap` so prediction-time
//! answers are encoded with exactly the convention used for training.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::table::{Cell, SleepTable};

/// Current encoding map format version
pub const ENCODING_VERSION: u32 = 1;

/// Encoding of one binary categorical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryEncoding {
    pub field: String,
    /// Category encoded as 0 (dropped)
    pub reference: String,
    /// Category encoded as 1
    pub indicator: String,
}

impl BinaryEncoding {
    pub fn encode(&self, value: &str) -> Result<f64, ComputeError> {
        if value == self.indicator {
            Ok(1.0)
        } else if value == self.reference {
            Ok(0.0)
        } else {
            Err(ComputeError::EncodingMismatch(format!(
                "'{}' was not observed for '{}' during training (expected '{}' or '{}')",
                value, self.field, self.reference, self.indicator
            )))
        }
    }

    pub fn decode(&self, flag: f64) -> Result<&str, ComputeError> {
        if flag == 1.0 {
            Ok(self.indicator.as_str())
        } else if flag == 0.0 {
            Ok(self.reference.as_str())
        } else {
            Err(ComputeError::EncodingMismatch(format!(
                "indicator for '{}' must be 0 or 1, got {}",
                self.field, flag
            )))
        }
    }
}

/// Versioned set of field encodings produced at training time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingMap {
    pub version: u32,
    pub fields: Vec<BinaryEncoding>,
}

impl EncodingMap {
    pub fn get(&self, field: &str) -> Result<&BinaryEncoding, ComputeError> {
        self.fields
            .iter()
            .find(|e| e.field == field)
            .ok_or_else(|| ComputeError::UnknownFeature(format!("'{field}' has no encoding")))
    }

    pub fn encode_value(&self, field: &str, value: &str) -> Result<f64, ComputeError> {
        self.get(field)?.encode(value)
    }

    pub fn decode_value(&self, field: &str, flag: f64) -> Result<&str, ComputeError> {
        self.get(field)?.decode(flag)
    }

    /// Replace each encoded field's text column with its indicator column.
    ///
    /// Indicator columns are appended in map order. Columns that already
    /// hold 0/1 numbers are left where they are.
    pub fn apply(&self, table: &SleepTable) -> Result<SleepTable, ComputeError> {
        let mut encoded = table.clone();
        for encoding in &self.fields {
            let idx = encoded.column_index(&encoding.field)?;
            let already_encoded = encoded
                .rows()
                .iter()
                .all(|row| matches!(row[idx], Cell::Number(v) if v == 0.0 || v == 1.0));
            if already_encoded {
                continue;
            }

            let cells = encoded.remove_column(&encoding.field)?;
            let indicators = cells
                .iter()
                .map(|cell| match cell {
                    Cell::Text(value) => encoding.encode(value).map(Cell::Number),
                    Cell::Number(v) => encoding.decode(*v).map(|_| Cell::Number(*v)),
                    Cell::Null => Err(ComputeError::EncodingMismatch(format!(
                        "missing value in '{}'",
                        encoding.field
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            encoded.push_column(&encoding.field, indicators)?;
        }
        Ok(encoded)
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let map: EncodingMap = serde_json::from_str(json)?;
        if map.version != ENCODING_VERSION {
            return Err(ComputeError::EncodingMismatch(format!(
                "encoding map version {} is not supported (expected {})",
                map.version, ENCODING_VERSION
            )));
        }
        Ok(map)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string(self).map_err(ComputeError::JsonError)
    }
}

/// Encoder deriving and applying binary indicator encodings
pub struct CategoricalEncoder;

impl CategoricalEncoder {
    /// Derive an encoding for each field from the categories observed in `table`
    pub fn fit(table: &SleepTable, fields: &[&str]) -> Result<EncodingMap, ComputeError> {
        let mut encodings = Vec::with_capacity(fields.len());
        for field in fields {
            let categories = table.categories(field)?;
            let mut iter = categories.into_iter();
            match (iter.next(), iter.next(), iter.next()) {
                (Some(reference), Some(indicator), None) => {
                    log::debug!("encoding '{field}': {reference} -> 0, {indicator} -> 1");
                    encodings.push(BinaryEncoding {
                        field: field.to_string(),
                        reference,
                        indicator,
                    });
                }
                _ => {
                    return Err(ComputeError::EncodingMismatch(format!(
                        "'{}' must have exactly two categories, found {}",
                        field,
                        table.categories(field)?.len()
                    )));
                }
            }
        }
        Ok(EncodingMap {
            version: ENCODING_VERSION,
            fields: encodings,
        })
    }

    /// Fit encodings for `fields` and apply them to `table`
    pub fn encode(
        table: &SleepTable,
        fields: &[&str],
    ) -> Result<(SleepTable, EncodingMap), ComputeError> {
        let map = Self::fit(table, fields)?;
        let encoded = map.apply(table)?;
        Ok((encoded, map))
    }
}
