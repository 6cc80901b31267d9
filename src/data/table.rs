use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::DataError;
use crate::domain::SLOT_MINUTES;

/// Named measurement columns provided by the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Global irradiance (W/m²)
    Irradiance,
    Pressure,
    RelativeHumidity,
    Temperature,
    Wind,
    ActiveDemand,
    ReactiveDemand,
    /// Two-day-ahead forecast of active demand
    ActiveDemandLag2Forecast,
    ReactiveDemandLag2Forecast,
    /// Generated PV power (W)
    PvPower,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Irradiance => "irra",
            Self::Pressure => "pres",
            Self::RelativeHumidity => "relh",
            Self::Temperature => "temp",
            Self::Wind => "wind",
            Self::ActiveDemand => "Pdem",
            Self::ReactiveDemand => "Qdem",
            Self::ActiveDemandLag2Forecast => "Pdemlag2_for",
            Self::ReactiveDemandLag2Forecast => "Qdemlag2_for",
            Self::PvPower => "P",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-indexed table of measurements at a 10-minute cadence.
///
/// Timestamps are strictly increasing; every column has one value per
/// timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable", into = "RawTable")]
pub struct MeasurementTable {
    timestamps: Vec<NaiveDateTime>,
    columns: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTable {
    timestamps: Vec<NaiveDateTime>,
    #[serde(default)]
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl TryFrom<RawTable> for MeasurementTable {
    type Error = DataError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        // JSON has no NaN; missing samples arrive as null
        let columns = raw
            .columns
            .into_iter()
            .map(|(name, values)| {
                let values = values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
                (name, values)
            })
            .collect();
        Self::new(raw.timestamps, columns)
    }
}

impl From<MeasurementTable> for RawTable {
    fn from(table: MeasurementTable) -> Self {
        let columns = table
            .columns
            .into_iter()
            .map(|(name, values)| {
                let values = values
                    .into_iter()
                    .map(|v| if v.is_finite() { Some(v) } else { None })
                    .collect();
                (name, values)
            })
            .collect();
        Self {
            timestamps: table.timestamps,
            columns,
        }
    }
}

impl MeasurementTable {
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, DataError> {
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DataError::UnsortedIndex);
        }
        for (name, values) in &columns {
            if values.len() != timestamps.len() {
                return Err(DataError::LengthMismatch {
                    column: name.clone(),
                    expected: timestamps.len(),
                    actual: values.len(),
                });
            }
        }
        Ok(Self {
            timestamps,
            columns,
        })
    }

    /// Empty table with `len` regular slots starting at `start`.
    pub fn regular(start: NaiveDateTime, len: usize) -> Self {
        let timestamps = (0..len)
            .map(|i| start + Duration::minutes(SLOT_MINUTES * i as i64))
            .collect();
        Self {
            timestamps,
            columns: BTreeMap::new(),
        }
    }

    /// Add or replace a column.
    pub fn with_column(mut self, column: Column, values: Vec<f64>) -> Result<Self, DataError> {
        if values.len() != self.timestamps.len() {
            return Err(DataError::LengthMismatch {
                column: column.to_string(),
                expected: self.timestamps.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(column.as_str().to_string(), values);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn last_timestamp(&self) -> Result<NaiveDateTime, DataError> {
        self.timestamps.last().copied().ok_or(DataError::Empty)
    }

    pub fn column(&self, column: Column) -> Result<&[f64], DataError> {
        self.columns
            .get(column.as_str())
            .map(Vec::as_slice)
            .ok_or_else(|| DataError::MissingColumn(column.to_string()))
    }

    /// Values of `column` with `from <= timestamp <= to`.
    pub fn slice(
        &self,
        column: Column,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<&[f64], DataError> {
        let values = self.column(column)?;
        let start = self.timestamps.partition_point(|t| *t < from);
        let end = self.timestamps.partition_point(|t| *t <= to);
        Ok(&values[start..end.max(start)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_slice_is_inclusive() {
        let table = MeasurementTable::regular(start(), 10)
            .with_column(Column::ActiveDemand, (0..10).map(f64::from).collect())
            .unwrap();
        let from = start() + Duration::minutes(20);
        let to = start() + Duration::minutes(50);
        assert_eq!(
            table.slice(Column::ActiveDemand, from, to).unwrap(),
            &[2.0, 3.0, 4.0, 5.0]
        );
        assert!(table
            .slice(Column::ActiveDemand, to, from)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_column() {
        let table = MeasurementTable::regular(start(), 3);
        assert!(matches!(
            table.column(Column::Wind),
            Err(DataError::MissingColumn(ref c)) if c == "wind"
        ));
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let err = MeasurementTable::regular(start(), 3)
            .with_column(Column::PvPower, vec![1.0])
            .unwrap_err();
        assert!(matches!(err, DataError::LengthMismatch { expected: 3, actual: 1, .. }));
    }

    #[test]
    fn test_json_nulls_become_nan() {
        let json = r#"{
            "timestamps": ["2024-05-01T00:00:00", "2024-05-01T00:10:00"],
            "columns": {"Pdem": [1.5, null]}
        }"#;
        let table: MeasurementTable = serde_json::from_str(json).unwrap();
        let values = table.column(Column::ActiveDemand).unwrap();
        assert_eq!(values[0], 1.5);
        assert!(values[1].is_nan());
    }

    #[test]
    fn test_json_rejects_unsorted_index() {
        let json = r#"{
            "timestamps": ["2024-05-01T00:10:00", "2024-05-01T00:00:00"],
            "columns": {}
        }"#;
        assert!(serde_json::from_str::<MeasurementTable>(json).is_err());
    }
}
