//! Extraction of the windows each pipeline step consumes
//!
//! Time anchors, relative to the last timestamp `now` of a table:
//! - history: `previous_days` whole days ending at midnight of `now`
//! - realized/covariates: from one hour before midnight of `now` up to
//!   `now`, followed by the tail of the previous day
//! - week-ago: the day that starts six days before that cut point

use chrono::{Duration, NaiveDateTime};

use super::{Column, DataError, MeasurementTable};
use crate::domain::{HistoryWindow, Quantity, TimeSeries, HORIZON, SLOT_MINUTES};

/// PV power (kW) produced per unit of irradiance (W/m²).
pub const IRRADIANCE_TO_POWER: f64 = 6.21 / 1000.0;

/// Measured PV power is in W, the band is in kW.
const PV_POWER_DIVISOR: f64 = 1000.0;

/// Demand measurements are scaled down by this factor.
const DEMAND_DIVISOR: f64 = 10.0;

fn slot() -> Duration {
    Duration::minutes(SLOT_MINUTES)
}

fn midnight(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_time(chrono::NaiveTime::MIN)
}

/// Cut points of the "today so far plus yesterday's tail" composite.
#[derive(Debug, Clone, Copy)]
struct Anchors {
    now: NaiveDateTime,
    cut: NaiveDateTime,
}

impl Anchors {
    fn of(table: &MeasurementTable) -> Result<Self, DataError> {
        let now = table.last_timestamp()?;
        Ok(Self {
            now,
            cut: midnight(now) - Duration::hours(1),
        })
    }

    fn composite(&self, table: &MeasurementTable, column: Column) -> Result<Vec<f64>, DataError> {
        let mut values = table.slice(column, self.cut, self.now)?.to_vec();
        let tail_from = self.now - Duration::days(1) + slot();
        values.extend_from_slice(table.slice(column, tail_from, self.cut - slot())?);
        values.truncate(HORIZON);
        require(column, &values, HORIZON)?;
        Ok(values)
    }

    fn today_mean(&self, table: &MeasurementTable, column: Column) -> Result<f64, DataError> {
        let values = table.slice(column, self.cut, self.now)?;
        if values.is_empty() {
            return Err(DataError::InsufficientData {
                column: column.to_string(),
                required: 1,
                actual: 0,
            });
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    fn week_ago(&self, table: &MeasurementTable, column: Column) -> Result<Vec<f64>, DataError> {
        let from = self.cut - Duration::days(6) + slot();
        let to = self.cut - Duration::days(5);
        let mut values = table.slice(column, from, to)?.to_vec();
        values.truncate(HORIZON);
        require(column, &values, HORIZON)?;
        Ok(values)
    }
}

fn require(column: Column, values: &[f64], required: usize) -> Result<(), DataError> {
    if values.len() < required {
        return Err(DataError::InsufficientData {
            column: column.to_string(),
            required,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Source column and divisor of the strategy history for each quantity.
fn history_column(quantity: Quantity) -> (Column, f64) {
    match quantity {
        Quantity::Pv => (Column::PvPower, PV_POWER_DIVISOR),
        Quantity::ActiveDemand => (Column::ActiveDemand, DEMAND_DIVISOR),
        Quantity::ReactiveDemand => (Column::ReactiveDemand, DEMAND_DIVISOR),
    }
}

/// `days × 144` history ending at midnight of the table's last timestamp.
///
/// PV comes from measured power (W → kW); demands are divided by 10.
pub fn history_window(
    table: &MeasurementTable,
    quantity: Quantity,
    days: usize,
) -> Result<HistoryWindow, DataError> {
    let (column, divisor) = history_column(quantity);
    let end = midnight(table.last_timestamp()?);
    let from = end - Duration::days(days as i64) + slot();

    let values = table.slice(column, from, end)?;
    let required = days * HORIZON;
    require(column, values, required)?;

    let scaled = values[..required].iter().map(|v| v / divisor).collect();
    HistoryWindow::from_flat(scaled, days).ok_or(DataError::InsufficientData {
        column: column.to_string(),
        required,
        actual: values.len(),
    })
}

/// Realized values of the forecast day, one row of 144 slots.
///
/// PV is derived from irradiance; demands are divided by 10.
pub fn realized_window(
    table: &MeasurementTable,
    quantity: Quantity,
) -> Result<Vec<TimeSeries>, DataError> {
    let anchors = Anchors::of(table)?;
    let row: TimeSeries = match quantity {
        Quantity::Pv => anchors
            .composite(table, Column::Irradiance)?
            .into_iter()
            .map(|v| v * IRRADIANCE_TO_POWER)
            .collect(),
        Quantity::ActiveDemand | Quantity::ReactiveDemand => {
            let (column, divisor) = history_column(quantity);
            anchors
                .composite(table, column)?
                .into_iter()
                .map(|v| v / divisor)
                .collect()
        }
    };
    Ok(vec![row])
}

/// Per-slot covariate vectors for the bootstrap backend.
///
/// PV uses the weather composites and their today-so-far means (10 values
/// per slot). Both demands use the demand composites, their two-day-ahead
/// forecasts, the week-ago demand and the today-so-far demand means (8
/// values per slot).
pub fn covariates(table: &MeasurementTable, quantity: Quantity) -> Result<Vec<Vec<f64>>, DataError> {
    let anchors = Anchors::of(table)?;

    let features: Vec<Vec<f64>> = if quantity.is_pv() {
        let weather = [
            Column::Irradiance,
            Column::Pressure,
            Column::RelativeHumidity,
            Column::Temperature,
            Column::Wind,
        ];
        let mut features = weather
            .iter()
            .map(|c| anchors.composite(table, *c))
            .collect::<Result<Vec<_>, _>>()?;
        for c in weather {
            features.push(vec![anchors.today_mean(table, c)?; HORIZON]);
        }
        features
    } else {
        let mut features = [
            Column::ActiveDemand,
            Column::ReactiveDemand,
            Column::ActiveDemandLag2Forecast,
            Column::ReactiveDemandLag2Forecast,
        ]
        .iter()
        .map(|c| anchors.composite(table, *c))
        .collect::<Result<Vec<_>, _>>()?;
        features.push(anchors.week_ago(table, Column::ActiveDemand)?);
        features.push(anchors.week_ago(table, Column::ReactiveDemand)?);
        features.push(vec![anchors.today_mean(table, Column::ActiveDemand)?; HORIZON]);
        features.push(vec![anchors.today_mean(table, Column::ReactiveDemand)?; HORIZON]);
        features
    };

    Ok((0..HORIZON)
        .map(|t| features.iter().map(|f| f[t]).collect())
        .collect())
}
