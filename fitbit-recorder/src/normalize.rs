//! Conversion of Fitbit weight logs into time-series points.
//!
//! Fitbit reports each measurement as a local date and time with no offset.
//! The point timestamp is that wall-clock time interpreted in the supplied
//! time zone (`chrono::Local` when recording), as UTC epoch seconds.

use chrono::TimeZone;
use fitbit_api::endpoints::weight::WeightRecord;
use std::fmt::Display;

use crate::error::RecorderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    Weight,
    Fat,
    Bmi,
}

impl Series {
    pub const ALL: [Series; 3] = [Series::Weight, Series::Fat, Series::Bmi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weight => "weight",
            Self::Fat => "fat",
            Self::Bmi => "bmi",
        }
    }

    fn value_of(&self, record: &WeightRecord) -> Option<f64> {
        match self {
            Self::Weight => record.weight,
            Self::Fat => record.fat,
            Self::Bmi => record.bmi,
        }
    }
}

impl Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub series: Series,
    pub value: f64,
    /// UTC epoch seconds
    pub timestamp: i64,
}

impl TimeSeriesPoint {
    /// InfluxDB line protocol, second precision: `weight value=66.6 1538664676`
    pub fn to_line_protocol(&self) -> String {
        format!("{} value={} {}", self.series, self.value, self.timestamp)
    }
}

/// Epoch seconds of the record's local date and time.
///
/// Ambiguous wall-clock times (the repeated hour when clocks go back) resolve
/// to the earlier instant. Times skipped by a DST jump are rejected.
pub fn record_timestamp<Tz: TimeZone>(record: &WeightRecord, tz: &Tz) -> Result<i64, RecorderError> {
    let local = record.date.and_time(record.time);
    tz.from_local_datetime(&local)
        .earliest()
        .map(|instant| instant.timestamp())
        .ok_or_else(|| RecorderError::InvalidRecord {
            log_id: record.log_id,
            message: format!("local time {} does not exist in this time zone", local),
        })
}

/// One point per measured field, in `weight`, `fat`, `bmi` order.
pub fn normalize<Tz: TimeZone>(
    record: &WeightRecord,
    tz: &Tz,
) -> Result<Vec<TimeSeriesPoint>, RecorderError> {
    let timestamp = record_timestamp(record, tz)?;

    let points = Series::ALL
        .iter()
        .filter_map(|series| {
            series.value_of(record).map(|value| TimeSeriesPoint {
                series: *series,
                value,
                timestamp,
            })
        })
        .collect();

    Ok(points)
}
