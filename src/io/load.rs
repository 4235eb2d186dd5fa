//! CSV loaders for trajectories and charging history.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::SimError;
use crate::predictors::{ChargingHistory, HistoryRecord};
use crate::sim::trajectory::{Trajectory, TrajectorySample};

/// Whole-second timestamp layout for input CSVs and hourly periods.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct TrajectoryRow {
    vehicle_id: String,
    odometer: f64,
    timestamp: String,
    latitude: f64,
    longitude: f64,
}

/// Parses a naive local timestamp, accepting a space or `T` separator.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, SimError> {
    let trimmed = value.trim();
    NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|_| SimError::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// Reads trajectories from CSV with columns
/// `vehicle_id,odometer,timestamp,latitude,longitude`.
///
/// Rows are grouped by vehicle in order of first appearance, and each
/// vehicle's samples are stably sorted by odometer.
///
/// # Errors
///
/// Returns a CSV, timestamp, or trajectory validation error.
pub fn read_trajectories(reader: impl Read) -> Result<Vec<Trajectory>, SimError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<TrajectorySample>> = HashMap::new();
    for row in rdr.deserialize::<TrajectoryRow>() {
        let row = row?;
        let sample = TrajectorySample {
            odometer: row.odometer,
            timestamp: parse_timestamp(&row.timestamp)?,
            latitude: row.latitude,
            longitude: row.longitude,
        };
        grouped
            .entry(row.vehicle_id.clone())
            .or_insert_with(|| {
                order.push(row.vehicle_id);
                Vec::new()
            })
            .push(sample);
    }

    let trajectories = order
        .into_iter()
        .map(|id| {
            let samples = grouped.remove(&id).unwrap_or_default();
            Trajectory::from_unordered(id, samples)
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(vehicles = trajectories.len(), "loaded trajectories");
    Ok(trajectories)
}

pub fn load_trajectories(path: &Path) -> Result<Vec<Trajectory>, SimError> {
    read_trajectories(open(path)?)
}

/// Reads charging history from CSV with at least `start_soc,delta_soc`.
/// Other columns are ignored.
pub fn read_history(reader: impl Read) -> Result<ChargingHistory, SimError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let records = rdr
        .deserialize::<HistoryRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    let history = ChargingHistory::new(records)?;
    tracing::info!(records = history.len(), "loaded charging history");
    Ok(history)
}

pub fn load_history(path: &Path) -> Result<ChargingHistory, SimError> {
    read_history(open(path)?)
}

fn open(path: &Path) -> Result<File, SimError> {
    File::open(path).map_err(|source| SimError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_and_sorts_trajectory_rows() {
        let input = "\
vehicle_id,odometer,timestamp,latitude,longitude
b,10.0,2021-03-01 09:00:00,34.10,-118.30
a,5.0,2021-03-01 08:30:00,34.00,-118.20
b,0.0,2021-03-01 08:00:00,34.00,-118.30
a,0.0,2021-03-01T08:00:00,34.01,-118.21
";
        let trajectories = read_trajectories(input.as_bytes()).expect("valid CSV");
        assert_eq!(trajectories.len(), 2);
        assert_eq!(trajectories[0].vehicle_id(), "b");
        assert_eq!(trajectories[0].min_odometer(), 0.0);
        assert_eq!(trajectories[0].max_odometer(), 10.0);
        assert_eq!(trajectories[1].vehicle_id(), "a");
        assert_eq!(trajectories[1].first().latitude, 34.01);
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let input =
            "vehicle_id,odometer,timestamp,latitude,longitude\na,0.0,yesterday,34.0,-118.0\n";
        let err = read_trajectories(input.as_bytes()).expect_err("must fail");
        assert!(matches!(err, SimError::InvalidTimestamp { .. }));
    }

    #[test]
    fn history_ignores_extra_columns() {
        let input = "\
session_id,start_soc,end_soc,delta_soc,charger
1,20.0,70.0,50.0,dcfc
2,45.5,80.0,34.5,l2
";
        let history = read_history(input.as_bytes()).expect("valid CSV");
        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[1].delta_soc, 34.5);
    }

    #[test]
    fn empty_history_is_an_error() {
        let err = read_history("start_soc,delta_soc\n".as_bytes()).expect_err("must fail");
        assert!(matches!(err, SimError::EmptyHistory));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_history(Path::new("/nonexistent/history.csv")).expect_err("must fail");
        assert!(err.to_string().contains("/nonexistent/history.csv"));
    }
}
