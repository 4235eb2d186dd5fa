//! Error type shared by the simulation, resampling, and aggregation stages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Any failure that aborts a simulation run.
///
/// No stage publishes partial output: the first error short-circuits the
/// pipeline and is reported by the caller.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("trajectory for vehicle `{vehicle_id}` has no samples")]
    EmptyTrajectory { vehicle_id: String },

    #[error("trajectory for vehicle `{vehicle_id}` is invalid: {message}")]
    InvalidTrajectory { vehicle_id: String, message: String },

    #[error(
        "location prediction for vehicle `{vehicle_id}` does not advance the odometer \
         (got {miles} miles at odometer {odometer})"
    )]
    NoProgress {
        vehicle_id: String,
        miles: f64,
        odometer: f64,
    },

    #[error("charging history is empty")]
    EmptyHistory,

    #[error("region is invalid: {0}")]
    InvalidRegion(String),

    #[error("H3 resolution {0} is out of range (0..=15)")]
    InvalidResolution(u8),

    #[error("coordinate ({latitude}, {longitude}) cannot be indexed: {message}")]
    InvalidCoordinate {
        latitude: f64,
        longitude: f64,
        message: String,
    },

    #[error("invalid timestamp `{value}`")]
    InvalidTimestamp { value: String },

    #[error("a fleet worker thread panicked")]
    WorkerPanicked,

    #[error("hour {0} is outside 0..24")]
    InvalidHour(u32),

    #[error("cannot read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
