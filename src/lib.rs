//! EV fleet charging simulation and hex-grid demand aggregation.
//!
//! Vehicles replay their trajectories and stop to charge where the location
//! predictor says they will. The resulting charging events are spread over
//! hours of the day and binned onto an H3 grid covering a region.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
/// Hourly resampling, hex grids, and demand tensor aggregation.
pub mod demand;
pub mod error;
pub mod io;
pub mod predictors;
pub mod runner;
/// Per-vehicle charging simulation and the fleet driver.
pub mod sim;
pub mod summary;
pub mod synthetic;
