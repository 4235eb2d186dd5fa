//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::demand::{AggregationSpec, Region};
use crate::error::SimError;
use crate::predictors::SocWeighting;
use crate::sim::fleet::ExecutionMode;
use crate::sim::vehicle::VehicleSpec;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Seed and scheduling.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Vehicle model parameters.
    #[serde(default)]
    pub vehicle: VehicleConfig,
    /// Charger parameters.
    #[serde(default)]
    pub charging: ChargingConfig,
    /// Predictor selection and fitting.
    #[serde(default)]
    pub predictors: PredictorConfig,
    /// Hex grid resolution and aggregation verbs.
    #[serde(default)]
    pub grid: GridConfig,
    /// Operating region boundary.
    #[serde(default)]
    pub region: RegionConfig,
    /// Input data files.
    #[serde(default)]
    pub data: DataConfig,
    /// Synthetic input used when data files are absent.
    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

/// Seed and scheduling parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Master random seed; vehicle `i` uses `seed + i`.
    pub seed: u64,
    /// Worker threads for concurrent runs; `0` uses available parallelism.
    pub workers: usize,
    /// `"sequential"` or `"concurrent"`.
    pub mode: ExecutionMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            workers: 0,
            mode: ExecutionMode::Concurrent,
        }
    }
}

/// Vehicle model parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VehicleConfig {
    /// Range on a full battery (miles).
    pub range_miles: f64,
    /// Usable battery capacity (kWh).
    pub battery_capacity_kwh: f64,
    /// SOC at the start of each trajectory (0-100).
    pub initial_soc: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        let spec = VehicleSpec::default();
        Self {
            range_miles: spec.range_miles,
            battery_capacity_kwh: spec.battery_capacity_kwh,
            initial_soc: spec.initial_soc,
        }
    }
}

/// Charger parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChargingConfig {
    /// Constant charge rate (kW).
    pub charge_rate_kw: f64,
}

impl Default for ChargingConfig {
    fn default() -> Self {
        Self {
            charge_rate_kw: VehicleSpec::default().charge_rate_kw,
        }
    }
}

/// Location predictor variants.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    #[default]
    RandomSample,
}

/// Amount predictor variants.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountKind {
    #[default]
    Linear,
    RandomSample,
}

/// Predictor selection and fitting parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictorConfig {
    pub location: LocationKind,
    /// `"uniform"` or `"start_soc"`.
    pub location_weighting: SocWeighting,
    pub amount: AmountKind,
    /// Share of history held out when fitting the linear model, in `[0, 1)`.
    pub test_fraction: f64,
    /// Seed for the train/test split.
    pub split_seed: u64,
    /// Redraws allowed before a predictor falls back to the largest feasible value.
    pub max_resamples: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            location: LocationKind::RandomSample,
            location_weighting: SocWeighting::Uniform,
            amount: AmountKind::Linear,
            test_fraction: 0.33,
            split_seed: 42,
            max_resamples: 1000,
        }
    }
}

/// Hex grid parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// H3 resolution (0-15).
    pub resolution: u8,
    /// Per-field aggregation verbs.
    pub aggregation: AggregationSpec,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution: 8,
            aggregation: AggregationSpec::default(),
        }
    }
}

/// Central Los Angeles, as `[latitude, longitude]` vertices.
pub const DEFAULT_BOUNDARY: [[f64; 2]; 6] = [
    [33.95, -118.45],
    [33.95, -118.25],
    [34.00, -118.15],
    [34.15, -118.15],
    [34.15, -118.35],
    [34.08, -118.45],
];

/// Operating region boundary.
///
/// Exactly one of `boundary` and `geojson` is used; `geojson` wins when
/// both are given and validation reports the conflict.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionConfig {
    /// Inline ring of `[latitude, longitude]` vertices.
    pub boundary: Option<Vec<[f64; 2]>>,
    /// Path to a GeoJSON polygon file.
    pub geojson: Option<PathBuf>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            boundary: Some(DEFAULT_BOUNDARY.to_vec()),
            geojson: None,
        }
    }
}

impl RegionConfig {
    /// Loads the configured region.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidRegion`] when neither source is set or the
    /// geometry is invalid, and [`SimError::Read`] if the GeoJSON file
    /// cannot be read.
    pub fn load(&self) -> Result<Region, SimError> {
        match (&self.geojson, &self.boundary) {
            (Some(path), _) => Region::from_geojson_file(path),
            (None, Some(ring)) => Region::from_ring(ring),
            (None, None) => Err(SimError::InvalidRegion(
                "set region.boundary or region.geojson".to_string(),
            )),
        }
    }
}

/// Input data files. Missing files are replaced by synthetic data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// CSV with `vehicle_id,odometer,timestamp,latitude,longitude`.
    pub trajectories: Option<PathBuf>,
    /// CSV with at least `start_soc,delta_soc`.
    pub charging_history: Option<PathBuf>,
}

/// Synthetic fleet parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    /// Number of vehicles.
    pub vehicles: usize,
    /// Days of movement per vehicle.
    pub days: usize,
    /// Trajectory samples per day (at least 2).
    pub samples_per_day: usize,
    /// Minimum miles driven per day.
    pub daily_miles_min: f64,
    /// Maximum miles driven per day.
    pub daily_miles_max: f64,
    /// Number of synthetic historical charging sessions.
    pub history_events: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            vehicles: 20,
            days: 7,
            samples_per_day: 48,
            daily_miles_min: 20.0,
            daily_miles_max: 120.0,
            history_events: 500,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"vehicle.range_miles"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the fast-charging preset: 150 kW chargers and empirical amounts.
    pub fn fast_charging() -> Self {
        Self {
            charging: ChargingConfig {
                charge_rate_kw: 150.0,
            },
            predictors: PredictorConfig {
                amount: AmountKind::RandomSample,
                location_weighting: SocWeighting::StartSoc,
                ..PredictorConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the fine-grid preset: resolution 9 over a smaller area.
    pub fn fine_grid() -> Self {
        Self {
            grid: GridConfig {
                resolution: 9,
                ..GridConfig::default()
            },
            region: RegionConfig {
                boundary: Some(vec![
                    [34.00, -118.32],
                    [34.00, -118.20],
                    [34.10, -118.20],
                    [34.10, -118.32],
                ]),
                geojson: None,
            },
            synthetic: SyntheticConfig {
                vehicles: 10,
                days: 3,
                ..SyntheticConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "fast_charging", "fine_grid"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "fast_charging" => Ok(Self::fast_charging()),
            "fine_grid" => Ok(Self::fine_grid()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Vehicle and charger parameters as one value.
    pub fn vehicle_spec(&self) -> VehicleSpec {
        VehicleSpec {
            range_miles: self.vehicle.range_miles,
            battery_capacity_kwh: self.vehicle.battery_capacity_kwh,
            initial_soc: self.vehicle.initial_soc,
            charge_rate_kw: self.charging.charge_rate_kw,
        }
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let v = &self.vehicle;
        if !is_positive(v.range_miles) {
            errors.push(ConfigError::new("vehicle.range_miles", "must be > 0"));
        }
        if !is_positive(v.battery_capacity_kwh) {
            errors.push(ConfigError::new("vehicle.battery_capacity_kwh", "must be > 0"));
        }
        if !is_positive(v.initial_soc) || v.initial_soc > 100.0 {
            errors.push(ConfigError::new("vehicle.initial_soc", "must be in (0, 100]"));
        }

        let c = &self.charging;
        if !is_positive(c.charge_rate_kw) {
            errors.push(ConfigError::new("charging.charge_rate_kw", "must be > 0"));
        }

        let p = &self.predictors;
        if !(0.0..1.0).contains(&p.test_fraction) {
            errors.push(ConfigError::new("predictors.test_fraction", "must be in [0.0, 1.0)"));
        }

        if self.grid.resolution > 15 {
            errors.push(ConfigError::new(
                "grid.resolution",
                format!("must be <= 15, got {}", self.grid.resolution),
            ));
        }

        let r = &self.region;
        match (&r.boundary, &r.geojson) {
            (Some(_), Some(_)) => errors.push(ConfigError::new(
                "region",
                "set either region.boundary or region.geojson, not both",
            )),
            (None, None) => errors.push(ConfigError::new(
                "region",
                "one of region.boundary or region.geojson is required",
            )),
            (Some(ring), None) if ring.len() < 3 => errors.push(ConfigError::new(
                "region.boundary",
                format!("needs at least 3 vertices, got {}", ring.len()),
            )),
            _ => {}
        }

        let s = &self.synthetic;
        if s.vehicles == 0 {
            errors.push(ConfigError::new("synthetic.vehicles", "must be > 0"));
        }
        if s.days == 0 {
            errors.push(ConfigError::new("synthetic.days", "must be > 0"));
        }
        if s.samples_per_day < 2 {
            errors.push(ConfigError::new("synthetic.samples_per_day", "must be >= 2"));
        }
        if !is_positive(s.daily_miles_min) {
            errors.push(ConfigError::new("synthetic.daily_miles_min", "must be > 0"));
        }
        if s.daily_miles_max < s.daily_miles_min {
            errors.push(ConfigError::new(
                "synthetic.daily_miles_max",
                "must be >= synthetic.daily_miles_min",
            ));
        }
        if s.history_events == 0 {
            errors.push(ConfigError::new("synthetic.history_events", "must be > 0"));
        }

        errors
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
