//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rand::rngs::StdRng;

use ev_demand_sim::config::{ScenarioConfig, SyntheticConfig};
use ev_demand_sim::predictors::{AmountPredictor, LocationPredictor};
use ev_demand_sim::sim::trajectory::{Trajectory, TrajectorySample};
use ev_demand_sim::sim::vehicle::{VehicleSpec, VehicleState};

/// Location predictor that replays a fixed list of distances, cycling.
pub struct ScriptedLocation {
    script: Vec<f64>,
    next: AtomicUsize,
}

impl ScriptedLocation {
    pub fn new(script: Vec<f64>) -> Self {
        Self {
            script,
            next: AtomicUsize::new(0),
        }
    }
}

impl LocationPredictor for ScriptedLocation {
    fn predict(&self, _state: &VehicleState, _rng: &mut StdRng) -> f64 {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.script[i % self.script.len()]
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Amount predictor that always returns the same energy.
pub struct FixedAmount(pub f64);

impl AmountPredictor for FixedAmount {
    fn predict(&self, _state: &VehicleState, _rng: &mut StdRng) -> f64 {
        self.0
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Location predictor that always drives the same distance.
pub struct EveryMiles(pub f64);

impl LocationPredictor for EveryMiles {
    fn predict(&self, _state: &VehicleState, _rng: &mut StdRng) -> f64 {
        self.0
    }

    fn name(&self) -> &'static str {
        "every_miles"
    }
}

/// Amount predictor that refills whatever headroom is left.
pub struct TopUp;

impl AmountPredictor for TopUp {
    fn predict(&self, state: &VehicleState, _rng: &mut StdRng) -> f64 {
        state.soc_headroom() / 100.0 * state.battery_capacity_kwh()
    }

    fn name(&self) -> &'static str {
        "top_up"
    }
}

/// 2021-03-01 08:00:00.
pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 3, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .expect("valid timestamp")
}

/// Straight eastward trajectory with evenly spaced samples.
///
/// `steps` legs of `miles_per_step` each, one every `minutes_per_step`.
pub fn straight_trajectory(
    vehicle_id: &str,
    steps: usize,
    miles_per_step: f64,
    minutes_per_step: i64,
) -> Trajectory {
    let samples = (0..=steps)
        .map(|i| TrajectorySample {
            odometer: i as f64 * miles_per_step,
            timestamp: t0() + TimeDelta::minutes(i as i64 * minutes_per_step),
            latitude: 34.05,
            longitude: -118.30 + i as f64 * 0.001,
        })
        .collect();
    Trajectory::new(vehicle_id, samples).expect("valid trajectory")
}

/// Vehicle parameters used across the pipeline tests.
pub fn spec(range_miles: f64) -> VehicleSpec {
    VehicleSpec {
        range_miles,
        battery_capacity_kwh: 55.0,
        initial_soc: 100.0,
        charge_rate_kw: 50.0,
    }
}

/// Small synthetic scenario that runs in well under a second.
pub fn small_scenario(seed: u64) -> ScenarioConfig {
    let mut config = ScenarioConfig::fine_grid();
    config.simulation.seed = seed;
    config.synthetic = SyntheticConfig {
        vehicles: 6,
        days: 2,
        history_events: 150,
        ..SyntheticConfig::default()
    };
    config
}
