//! Fleet orchestration over independent vehicles.

use std::num::NonZeroUsize;
use std::thread;

use serde::Deserialize;

use super::engine::{Engine, VehicleRun};
use super::event::ChargingEvent;
use super::vehicle::VehicleState;
use crate::error::SimError;
use crate::predictors::{AmountPredictor, LocationPredictor};

/// How the fleet schedules vehicles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    #[default]
    Concurrent,
}

/// Per-vehicle results of a fleet run.
///
/// Within a vehicle, events keep the order they occurred. Ordering across
/// vehicles follows the input order of the fleet.
#[derive(Debug, Clone, Default)]
pub struct FleetRun {
    pub runs: Vec<VehicleRun>,
}

impl FleetRun {
    pub fn vehicle_count(&self) -> usize {
        self.runs.len()
    }

    pub fn event_count(&self) -> usize {
        self.runs.iter().map(|r| r.events.len()).sum()
    }

    /// Iterates all events across vehicles.
    pub fn events(&self) -> impl Iterator<Item = &ChargingEvent> {
        self.runs.iter().flat_map(|r| r.events.iter())
    }

    /// Flattens the run into one event list.
    pub fn into_events(self) -> Vec<ChargingEvent> {
        self.runs.into_iter().flat_map(|r| r.events).collect()
    }
}

/// Runs an [`Engine`] over many vehicles, optionally on scoped worker threads.
///
/// Vehicle `i` gets an RNG seeded with `seed + i`, so its events do not
/// depend on which worker handles it.
#[derive(Debug, Clone)]
pub struct Fleet<L: LocationPredictor, A: AmountPredictor> {
    engine: Engine<L, A>,
    mode: ExecutionMode,
    workers: usize,
    seed: u64,
}

impl<L: LocationPredictor, A: AmountPredictor> Fleet<L, A> {
    /// Creates a fleet runner.
    ///
    /// # Arguments
    ///
    /// * `engine` - Shared engine with both predictors
    /// * `mode` - Sequential or concurrent scheduling
    /// * `workers` - Worker thread count; `0` uses available parallelism
    /// * `seed` - Master seed for per-vehicle RNGs
    pub fn new(engine: Engine<L, A>, mode: ExecutionMode, workers: usize, seed: u64) -> Self {
        Self {
            engine,
            mode,
            workers,
            seed,
        }
    }

    pub fn engine(&self) -> &Engine<L, A> {
        &self.engine
    }

    /// Number of worker threads a concurrent run would use for `vehicles`.
    pub fn worker_count(&self, vehicles: usize) -> usize {
        let requested = if self.workers == 0 {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            self.workers
        };
        requested.clamp(1, vehicles.max(1))
    }

    /// Simulates every vehicle and gathers their results.
    ///
    /// # Errors
    ///
    /// The first vehicle error aborts the whole run. A panicking worker is
    /// reported as [`SimError::WorkerPanicked`].
    pub fn run(&self, vehicles: Vec<VehicleState>) -> Result<FleetRun, SimError> {
        let vehicle_count = vehicles.len();
        let runs = match self.mode {
            ExecutionMode::Sequential => self.run_chunk(0, vehicles)?,
            ExecutionMode::Concurrent => self.run_concurrent(vehicles)?,
        };
        let fleet_run = FleetRun { runs };

        tracing::info!(
            vehicles = vehicle_count,
            events = fleet_run.event_count(),
            mode = ?self.mode,
            "fleet simulation finished"
        );
        Ok(fleet_run)
    }

    fn run_chunk(
        &self,
        offset: usize,
        vehicles: Vec<VehicleState>,
    ) -> Result<Vec<VehicleRun>, SimError> {
        vehicles
            .into_iter()
            .enumerate()
            .map(|(i, state)| {
                let seed = self.seed.wrapping_add((offset + i) as u64);
                self.engine.run(state, seed)
            })
            .collect()
    }

    fn run_concurrent(&self, vehicles: Vec<VehicleState>) -> Result<Vec<VehicleRun>, SimError> {
        let total = vehicles.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let workers = self.worker_count(total);
        let chunk_size = total.div_ceil(workers);

        let mut chunks: Vec<(usize, Vec<VehicleState>)> = Vec::with_capacity(workers);
        let mut remaining = vehicles.into_iter();
        let mut offset = 0;
        while offset < total {
            let chunk: Vec<VehicleState> = remaining.by_ref().take(chunk_size).collect();
            let len = chunk.len();
            chunks.push((offset, chunk));
            offset += len;
        }

        thread::scope(|scope| -> Result<Vec<VehicleRun>, SimError> {
            let handles: Vec<_> = chunks
                .into_iter()
                .map(|(offset, chunk)| scope.spawn(move || self.run_chunk(offset, chunk)))
                .collect();

            // join every worker before reporting, so a later panic cannot escape the scope
            let joined: Vec<thread::Result<Result<Vec<VehicleRun>, SimError>>> =
                handles.into_iter().map(|h| h.join()).collect();

            let mut runs = Vec::with_capacity(total);
            for result in joined {
                runs.extend(result.map_err(|_| SimError::WorkerPanicked)??);
            }
            Ok(runs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::trajectory::{Trajectory, TrajectorySample};
    use crate::sim::vehicle::VehicleSpec;
    use chrono::{NaiveDate, TimeDelta};
    use rand::{Rng, rngs::StdRng};
    use std::sync::Arc;

    struct JitterLocation;

    impl LocationPredictor for JitterLocation {
        fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64 {
            rng.random_range(0.2..0.8) * state.miles_available()
        }

        fn name(&self) -> &'static str {
            "jitter"
        }
    }

    struct HalfHeadroom;

    impl AmountPredictor for HalfHeadroom {
        fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64 {
            let share: f64 = rng.random_range(0.3..1.0);
            share * state.soc_headroom() / 100.0 * state.battery_capacity_kwh()
        }

        fn name(&self) -> &'static str {
            "half_headroom"
        }
    }

    fn vehicles(n: usize) -> Vec<VehicleState> {
        let t0 = NaiveDate::from_ymd_opt(2021, 3, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid timestamp");
        (0..n)
            .map(|v| {
                let samples = (0..200)
                    .map(|i| TrajectorySample {
                        odometer: i as f64 * 5.0,
                        timestamp: t0 + TimeDelta::minutes(10 * i),
                        latitude: 34.0 + v as f64 * 0.001,
                        longitude: -118.3,
                    })
                    .collect();
                let trajectory =
                    Trajectory::new(format!("veh-{v}"), samples).expect("valid trajectory");
                VehicleState::new(Arc::new(trajectory), VehicleSpec::default())
            })
            .collect()
    }

    fn fleet(mode: ExecutionMode, workers: usize) -> Fleet<JitterLocation, HalfHeadroom> {
        Fleet::new(Engine::new(JitterLocation, HalfHeadroom), mode, workers, 99)
    }

    #[test]
    fn concurrent_matches_sequential() {
        let sequential = fleet(ExecutionMode::Sequential, 1)
            .run(vehicles(7))
            .expect("run succeeds");
        let concurrent = fleet(ExecutionMode::Concurrent, 3)
            .run(vehicles(7))
            .expect("run succeeds");

        assert_eq!(sequential.vehicle_count(), 7);
        assert!(sequential.event_count() > 0);
        for (a, b) in sequential.runs.iter().zip(&concurrent.runs) {
            assert_eq!(a.vehicle_id, b.vehicle_id);
            assert_eq!(a.events, b.events);
        }
    }

    /// Stalls `veh-0` and panics on every other vehicle.
    struct StallOrPanic;

    impl LocationPredictor for StallOrPanic {
        fn predict(&self, state: &VehicleState, _rng: &mut StdRng) -> f64 {
            if state.vehicle_id() == "veh-0" {
                return 0.0;
            }
            panic!("predictor blew up for {}", state.vehicle_id());
        }

        fn name(&self) -> &'static str {
            "stall_or_panic"
        }
    }

    #[test]
    fn stalled_and_panicking_workers_return_an_error() {
        let fleet = Fleet::new(
            Engine::new(StallOrPanic, HalfHeadroom),
            ExecutionMode::Concurrent,
            2,
            99,
        );

        let err = fleet.run(vehicles(2)).expect_err("run must fail");
        assert!(matches!(err, SimError::NoProgress { .. }));
    }

    #[test]
    fn panicking_worker_is_reported() {
        let fleet = Fleet::new(
            Engine::new(StallOrPanic, HalfHeadroom),
            ExecutionMode::Concurrent,
            2,
            99,
        );
        let mut all = vehicles(3);
        all.remove(0);

        let err = fleet.run(all).expect_err("run must fail");
        assert!(matches!(err, SimError::WorkerPanicked));
    }

    #[test]
    fn empty_fleet_is_fine() {
        let run = fleet(ExecutionMode::Concurrent, 4)
            .run(Vec::new())
            .expect("run succeeds");
        assert_eq!(run.event_count(), 0);
    }

    #[test]
    fn worker_count_is_bounded_by_vehicles() {
        let f = fleet(ExecutionMode::Concurrent, 16);
        assert_eq!(f.worker_count(3), 3);
        assert_eq!(f.worker_count(0), 1);
        assert!(fleet(ExecutionMode::Concurrent, 0).worker_count(64) >= 1);
    }

    #[test]
    fn into_events_flattens_in_vehicle_order() {
        let run = fleet(ExecutionMode::Sequential, 1)
            .run(vehicles(2))
            .expect("run succeeds");
        let first_count = run.runs[0].events.len();
        let events = run.into_events();
        assert!(events[..first_count].iter().all(|e| e.vehicle_id == "veh-0"));
        assert!(events[first_count..].iter().all(|e| e.vehicle_id == "veh-1"));
    }
}
