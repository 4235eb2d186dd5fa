//! Per-vehicle drive/charge loop.

use rand::{SeedableRng, rngs::StdRng};

use super::event::ChargingEvent;
use super::vehicle::VehicleState;
use crate::error::SimError;
use crate::predictors::{AmountPredictor, LocationPredictor};

/// Outcome of a single drive/charge iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// The vehicle drove `miles` and charged `energy_kwh`.
    Charged { miles: f64, energy_kwh: f64 },
    /// The next leg would overrun the trajectory; the vehicle is done.
    Finished,
}

/// Result of simulating one vehicle to the end of its trajectory.
#[derive(Debug, Clone)]
pub struct VehicleRun {
    pub vehicle_id: String,
    /// Charging events in the order they occurred.
    pub events: Vec<ChargingEvent>,
    pub final_odometer: f64,
    pub final_soc: f64,
}

/// Simulation engine pairing a location predictor with an amount predictor.
///
/// Generic over both strategies for static dispatch. The engine is shared
/// read-only between fleet workers; all per-vehicle mutation happens on the
/// `VehicleState` and RNG passed to [`step`](Self::step).
#[derive(Debug, Clone)]
pub struct Engine<L: LocationPredictor, A: AmountPredictor> {
    location: L,
    amount: A,
}

impl<L: LocationPredictor, A: AmountPredictor> Engine<L, A> {
    pub fn new(location: L, amount: A) -> Self {
        Self { location, amount }
    }

    /// Executes one drive/charge iteration.
    ///
    /// Predictor output is trusted to be feasible; only a distance that
    /// cannot advance the odometer is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NoProgress`] when the location predictor yields a
    /// non-finite or non-positive distance.
    pub fn step(
        &self,
        state: &mut VehicleState,
        rng: &mut StdRng,
    ) -> Result<StepOutcome, SimError> {
        // 1. Distance to the next charge
        let miles = self.location.predict(state, rng);
        if !miles.is_finite() || miles <= 0.0 {
            return Err(SimError::NoProgress {
                vehicle_id: state.vehicle_id().to_string(),
                miles,
                odometer: state.odometer_reading(),
            });
        }

        // 2. Stop once the leg would run past the trajectory
        if state.odometer_reading() + miles > state.max_odometer() {
            return Ok(StepOutcome::Finished);
        }

        // 3. Drive, then 4. size and 5. record the charge
        state.drive(miles);
        let energy_kwh = self.amount.predict(state, rng);
        state.charge(energy_kwh);

        Ok(StepOutcome::Charged { miles, energy_kwh })
    }

    /// Runs a vehicle to completion with an RNG seeded from `seed`.
    pub fn run(&self, mut state: VehicleState, seed: u64) -> Result<VehicleRun, SimError> {
        let mut rng = StdRng::seed_from_u64(seed);
        while let StepOutcome::Charged { .. } = self.step(&mut state, &mut rng)? {}

        let vehicle_id = state.vehicle_id().to_string();
        let final_odometer = state.odometer_reading();
        let final_soc = state.state_of_charge();
        let events = state.into_events();

        tracing::debug!(
            vehicle = %vehicle_id,
            events = events.len(),
            final_odometer,
            final_soc,
            "vehicle simulation finished"
        );

        Ok(VehicleRun {
            vehicle_id,
            events,
            final_odometer,
            final_soc,
        })
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn amount(&self) -> &A {
        &self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::trajectory::{Trajectory, TrajectorySample};
    use crate::sim::vehicle::VehicleSpec;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use rand::Rng;
    use std::sync::Arc;

    struct FixedLocation(f64);

    /// Random leg between 1 and 15 miles.
    struct RandomLeg;

    impl LocationPredictor for RandomLeg {
        fn predict(&self, _state: &VehicleState, rng: &mut StdRng) -> f64 {
            rng.random_range(1.0..15.0)
        }

        fn name(&self) -> &'static str {
            "random_leg"
        }
    }

    impl LocationPredictor for FixedLocation {
        fn predict(&self, _state: &VehicleState, _rng: &mut StdRng) -> f64 {
            self.0
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    /// Refills whatever the last leg used.
    struct RefillAmount;

    impl AmountPredictor for RefillAmount {
        fn predict(&self, state: &VehicleState, _rng: &mut StdRng) -> f64 {
            state.soc_headroom() / 100.0 * state.battery_capacity_kwh()
        }

        fn name(&self) -> &'static str {
            "refill"
        }
    }

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 1)
            .and_then(|d| d.and_hms_opt(6, 0, 0))
            .expect("valid timestamp")
    }

    fn vehicle(max_odometer: f64) -> VehicleState {
        let samples = (0..=10)
            .map(|i| TrajectorySample {
                odometer: max_odometer * i as f64 / 10.0,
                timestamp: t0() + TimeDelta::minutes(30 * i),
                latitude: 34.0 + 0.01 * i as f64,
                longitude: -118.3,
            })
            .collect();
        let trajectory = Trajectory::new("veh-1", samples).expect("valid trajectory");
        VehicleState::new(
            Arc::new(trajectory),
            VehicleSpec {
                range_miles: 100.0,
                ..VehicleSpec::default()
            },
        )
    }

    #[test]
    fn finishes_without_charging_when_leg_overruns() {
        let engine = Engine::new(FixedLocation(150.0), RefillAmount);
        let run = engine.run(vehicle(100.0), 1).expect("run succeeds");
        assert!(run.events.is_empty());
        assert_eq!(run.final_odometer, 0.0);
        assert_eq!(run.final_soc, 100.0);
    }

    #[test]
    fn charges_once_per_completed_leg() {
        let engine = Engine::new(FixedLocation(40.0), RefillAmount);
        let run = engine.run(vehicle(100.0), 1).expect("run succeeds");
        // legs end at 40 and 80; the third would reach 120
        assert_eq!(run.events.len(), 2);
        assert_eq!(run.final_odometer, 80.0);
        assert!((run.events[0].delta_soc - 40.0).abs() < 1e-9);
        assert!(run.events[0].start_time < run.events[1].start_time);
    }

    #[test]
    fn leg_ending_exactly_at_max_still_charges() {
        let engine = Engine::new(FixedLocation(50.0), RefillAmount);
        let run = engine.run(vehicle(100.0), 1).expect("run succeeds");
        assert_eq!(run.events.len(), 2);
        assert_eq!(run.final_odometer, 100.0);
    }

    #[test]
    fn non_positive_distance_is_reported() {
        let engine = Engine::new(FixedLocation(0.0), RefillAmount);
        let err = engine.run(vehicle(100.0), 1).expect_err("must stall");
        assert!(matches!(err, SimError::NoProgress { .. }));

        let engine = Engine::new(FixedLocation(f64::NAN), RefillAmount);
        assert!(engine.run(vehicle(100.0), 1).is_err());
    }

    #[test]
    fn odometer_strictly_increases_each_step() {
        let engine = Engine::new(RandomLeg, RefillAmount);
        let mut state = vehicle(200.0);
        let mut rng = StdRng::seed_from_u64(17);

        let mut previous = state.odometer_reading();
        let mut charges = 0;
        while let StepOutcome::Charged { miles, .. } =
            engine.step(&mut state, &mut rng).expect("step succeeds")
        {
            let odometer = state.odometer_reading();
            assert!(odometer > previous, "{odometer} did not advance past {previous}");
            assert!((odometer - previous - miles).abs() < 1e-9);
            assert!(odometer <= state.max_odometer());
            previous = odometer;
            charges += 1;
        }
        assert!(charges > 10);
        assert_eq!(state.odometer_reading(), previous);
    }

    #[test]
    fn step_reports_leg_and_energy() {
        let engine = Engine::new(FixedLocation(25.0), RefillAmount);
        let mut state = vehicle(100.0);
        let mut rng = StdRng::seed_from_u64(0);
        let outcome = engine.step(&mut state, &mut rng).expect("step succeeds");
        match outcome {
            StepOutcome::Charged { miles, energy_kwh } => {
                assert_eq!(miles, 25.0);
                assert!((energy_kwh - 0.25 * 55.0).abs() < 1e-9);
            }
            StepOutcome::Finished => panic!("expected a charge"),
        }
        assert_eq!(state.odometer_reading(), 25.0);
    }
}
