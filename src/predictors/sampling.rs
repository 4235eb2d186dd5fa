//! Predictors that draw directly from the empirical charging history.

use rand::{Rng, rngs::StdRng};
use serde::Deserialize;

use super::history::ChargingHistory;
use super::types::{AmountPredictor, LocationPredictor};
use crate::sim::vehicle::VehicleState;

/// How historical start SOCs are weighted when sampled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocWeighting {
    /// Every historical session is equally likely.
    #[default]
    Uniform,
    /// Sessions are drawn with probability proportional to their start SOC.
    StartSoc,
}

/// Samples a historical plug-in SOC and drives until the battery reaches it.
///
/// `miles = (100 - start_soc) / 100 * range_miles`. Draws that are not
/// positive or exceed the remaining range are rejected and redrawn, up to
/// `max_resamples` times; after that the remaining range is returned.
#[derive(Debug, Clone)]
pub struct RandomSampleLocation {
    start_socs: Vec<f64>,
    cumulative: Option<Vec<f64>>,
    max_resamples: usize,
}

impl RandomSampleLocation {
    pub fn new(history: &ChargingHistory, weighting: SocWeighting, max_resamples: usize) -> Self {
        let start_socs: Vec<f64> = history.start_socs().collect();
        let cumulative = match weighting {
            SocWeighting::Uniform => None,
            SocWeighting::StartSoc => cumulative_weights(&start_socs),
        };
        Self {
            start_socs,
            cumulative,
            max_resamples,
        }
    }

    fn draw_start_soc(&self, rng: &mut StdRng) -> f64 {
        match &self.cumulative {
            Some(cumulative) => {
                let total = cumulative[cumulative.len() - 1];
                let target = rng.random::<f64>() * total;
                let idx = cumulative
                    .partition_point(|&c| c <= target)
                    .min(self.start_socs.len() - 1);
                self.start_socs[idx]
            }
            None => self.start_socs[rng.random_range(0..self.start_socs.len())],
        }
    }
}

/// Running sum of the positive weights, or `None` when no weight is positive.
fn cumulative_weights(values: &[f64]) -> Option<Vec<f64>> {
    let mut acc = 0.0;
    let cumulative: Vec<f64> = values
        .iter()
        .map(|&v| {
            acc += v.max(0.0);
            acc
        })
        .collect();
    (acc > 0.0).then_some(cumulative)
}

impl LocationPredictor for RandomSampleLocation {
    fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64 {
        let available = state.miles_available();
        for _ in 0..=self.max_resamples {
            let start_soc = self.draw_start_soc(rng);
            let miles = (100.0 - start_soc) / 100.0 * state.range_miles();
            if miles > 0.0 && miles <= available {
                return miles;
            }
        }

        tracing::debug!(
            vehicle = state.vehicle_id(),
            soc = state.state_of_charge(),
            available_miles = available,
            "location resampling exhausted, driving the remaining range"
        );
        available
    }

    fn name(&self) -> &'static str {
        "random_sample"
    }
}

/// Samples a historical SOC delta that fits in the battery's headroom.
#[derive(Debug, Clone)]
pub struct RandomSampleAmount {
    delta_socs: Vec<f64>,
    max_resamples: usize,
}

impl RandomSampleAmount {
    pub fn new(history: &ChargingHistory, max_resamples: usize) -> Self {
        Self {
            delta_socs: history.delta_socs().collect(),
            max_resamples,
        }
    }
}

impl AmountPredictor for RandomSampleAmount {
    fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64 {
        let headroom = state.soc_headroom();
        if headroom <= 0.0 {
            return 0.0;
        }

        let delta = (0..=self.max_resamples)
            .map(|_| self.delta_socs[rng.random_range(0..self.delta_socs.len())])
            .find(|&d| d > 0.0 && d <= headroom)
            .unwrap_or_else(|| {
                tracing::debug!(
                    vehicle = state.vehicle_id(),
                    headroom,
                    "amount resampling exhausted, filling the battery"
                );
                headroom
            });

        delta / 100.0 * state.battery_capacity_kwh()
    }

    fn name(&self) -> &'static str {
        "random_sample"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictors::history::HistoryRecord;
    use crate::sim::trajectory::{Trajectory, TrajectorySample};
    use crate::sim::vehicle::VehicleSpec;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn history(pairs: &[(f64, f64)]) -> ChargingHistory {
        ChargingHistory::new(
            pairs
                .iter()
                .map(|&(start_soc, delta_soc)| HistoryRecord {
                    start_soc,
                    delta_soc,
                })
                .collect(),
        )
        .expect("non-empty history")
    }

    fn vehicle(initial_soc: f64) -> VehicleState {
        let t0 = NaiveDate::from_ymd_opt(2021, 3, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid timestamp");
        let trajectory = Trajectory::new(
            "veh-1",
            vec![TrajectorySample {
                odometer: 0.0,
                timestamp: t0,
                latitude: 34.0,
                longitude: -118.3,
            }],
        )
        .expect("valid trajectory");
        let spec = VehicleSpec {
            range_miles: 200.0,
            initial_soc,
            ..VehicleSpec::default()
        };
        VehicleState::new(Arc::new(trajectory), spec)
    }

    #[test]
    fn location_stays_within_remaining_range() {
        let predictor = RandomSampleLocation::new(
            &history(&[(10.0, 0.0), (60.0, 0.0), (90.0, 0.0)]),
            SocWeighting::Uniform,
            1000,
        );
        let state = vehicle(50.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let miles = predictor.predict(&state, &mut rng);
            assert!(miles > 0.0 && miles <= state.miles_available());
        }
    }

    #[test]
    fn location_falls_back_to_remaining_range() {
        // every draw needs 180 miles but only 40 are available
        let predictor =
            RandomSampleLocation::new(&history(&[(10.0, 0.0)]), SocWeighting::Uniform, 5);
        let state = vehicle(20.0);
        let mut rng = StdRng::seed_from_u64(3);
        assert!((predictor.predict(&state, &mut rng) - 40.0).abs() < 1e-12);
    }

    #[test]
    fn start_soc_weighting_skips_zero_weights() {
        let predictor = RandomSampleLocation::new(
            &history(&[(0.0, 0.0), (50.0, 0.0)]),
            SocWeighting::StartSoc,
            1000,
        );
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            assert_eq!(predictor.draw_start_soc(&mut rng), 50.0);
        }
    }

    #[test]
    fn amount_fits_headroom() {
        let predictor =
            RandomSampleAmount::new(&history(&[(0.0, 10.0), (0.0, 30.0), (0.0, 90.0)]), 1000);
        let state = vehicle(60.0);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let energy = predictor.predict(&state, &mut rng);
            let delta = 100.0 * energy / state.battery_capacity_kwh();
            assert!(delta > 0.0 && delta <= state.soc_headroom() + 1e-9);
        }
    }

    #[test]
    fn amount_falls_back_to_full_battery() {
        let predictor = RandomSampleAmount::new(&history(&[(0.0, 95.0)]), 3);
        let state = vehicle(60.0);
        let mut rng = StdRng::seed_from_u64(5);
        let energy = predictor.predict(&state, &mut rng);
        assert!((energy - 0.4 * 55.0).abs() < 1e-9);
    }

    #[test]
    fn full_battery_gets_no_energy() {
        let predictor = RandomSampleAmount::new(&history(&[(0.0, 10.0)]), 3);
        let state = vehicle(100.0);
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(predictor.predict(&state, &mut rng), 0.0);
    }
}
