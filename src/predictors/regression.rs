//! Linear regression of SOC delta on plug-in SOC.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::history::ChargingHistory;
use super::types::{AmountPredictor, gaussian_noise};
use crate::error::SimError;
use crate::sim::vehicle::VehicleState;

/// Ordinary least squares fit of `delta_soc ~ start_soc`.
///
/// The model is trained on a seeded random split of the history. Each
/// prediction adds Gaussian noise with the training residual standard
/// deviation, so a rejected draw can be redrawn.
#[derive(Debug, Clone)]
pub struct LinearAmount {
    slope: f64,
    intercept: f64,
    residual_std: f64,
    r2: Option<f64>,
    train_size: usize,
    test_size: usize,
    max_resamples: usize,
}

impl LinearAmount {
    /// Fits the model on a train split of `history`.
    ///
    /// # Arguments
    ///
    /// * `history` - Historical sessions
    /// * `test_fraction` - Share of records held out for scoring, in `[0, 1)`
    /// * `split_seed` - Seed for the train/test shuffle
    /// * `max_resamples` - Redraw budget before falling back to a full charge
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EmptyHistory`] if the train split would be empty.
    pub fn fit(
        history: &ChargingHistory,
        test_fraction: f64,
        split_seed: u64,
        max_resamples: usize,
    ) -> Result<Self, SimError> {
        let records = history.records();
        let n = records.len();
        if n == 0 {
            return Err(SimError::EmptyHistory);
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(split_seed);
        indices.shuffle(&mut rng);

        let fraction = test_fraction.clamp(0.0, 1.0);
        let test_size = ((n as f64 * fraction).ceil() as usize).min(n - 1);
        let (test_idx, train_idx) = indices.split_at(test_size);

        let train: Vec<(f64, f64)> = train_idx
            .iter()
            .map(|&i| (records[i].start_soc, records[i].delta_soc))
            .collect();
        let test: Vec<(f64, f64)> = test_idx
            .iter()
            .map(|&i| (records[i].start_soc, records[i].delta_soc))
            .collect();

        let (slope, intercept) = ordinary_least_squares(&train);
        let sse: f64 = train
            .iter()
            .map(|&(x, y)| (y - (intercept + slope * x)).powi(2))
            .sum();
        let residual_std = (sse / train.len() as f64).sqrt();
        let r2 = r_squared(&test, slope, intercept);

        Ok(Self {
            slope,
            intercept,
            residual_std,
            r2,
            train_size: train.len(),
            test_size: test.len(),
            max_resamples,
        })
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    /// Coefficient of determination on the held-out split, if it can be scored.
    pub fn r2(&self) -> Option<f64> {
        self.r2
    }

    pub fn train_size(&self) -> usize {
        self.train_size
    }

    pub fn test_size(&self) -> usize {
        self.test_size
    }

    /// Noise-free regression estimate at `start_soc`.
    pub fn expected_delta(&self, start_soc: f64) -> f64 {
        self.intercept + self.slope * start_soc
    }
}

fn ordinary_least_squares(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), &(x, y)| {
        (sxy + (x - mean_x) * (y - mean_y), sxx + (x - mean_x).powi(2))
    });

    if sxx == 0.0 {
        return (0.0, mean_y);
    }
    let slope = sxy / sxx;
    (slope, mean_y - slope * mean_x)
}

fn r_squared(points: &[(f64, f64)], slope: f64, intercept: f64) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / points.len() as f64;
    let ss_tot: f64 = points.iter().map(|&(_, y)| (y - mean_y).powi(2)).sum();
    if ss_tot == 0.0 {
        return None;
    }
    let ss_res: f64 = points
        .iter()
        .map(|&(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    Some(1.0 - ss_res / ss_tot)
}

impl AmountPredictor for LinearAmount {
    fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64 {
        let headroom = state.soc_headroom();
        if headroom <= 0.0 {
            return 0.0;
        }

        let expected = self.expected_delta(state.state_of_charge());
        let delta = (0..=self.max_resamples)
            .map(|_| expected + gaussian_noise(rng, self.residual_std))
            .find(|&d| d > 0.0 && d < headroom)
            .unwrap_or_else(|| {
                tracing::debug!(
                    vehicle = state.vehicle_id(),
                    expected,
                    headroom,
                    "linear amount resampling exhausted, filling the battery"
                );
                headroom
            });

        delta / 100.0 * state.battery_capacity_kwh()
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}
