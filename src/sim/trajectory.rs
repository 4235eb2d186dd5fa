//! Observed vehicle trajectories and nearest-sample lookup.

use chrono::NaiveDateTime;

use crate::error::SimError;

/// One observed sample of a vehicle's movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    /// Odometer reading in miles.
    pub odometer: f64,
    /// Local wall-clock time of the observation.
    pub timestamp: NaiveDateTime,
    /// Latitude in degrees (WGS84).
    pub latitude: f64,
    /// Longitude in degrees (WGS84).
    pub longitude: f64,
}

/// An ordered, immutable sequence of samples for a single vehicle.
///
/// Samples are non-decreasing in odometer and the sequence is never empty.
/// Once built, a trajectory is only read, so it is shared between the
/// vehicle state and fleet workers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Trajectory {
    vehicle_id: String,
    samples: Vec<TrajectorySample>,
}

impl Trajectory {
    /// Builds a trajectory from samples already ordered by odometer.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EmptyTrajectory`] for an empty sample list and
    /// [`SimError::InvalidTrajectory`] when a sample has a non-finite field or
    /// the odometer decreases.
    pub fn new(
        vehicle_id: impl Into<String>,
        samples: Vec<TrajectorySample>,
    ) -> Result<Self, SimError> {
        let vehicle_id = vehicle_id.into();
        if samples.is_empty() {
            return Err(SimError::EmptyTrajectory { vehicle_id });
        }

        if let Some(idx) = samples.iter().position(|s| {
            !s.odometer.is_finite() || !s.latitude.is_finite() || !s.longitude.is_finite()
        }) {
            return Err(SimError::InvalidTrajectory {
                vehicle_id,
                message: format!("sample {idx} has a non-finite field"),
            });
        }

        if let Some(idx) = samples
            .windows(2)
            .position(|w| w[1].odometer < w[0].odometer)
        {
            return Err(SimError::InvalidTrajectory {
                vehicle_id,
                message: format!("odometer decreases at sample {}", idx + 1),
            });
        }

        Ok(Self {
            vehicle_id,
            samples,
        })
    }

    /// Builds a trajectory from unordered samples, sorting them by odometer.
    ///
    /// The sort is stable, so samples sharing an odometer reading keep their
    /// input order.
    ///
    /// # Errors
    ///
    /// Same as [`Trajectory::new`].
    pub fn from_unordered(
        vehicle_id: impl Into<String>,
        mut samples: Vec<TrajectorySample>,
    ) -> Result<Self, SimError> {
        samples.sort_by(|a, b| a.odometer.total_cmp(&b.odometer));
        Self::new(vehicle_id, samples)
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; kept for parity with `len`.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The sample with the lowest odometer reading.
    pub fn first(&self) -> &TrajectorySample {
        &self.samples[0]
    }

    pub fn min_odometer(&self) -> f64 {
        self.samples[0].odometer
    }

    pub fn max_odometer(&self) -> f64 {
        self.samples[self.samples.len() - 1].odometer
    }

    /// Earliest timestamp anywhere in the trajectory.
    pub fn start_time(&self) -> NaiveDateTime {
        self.samples
            .iter()
            .map(|s| s.timestamp)
            .min()
            .unwrap_or(self.samples[0].timestamp)
    }

    /// Index of the sample whose odometer is closest to `odometer`.
    ///
    /// Ties resolve to the earliest sample in trajectory order. Targets past
    /// either end snap to the nearest end, so the lookup never fails.
    pub fn nearest_index(&self, odometer: f64) -> usize {
        let upper = self.samples.partition_point(|s| s.odometer < odometer);
        if upper == 0 {
            return 0;
        }
        if upper == self.samples.len() {
            return self.first_at_odometer_of(upper - 1);
        }

        let below = upper - 1;
        let below_gap = odometer - self.samples[below].odometer;
        let upper_gap = self.samples[upper].odometer - odometer;
        if below_gap <= upper_gap {
            self.first_at_odometer_of(below)
        } else {
            upper
        }
    }

    /// Sample whose odometer is closest to `odometer`; see [`Trajectory::nearest_index`].
    pub fn nearest_sample(&self, odometer: f64) -> &TrajectorySample {
        &self.samples[self.nearest_index(odometer)]
    }

    fn first_at_odometer_of(&self, idx: usize) -> usize {
        let value = self.samples[idx].odometer;
        self.samples.partition_point(|s| s.odometer < value)
    }
}
