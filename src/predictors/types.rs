//! Common traits for the pluggable simulation strategies.

use rand::{Rng, rngs::StdRng};

use crate::sim::vehicle::VehicleState;

/// Strategy that decides how far a vehicle drives before its next charge.
///
/// Implementations must return a positive distance that keeps the vehicle
/// within its remaining range, resampling internally until that holds.
/// The engine does not re-validate the returned value.
pub trait LocationPredictor: Send + Sync {
    /// Returns the miles to drive before the next charging session.
    ///
    /// # Arguments
    ///
    /// * `state` - Current vehicle state (read-only)
    /// * `rng` - The vehicle's own random number generator
    fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64;

    /// Returns a human-readable name for logs and summaries.
    fn name(&self) -> &'static str;
}

/// Strategy that decides how much energy a charging session adds.
///
/// Implementations must return a non-negative energy whose SOC delta fits in
/// the battery's remaining headroom, resampling internally until that holds.
pub trait AmountPredictor: Send + Sync {
    /// Returns the energy in kWh to add at the current stop.
    fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64;

    /// Returns a human-readable name for logs and summaries.
    fn name(&self) -> &'static str;
}

impl<T: LocationPredictor + ?Sized> LocationPredictor for &T {
    fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64 {
        (**self).predict(state, rng)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: AmountPredictor + ?Sized> AmountPredictor for &T {
    fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64 {
        (**self).predict(state, rng)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Utility function to generate Gaussian noise using Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// A normally distributed sample with mean 0, or exactly 0 when `std_dev`
/// is not positive.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev.is_nan() || std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
