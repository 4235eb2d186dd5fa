//! Distance and charge-amount predictors driving the vehicle simulation.

pub mod history;
pub mod regression;
pub mod sampling;
pub mod types;

use rand::rngs::StdRng;

pub use history::{ChargingHistory, HistoryRecord};
pub use regression::LinearAmount;
pub use sampling::{RandomSampleAmount, RandomSampleLocation, SocWeighting};
pub use types::{AmountPredictor, LocationPredictor};

use crate::sim::vehicle::VehicleState;

/// Location predictor selected at runtime from a scenario.
#[derive(Debug, Clone)]
pub enum LocationModel {
    RandomSample(RandomSampleLocation),
}

impl LocationPredictor for LocationModel {
    fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64 {
        match self {
            Self::RandomSample(p) => p.predict(state, rng),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::RandomSample(p) => p.name(),
        }
    }
}

/// Amount predictor selected at runtime from a scenario.
#[derive(Debug, Clone)]
pub enum AmountModel {
    Linear(LinearAmount),
    RandomSample(RandomSampleAmount),
}

impl AmountPredictor for AmountModel {
    fn predict(&self, state: &VehicleState, rng: &mut StdRng) -> f64 {
        match self {
            Self::Linear(p) => p.predict(state, rng),
            Self::RandomSample(p) => p.predict(state, rng),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Linear(p) => p.name(),
            Self::RandomSample(p) => p.name(),
        }
    }
}
