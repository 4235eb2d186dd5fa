use std::sync::Arc;

use crate::config::{AmountKind, LocationKind, PredictorConfig, ScenarioConfig};
use crate::demand::{
    AggregationReport, DemandTensor, HexGrid, HourlyDemandRecord, Region, SpatialAggregator,
    resample,
};
use crate::error::SimError;
use crate::io::load::{load_history, load_trajectories};
use crate::predictors::{
    AmountModel, AmountPredictor, ChargingHistory, LinearAmount, LocationModel, LocationPredictor,
    RandomSampleAmount, RandomSampleLocation,
};
use crate::sim::engine::Engine;
use crate::sim::fleet::{Fleet, FleetRun};
use crate::sim::trajectory::Trajectory;
use crate::sim::vehicle::VehicleState;
use crate::summary::RunSummary;
use crate::synthetic;

/// Everything one pipeline run produces.
#[derive(Debug)]
pub struct RunOutput {
    pub fleet: FleetRun,
    pub hourly: Vec<HourlyDemandRecord>,
    pub tensor: DemandTensor,
    pub report: AggregationReport,
    pub summary: RunSummary,
}

/// Builds the location and amount predictors a scenario asks for.
///
/// # Errors
///
/// Returns [`SimError::EmptyHistory`] if the linear model has nothing to fit.
pub fn build_predictors(
    config: &PredictorConfig,
    history: &ChargingHistory,
) -> Result<(LocationModel, AmountModel), SimError> {
    let location = match config.location {
        LocationKind::RandomSample => LocationModel::RandomSample(RandomSampleLocation::new(
            history,
            config.location_weighting,
            config.max_resamples,
        )),
    };

    let amount = match config.amount {
        AmountKind::Linear => {
            let model = LinearAmount::fit(
                history,
                config.test_fraction,
                config.split_seed,
                config.max_resamples,
            )?;
            tracing::info!(
                slope = model.slope(),
                intercept = model.intercept(),
                residual_std = model.residual_std(),
                r2 = ?model.r2(),
                train = model.train_size(),
                test = model.test_size(),
                "fitted linear charge amount model"
            );
            AmountModel::Linear(model)
        }
        AmountKind::RandomSample => {
            AmountModel::RandomSample(RandomSampleAmount::new(history, config.max_resamples))
        }
    };

    Ok((location, amount))
}

/// Runs a scenario end to end, loading or synthesizing its inputs.
///
/// Trajectories and history come from `config.data` when set, otherwise
/// from the seeded synthetic generator.
///
/// # Errors
///
/// Returns the first load, simulation, or aggregation error.
pub fn run_scenario(config: &ScenarioConfig) -> Result<RunOutput, SimError> {
    let seed = config.simulation.seed;
    let region = config.region.load()?;

    let history = match &config.data.charging_history {
        Some(path) => load_history(path)?,
        None => synthetic::history(&config.synthetic, seed)?,
    };
    let trajectories = match &config.data.trajectories {
        Some(path) => load_trajectories(path)?,
        None => synthetic::trajectories(&config.synthetic, &region, seed)?,
    };

    run_with(config, &region, trajectories, &history)
}

/// Runs the pipeline on already loaded inputs with the configured predictors.
pub fn run_with(
    config: &ScenarioConfig,
    region: &Region,
    trajectories: Vec<Trajectory>,
    history: &ChargingHistory,
) -> Result<RunOutput, SimError> {
    let (location, amount) = build_predictors(&config.predictors, history)?;
    run_pipeline(config, region, trajectories, location, amount)
}

/// Runs the pipeline with caller-supplied predictors.
///
/// Simulates every trajectory, resamples the charging events by hour, and
/// aggregates them onto the region's hex grid.
pub fn run_pipeline<L, A>(
    config: &ScenarioConfig,
    region: &Region,
    trajectories: Vec<Trajectory>,
    location: L,
    amount: A,
) -> Result<RunOutput, SimError>
where
    L: LocationPredictor,
    A: AmountPredictor,
{
    let spec = config.vehicle_spec();
    let sim = &config.simulation;
    tracing::info!(
        vehicles = trajectories.len(),
        location = location.name(),
        amount = amount.name(),
        seed = sim.seed,
        "starting fleet simulation"
    );

    let vehicles: Vec<VehicleState> = trajectories
        .into_iter()
        .map(|t| VehicleState::new(Arc::new(t), spec))
        .collect();
    let fleet = Fleet::new(
        Engine::new(location, amount),
        sim.mode,
        sim.workers,
        sim.seed,
    )
    .run(vehicles)?;

    let hourly = resample(fleet.events());

    let grid = HexGrid::from_region(region, config.grid.resolution)?;
    let aggregator = SpatialAggregator::new(grid, config.grid.aggregation);
    let (tensor, report) = aggregator.aggregate(&hourly)?;

    let summary = RunSummary::from_run(&fleet, &hourly, &tensor, &report);
    Ok(RunOutput {
        fleet,
        hourly,
        tensor,
        report,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyntheticConfig;
    use crate::io::export::write_tensor_csv;

    fn small_scenario(seed: u64) -> ScenarioConfig {
        let mut config = ScenarioConfig::fine_grid();
        config.simulation.seed = seed;
        config.synthetic = SyntheticConfig {
            vehicles: 4,
            days: 2,
            history_events: 120,
            ..config.synthetic
        };
        config
    }

    #[test]
    fn same_scenario_and_seed_is_deterministic() {
        let run_a = run_scenario(&small_scenario(777)).expect("first run succeeds");
        let run_b = run_scenario(&small_scenario(777)).expect("second run succeeds");

        let mut out_a = Vec::new();
        write_tensor_csv(&run_a.tensor, &mut out_a).expect("first export should succeed");
        let mut out_b = Vec::new();
        write_tensor_csv(&run_b.tensor, &mut out_b).expect("second export should succeed");

        assert_eq!(out_a, out_b);
        assert_eq!(run_a.summary.charging_events, run_b.summary.charging_events);
    }

    #[test]
    fn tensor_energy_matches_matched_records() {
        let run = run_scenario(&small_scenario(3)).expect("run succeeds");
        let hourly_energy: f64 = run.hourly.iter().map(|r| r.energy_share).sum();
        let tensor_energy = run.tensor.total_energy_kwh();
        assert!((hourly_energy - run.report.unmatched_energy_kwh - tensor_energy).abs() < 1e-6);
        assert_eq!(run.tensor.len(), run.tensor.cells().len() * 24);
    }

    #[test]
    fn random_sample_amount_is_selectable() {
        let config = small_scenario(1);
        let history = synthetic::history(&config.synthetic, 1).expect("history");
        let predictors = PredictorConfig {
            amount: AmountKind::RandomSample,
            ..config.predictors.clone()
        };
        let (_, amount) = build_predictors(&predictors, &history).expect("predictors build");
        assert!(matches!(amount, AmountModel::RandomSample(_)));
    }
}
