//! Fleet charging demand entry point: CLI wiring, logging, and exports.

use std::process;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ev_demand_sim::cli::{CliOptions, parse_args, print_usage};
use ev_demand_sim::config::ScenarioConfig;
use ev_demand_sim::error::SimError;
use ev_demand_sim::io::export::{
    export_events_csv, export_geojson, export_hourly_csv, export_optimizer_csv, export_tensor_csv,
};
use ev_demand_sim::io::publish::StagedOutputs;
use ev_demand_sim::runner::{RunOutput, run_scenario};
use ev_demand_sim::sim::fleet::ExecutionMode;

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_scenario(cli: &CliOptions) -> ScenarioConfig {
    // --scenario takes priority; the CLI defaults to the baseline preset
    let loaded = match (&cli.scenario, &cli.preset) {
        (Some(path), _) => ScenarioConfig::from_toml_file(path),
        (None, Some(name)) => ScenarioConfig::from_preset(name),
        (None, None) => Ok(ScenarioConfig::baseline()),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    })
}

fn write_outputs(cli: &CliOptions, output: &RunOutput) -> Result<(), SimError> {
    let mut outputs = StagedOutputs::new();
    let mut written = Vec::new();

    if let Some(path) = &cli.events_out {
        let events: Vec<_> = output.fleet.events().cloned().collect();
        outputs.stage(path, |tmp| export_events_csv(&events, tmp))?;
        written.push("Charging events");
    }
    if let Some(path) = &cli.hourly_out {
        outputs.stage(path, |tmp| export_hourly_csv(&output.hourly, tmp))?;
        written.push("Hourly demand");
    }
    if let Some(path) = &cli.tensor_out {
        outputs.stage(path, |tmp| export_tensor_csv(&output.tensor, tmp))?;
        written.push("Demand tensor");
    }
    if let Some(path) = &cli.demand_out {
        outputs.stage(path, |tmp| export_optimizer_csv(&output.tensor, tmp))?;
        written.push("Optimizer demand");
    }
    if let Some(path) = &cli.geojson_out {
        outputs.stage(path, |tmp| export_geojson(&output.tensor, cli.hour, tmp))?;
        written.push("GeoJSON demand");
    }

    // nothing reaches its final path until every export succeeded
    for (what, path) in written.into_iter().zip(outputs.commit()?) {
        eprintln!("{what} written to {}", path.display());
    }
    Ok(())
}

fn main() {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {e}");
            print_usage();
            process::exit(1);
        }
    };
    init_logging();

    let mut scenario = load_scenario(&cli);

    // Apply overrides
    if let Some(seed) = cli.seed {
        scenario.simulation.seed = seed;
    }
    if let Some(workers) = cli.workers {
        scenario.simulation.workers = workers;
    }
    if cli.sequential {
        scenario.simulation.mode = ExecutionMode::Sequential;
    }

    // Validate
    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let output = run_scenario(&scenario).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });

    println!("{}", output.summary);

    if let Err(e) = write_outputs(&cli, &output) {
        eprintln!("error: failed to write output: {e}");
        process::exit(1);
    }

    if cli.serve {
        serve(cli.port, output);
    }
}

#[cfg(feature = "api")]
fn serve(port: u16, output: RunOutput) {
    use std::net::SocketAddr;
    use std::sync::Arc;

    let RunOutput {
        fleet, tensor, summary, ..
    } = output;
    let state = Arc::new(ev_demand_sim::api::AppState {
        summary,
        tensor,
        events: fleet.into_events(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });
    if let Err(e) = rt.block_on(ev_demand_sim::api::serve(state, addr)) {
        eprintln!("error: API server failed on {addr}: {e}");
        process::exit(1);
    }
}

#[cfg(not(feature = "api"))]
fn serve(_port: u16, _output: RunOutput) {
    eprintln!("error: --serve requires building with `--features api`");
    process::exit(1);
}
