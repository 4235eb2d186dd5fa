use std::env;
use std::path::PathBuf;

use crate::demand::HOURS_PER_DAY;

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub seed: Option<u64>,
    pub workers: Option<usize>,
    pub sequential: bool,
    pub demand_out: Option<PathBuf>,
    pub tensor_out: Option<PathBuf>,
    pub events_out: Option<PathBuf>,
    pub hourly_out: Option<PathBuf>,
    pub geojson_out: Option<PathBuf>,
    /// Restricts the GeoJSON export to one hour of day.
    pub hour: Option<u32>,
    pub serve: bool,
    pub port: u16,
}

pub const DEFAULT_PORT: u16 = 3000;

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

pub fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    if args.len() == 1 && (args[0] == "--help" || args[0] == "-h") {
        print_usage();
        std::process::exit(0);
    }
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut scenario = None;
    let mut preset = None;
    let mut seed = None;
    let mut workers = None;
    let mut sequential = false;
    let mut demand_out = None;
    let mut tensor_out = None;
    let mut events_out = None;
    let mut hourly_out = None;
    let mut geojson_out = None;
    let mut hour = None;
    let mut serve = false;
    let mut port = DEFAULT_PORT;

    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --scenario (expected a TOML file path)",
                )?;
                if scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(
                    i,
                    "missing value for --preset (expected a preset name)",
                )?;
                if preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--seed" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{value}\" is not a valid u64"))?;
                seed = Some(parsed);
            }
            "--workers" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --workers (expected a count)")?;
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| format!("--workers value \"{value}\" is not a valid count"))?;
                workers = Some(parsed);
            }
            "--sequential" => sequential = true,
            "--demand-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --demand-out (expected a file path)",
                )?;
                if demand_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--demand-out provided more than once".to_string());
                }
            }
            "--tensor-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --tensor-out (expected a file path)",
                )?;
                if tensor_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--tensor-out provided more than once".to_string());
                }
            }
            "--events-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --events-out (expected a file path)",
                )?;
                if events_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--events-out provided more than once".to_string());
                }
            }
            "--hourly-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --hourly-out (expected a file path)",
                )?;
                if hourly_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--hourly-out provided more than once".to_string());
                }
            }
            "--geojson-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --geojson-out (expected a file path)",
                )?;
                if geojson_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--geojson-out provided more than once".to_string());
                }
            }
            "--hour" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --hour (expected 0-23)")?;
                let parsed = value
                    .parse::<u32>()
                    .ok()
                    .filter(|h| *h < HOURS_PER_DAY)
                    .ok_or_else(|| format!("--hour value \"{value}\" must be an hour in 0-23"))?;
                hour = Some(parsed);
            }
            "--serve" => serve = true,
            "--port" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                port = value
                    .parse::<u16>()
                    .map_err(|_| format!("--port value \"{value}\" is not a valid u16"))?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if scenario.is_some() && preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if scenario.is_none() && preset.is_none() {
        preset = Some("baseline".to_string());
    }

    if hour.is_some() && geojson_out.is_none() {
        return Err("--hour only applies together with --geojson-out".to_string());
    }

    Ok(CliOptions {
        scenario,
        preset,
        seed,
        workers,
        sequential,
        demand_out,
        tensor_out,
        events_out,
        hourly_out,
        geojson_out,
        hour,
        serve,
        port,
    })
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index).map(String::as_str).ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("ev-demand-sim - fleet charging simulation and hex-grid demand aggregation");
    eprintln!();
    eprintln!("Usage: ev-demand-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --preset <name>          Built-in preset (baseline, fast_charging, fine_grid)");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --workers <n>            Override worker thread count (0 = available cores)");
    eprintln!("  --sequential             Simulate vehicles on the calling thread");
    eprintln!("  --demand-out <path>      Export optimizer demand CSV (B,T,A)");
    eprintln!("  --tensor-out <path>      Export the full demand tensor CSV");
    eprintln!("  --events-out <path>      Export charging events CSV");
    eprintln!("  --hourly-out <path>      Export hourly demand records CSV");
    eprintln!("  --geojson-out <path>     Export per-cell demand as GeoJSON");
    eprintln!("  --hour <0-23>            Restrict the GeoJSON export to one hour");
    eprintln!("  --serve                  Start REST API server after the run (feature `api`)");
    eprintln!("  --port <u16>             API server port (default: {DEFAULT_PORT})");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
}
