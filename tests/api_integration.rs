//! Spawns the binary with `--serve` and queries it over plain HTTP.

#![cfg(feature = "api")]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

const SUMMARY_KEYS: &[&str] = &[
    "vehicles",
    "charging_events",
    "total_energy_kwh",
    "grid_cells",
    "resolution",
    "tensor_rows",
    "tensor_energy_kwh",
    "peak_hex_id",
    "peak_hour",
    "unmatched_records",
];

const ROW_KEYS: &[&str] = &[
    "hex_id",
    "hour",
    "energy_kwh",
    "delta_soc",
    "start_soc",
    "minutes",
    "observations",
];

struct ChildGuard {
    child: Child,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn api_summary_and_demand_have_expected_schema_and_http_200() {
    let port = allocate_port();
    let addr = format!("127.0.0.1:{port}");
    let _child = spawn_api_process(port);

    wait_for_server(&addr, Duration::from_secs(20));

    let (summary_status, summary_body) =
        http_get(&addr, "/summary").expect("/summary request should succeed");
    assert_eq!(summary_status, 200);

    let summary: Value =
        serde_json::from_str(&summary_body).expect("summary body should be JSON object");
    let summary_obj = summary.as_object().expect("summary should be an object");
    assert_has_keys(summary_obj, SUMMARY_KEYS);
    assert_eq!(summary_obj.get("resolution").and_then(Value::as_u64), Some(8));
    let cells = summary_obj
        .get("grid_cells")
        .and_then(Value::as_u64)
        .expect("grid_cells should be a number");

    let (demand_status, demand_body) =
        http_get(&addr, "/demand?hour=17").expect("/demand request should succeed");
    assert_eq!(demand_status, 200);

    let demand: Value =
        serde_json::from_str(&demand_body).expect("demand body should be JSON array");
    let rows = demand.as_array().expect("demand should be an array");
    assert_eq!(rows.len() as u64, cells);

    for row in rows {
        let row_obj = row.as_object().expect("row should be an object");
        assert_has_keys(row_obj, ROW_KEYS);
        assert_eq!(row_obj.get("hour").and_then(Value::as_u64), Some(17));
    }

    let (bad_status, _) =
        http_get(&addr, "/demand?hour=24").expect("/demand request should succeed");
    assert_eq!(bad_status, 400);
}

fn allocate_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral port bind should succeed");
    let port = listener
        .local_addr()
        .expect("local_addr should be available")
        .port();
    drop(listener);
    port
}

fn spawn_api_process(port: u16) -> ChildGuard {
    let port = port.to_string();
    let child = Command::new(env!("CARGO_BIN_EXE_ev-demand-sim"))
        .args(["--scenario", "scenarios/small_fleet.toml", "--serve", "--port", &port])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("ev-demand-sim process should spawn");

    ChildGuard { child }
}

fn wait_for_server(bind_addr: &str, timeout: Duration) {
    let start = Instant::now();
    loop {
        if let Ok((status, _)) = http_get(bind_addr, "/summary") {
            if status == 200 {
                return;
            }
        }

        if start.elapsed() >= timeout {
            panic!("timed out waiting for API server on {bind_addr}");
        }

        thread::sleep(Duration::from_millis(50));
    }
}

fn http_get(bind_addr: &str, path: &str) -> Result<(u16, String), String> {
    let mut stream = TcpStream::connect(bind_addr).map_err(|err| format!("connect: {err}"))?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: {bind_addr}\r\nConnection: close\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .map_err(|err| format!("write: {err}"))?;

    let mut raw = String::new();
    stream
        .read_to_string(&mut raw)
        .map_err(|err| format!("read: {err}"))?;

    let (head, body) = raw
        .split_once("\r\n\r\n")
        .ok_or_else(|| "invalid HTTP response".to_string())?;
    let status_line = head
        .lines()
        .next()
        .ok_or_else(|| "missing status line".to_string())?;
    let status_code = status_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| "missing status code".to_string())?
        .parse::<u16>()
        .map_err(|err| format!("invalid status code: {err}"))?;

    Ok((status_code, body.to_string()))
}

fn assert_has_keys(object: &serde_json::Map<String, Value>, keys: &[&str]) {
    for key in keys {
        assert!(object.contains_key(*key), "missing key: {key}");
    }
}
