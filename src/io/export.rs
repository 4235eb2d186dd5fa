//! CSV and GeoJSON export for events, hourly demand, and the demand tensor.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde_json::{Value, json};

use super::load::TIMESTAMP_FORMAT;
use crate::demand::hexgrid::cell_boundary;
use crate::demand::{DemandTensor, HourlyDemandRecord};
use crate::error::SimError;
use crate::sim::event::ChargingEvent;

const EVENTS_HEADER: &str = "vehicle_id,latitude,longitude,start_time,end_time,\
                             delta_soc,start_soc,energy_kwh";

const HOURLY_HEADER: &str = "event_id,vehicle_id,hour,period_start,minutes,\
                             latitude,longitude,delta_soc,energy_kwh,start_soc";

const TENSOR_HEADER: &str = "hex_id,hour,energy_kwh,delta_soc,start_soc,minutes,observations";

/// Column names the optimizer indexes its demand parameter by.
const OPTIMIZER_HEADER: &str = "B,T,A";

/// Event times keep the millisecond precision of charge durations.
const EVENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

fn create(path: &Path) -> Result<io::BufWriter<File>, SimError> {
    let file = File::create(path).map_err(|source| SimError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(io::BufWriter::new(file))
}

fn header(columns: &str) -> impl Iterator<Item = &str> {
    columns.split(',').map(str::trim)
}

/// Exports charging events to a CSV file.
pub fn export_events_csv(events: &[ChargingEvent], path: &Path) -> Result<(), SimError> {
    write_events_csv(events, create(path)?)
}

/// Writes charging events as CSV to any writer.
pub fn write_events_csv(events: &[ChargingEvent], writer: impl Write) -> Result<(), SimError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header(EVENTS_HEADER))?;

    for e in events {
        wtr.write_record(&[
            e.vehicle_id.clone(),
            format!("{:.6}", e.latitude),
            format!("{:.6}", e.longitude),
            e.start_time.format(EVENT_TIMESTAMP_FORMAT).to_string(),
            e.end_time.format(EVENT_TIMESTAMP_FORMAT).to_string(),
            format!("{:.4}", e.delta_soc),
            format!("{:.4}", e.start_soc),
            format!("{:.4}", e.energy_kwh),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_hourly_csv(records: &[HourlyDemandRecord], path: &Path) -> Result<(), SimError> {
    write_hourly_csv(records, create(path)?)
}

/// Writes resampled hourly records as CSV to any writer.
pub fn write_hourly_csv(
    records: &[HourlyDemandRecord],
    writer: impl Write,
) -> Result<(), SimError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header(HOURLY_HEADER))?;

    for r in records {
        wtr.write_record(&[
            r.event_id.to_string(),
            r.vehicle_id.clone(),
            r.hour_of_day.to_string(),
            r.period_start.format(TIMESTAMP_FORMAT).to_string(),
            r.minutes_in_hour.to_string(),
            format!("{:.6}", r.latitude),
            format!("{:.6}", r.longitude),
            format!("{:.6}", r.delta_soc_share),
            format!("{:.6}", r.energy_share),
            format!("{:.4}", r.start_soc),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_tensor_csv(tensor: &DemandTensor, path: &Path) -> Result<(), SimError> {
    write_tensor_csv(tensor, create(path)?)
}

/// Writes the full demand tensor, one row per `(cell, hour)`.
pub fn write_tensor_csv(tensor: &DemandTensor, writer: impl Write) -> Result<(), SimError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header(TENSOR_HEADER))?;

    for r in tensor.rows() {
        wtr.write_record(&[
            r.hex_id.to_string(),
            r.hour.to_string(),
            format!("{:.6}", r.energy_kwh),
            format!("{:.6}", r.delta_soc),
            format!("{:.4}", r.start_soc),
            format!("{:.2}", r.minutes),
            r.observations.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_optimizer_csv(tensor: &DemandTensor, path: &Path) -> Result<(), SimError> {
    write_optimizer_csv(tensor, create(path)?)
}

/// Writes the optimizer hand-off table: `B` (cell), `T` (hour), `A` (energy),
/// sorted by hour.
pub fn write_optimizer_csv(tensor: &DemandTensor, writer: impl Write) -> Result<(), SimError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header(OPTIMIZER_HEADER))?;

    for r in tensor.rows() {
        wtr.write_record(&[
            r.hex_id.to_string(),
            r.hour.to_string(),
            format!("{:.6}", r.energy_kwh),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Builds a GeoJSON `FeatureCollection` with one polygon per grid cell.
///
/// With `Some(hour)` the properties are that hour's row; with `None` the
/// numeric fields are summed over all hours. Returns `None` for an hour
/// outside `0..24`.
pub fn tensor_geojson(tensor: &DemandTensor, hour: Option<u32>) -> Option<Value> {
    let features: Vec<Value> = match hour {
        Some(h) => tensor
            .hour_rows(h)?
            .iter()
            .map(|r| {
                feature(
                    r.hex_id,
                    json!({
                        "hex_id": r.hex_id.to_string(),
                        "hour": r.hour,
                        "energy_kwh": r.energy_kwh,
                        "delta_soc": r.delta_soc,
                        "start_soc": r.start_soc,
                        "minutes": r.minutes,
                        "observations": r.observations,
                    }),
                )
            })
            .collect(),
        None => {
            let n = tensor.cells().len();
            let mut observations = vec![0_usize; n];
            let mut minutes = vec![0.0_f64; n];
            for (i, r) in tensor.rows().iter().enumerate() {
                observations[i % n] += r.observations;
                minutes[i % n] += r.minutes;
            }
            tensor
                .energy_by_cell()
                .into_iter()
                .enumerate()
                .map(|(i, (cell, energy))| {
                    feature(
                        cell,
                        json!({
                            "hex_id": cell.to_string(),
                            "energy_kwh": energy,
                            "minutes": minutes[i],
                            "observations": observations[i],
                        }),
                    )
                })
                .collect()
        }
    };

    Some(json!({
        "type": "FeatureCollection",
        "features": features,
    }))
}

fn feature(cell: h3o::CellIndex, properties: Value) -> Value {
    let mut ring: Vec<[f64; 2]> = cell_boundary(cell)
        .into_iter()
        .map(|p| [p.longitude, p.latitude])
        .collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    json!({
        "type": "Feature",
        "id": cell.to_string(),
        "geometry": {
            "type": "Polygon",
            "coordinates": [ring],
        },
        "properties": properties,
    })
}

/// Writes the GeoJSON cell layer to a file.
///
/// # Errors
///
/// Returns [`SimError::InvalidHour`] for an hour outside `0..24`, or an
/// I/O or JSON error.
pub fn export_geojson(
    tensor: &DemandTensor,
    hour: Option<u32>,
    path: &Path,
) -> Result<(), SimError> {
    let collection = tensor_geojson(tensor, hour)
        .ok_or(SimError::InvalidHour(hour.unwrap_or_default()))?;
    let mut writer = create(path)?;
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush()?;
    Ok(())
}
