//! Post-hoc summary of a complete pipeline run.

use std::fmt;

use serde::Serialize;

use crate::demand::{AggregationReport, DemandTensor, HourlyDemandRecord};
use crate::sim::fleet::FleetRun;

/// Headline numbers derived from a finished run.
///
/// Computed after the fact from the fleet output, the hourly records, and the
/// tensor, so the figures always agree with the exported tables.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub vehicles: usize,
    pub charging_events: usize,
    /// Total energy delivered across all events (kWh).
    pub total_energy_kwh: f64,
    /// Mean energy per event (kWh).
    pub mean_event_energy_kwh: f64,
    /// Mean session length (hours).
    pub mean_event_duration_hours: f64,
    pub hourly_records: usize,
    pub grid_cells: usize,
    pub resolution: u8,
    pub tensor_rows: usize,
    pub nonzero_rows: usize,
    /// Energy that landed on the grid (kWh).
    pub tensor_energy_kwh: f64,
    /// Busiest `(cell, hour)` pair, if any demand was recorded.
    pub peak_hex_id: Option<String>,
    pub peak_hour: Option<u32>,
    pub peak_energy_kwh: f64,
    /// Demand outside the grid that could not be joined.
    pub unmatched_records: usize,
    pub unmatched_energy_kwh: f64,
}

impl RunSummary {
    /// Computes the summary from the run's intermediate outputs.
    ///
    /// # Arguments
    ///
    /// * `fleet` - Per-vehicle simulation results
    /// * `records` - Hourly demand records produced by resampling
    /// * `tensor` - The dense demand tensor
    /// * `report` - Join statistics from aggregation
    pub fn from_run(
        fleet: &FleetRun,
        records: &[HourlyDemandRecord],
        tensor: &DemandTensor,
        report: &AggregationReport,
    ) -> Self {
        let charging_events = fleet.event_count();
        let (total_energy_kwh, total_hours) = fleet
            .events()
            .fold((0.0, 0.0), |(energy, hours), e| {
                (energy + e.energy_kwh, hours + e.duration_hours())
            });
        let (mean_event_energy_kwh, mean_event_duration_hours) = if charging_events > 0 {
            let n = charging_events as f64;
            (total_energy_kwh / n, total_hours / n)
        } else {
            (0.0, 0.0)
        };

        let peak = tensor.peak().filter(|r| r.energy_kwh > 0.0);

        Self {
            vehicles: fleet.vehicle_count(),
            charging_events,
            total_energy_kwh,
            mean_event_energy_kwh,
            mean_event_duration_hours,
            hourly_records: records.len(),
            grid_cells: tensor.cells().len(),
            resolution: tensor.resolution(),
            tensor_rows: tensor.len(),
            nonzero_rows: tensor.nonzero_rows(),
            tensor_energy_kwh: tensor.total_energy_kwh(),
            peak_hex_id: peak.map(|r| r.hex_id.to_string()),
            peak_hour: peak.map(|r| r.hour),
            peak_energy_kwh: peak.map_or(0.0, |r| r.energy_kwh),
            unmatched_records: report.unmatched_records,
            unmatched_energy_kwh: report.unmatched_energy_kwh,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ---")?;
        writeln!(f, "Vehicles:              {}", self.vehicles)?;
        writeln!(f, "Charging events:       {}", self.charging_events)?;
        writeln!(f, "Energy delivered:      {:.2} kWh", self.total_energy_kwh)?;
        writeln!(
            f,
            "Mean event:            {:.2} kWh over {:.2} h",
            self.mean_event_energy_kwh, self.mean_event_duration_hours
        )?;
        writeln!(f, "Hourly records:        {}", self.hourly_records)?;
        writeln!(
            f,
            "Grid:                  {} cells at resolution {}",
            self.grid_cells, self.resolution
        )?;
        writeln!(
            f,
            "Tensor rows:           {} ({} non-zero, {:.2} kWh)",
            self.tensor_rows, self.nonzero_rows, self.tensor_energy_kwh
        )?;
        match (&self.peak_hex_id, self.peak_hour) {
            (Some(hex), Some(hour)) => writeln!(
                f,
                "Peak demand:           {:.2} kWh in {hex} at hour {hour}",
                self.peak_energy_kwh
            )?,
            _ => writeln!(f, "Peak demand:           none")?,
        }
        write!(
            f,
            "Outside grid:          {} records ({:.2} kWh)",
            self.unmatched_records, self.unmatched_energy_kwh
        )
    }
}
