//! Spatial aggregation of hourly demand onto the fixed hex grid.

use h3o::CellIndex;
use serde::{Deserialize, Serialize};

use super::hexgrid::{HOURS_PER_DAY, HexGrid};
use super::region::GeoPoint;
use super::resample::HourlyDemandRecord;
use crate::error::SimError;

/// Reduction applied to one field within a `(cell, hour)` group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggVerb {
    Sum,
    Mean,
    Min,
    Max,
    First,
    Count,
}

/// Per-field aggregation verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationSpec {
    pub energy_kwh: AggVerb,
    pub delta_soc: AggVerb,
    pub start_soc: AggVerb,
    pub minutes: AggVerb,
}

impl Default for AggregationSpec {
    fn default() -> Self {
        Self {
            energy_kwh: AggVerb::Sum,
            delta_soc: AggVerb::Mean,
            start_soc: AggVerb::Mean,
            minutes: AggVerb::Sum,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
    first: f64,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.first = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count += 1;
    }

    /// Reduced value; an empty group reads as zero.
    fn finish(&self, verb: AggVerb) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        match verb {
            AggVerb::Sum => self.sum,
            AggVerb::Mean => self.sum / self.count as f64,
            AggVerb::Min => self.min,
            AggVerb::Max => self.max,
            AggVerb::First => self.first,
            AggVerb::Count => self.count as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct GroupAccumulator {
    energy_kwh: Accumulator,
    delta_soc: Accumulator,
    start_soc: Accumulator,
    minutes: Accumulator,
}

/// One `(cell, hour)` row of the dense demand tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandRow {
    pub hex_id: CellIndex,
    pub hour: u32,
    pub energy_kwh: f64,
    pub delta_soc: f64,
    pub start_soc: f64,
    pub minutes: f64,
    /// Hourly records that joined this row; zero for filled rows.
    pub observations: usize,
}

/// Dense `(cell, hour)` demand table.
///
/// Holds exactly one row per grid cell per hour, ordered by hour and then
/// by cell index.
#[derive(Debug, Clone)]
pub struct DemandTensor {
    resolution: u8,
    cells: Vec<CellIndex>,
    rows: Vec<DemandRow>,
}

impl DemandTensor {
    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    pub fn cells(&self) -> &[CellIndex] {
        &self.cells
    }

    pub fn rows(&self) -> &[DemandRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for a single hour, or `None` if `hour` is not in `0..24`.
    pub fn hour_rows(&self, hour: u32) -> Option<&[DemandRow]> {
        if hour >= HOURS_PER_DAY {
            return None;
        }
        let n = self.cells.len();
        let start = hour as usize * n;
        Some(&self.rows[start..start + n])
    }

    pub fn row(&self, cell: CellIndex, hour: u32) -> Option<&DemandRow> {
        let pos = self.cells.binary_search(&cell).ok()?;
        self.hour_rows(hour).map(|rows| &rows[pos])
    }

    pub fn total_energy_kwh(&self) -> f64 {
        self.rows.iter().map(|r| r.energy_kwh).sum()
    }

    pub fn nonzero_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.energy_kwh != 0.0).count()
    }

    /// Row with the highest energy, ties going to the earliest row.
    pub fn peak(&self) -> Option<&DemandRow> {
        self.rows
            .iter()
            .fold(None, |best: Option<&DemandRow>, row| match best {
                Some(b) if b.energy_kwh >= row.energy_kwh => Some(b),
                _ => Some(row),
            })
    }

    /// Energy per cell summed over all hours, in cell order.
    pub fn energy_by_cell(&self) -> Vec<(CellIndex, f64)> {
        let mut totals: Vec<(CellIndex, f64)> = self.cells.iter().map(|&c| (c, 0.0)).collect();
        let n = self.cells.len();
        for (i, row) in self.rows.iter().enumerate() {
            totals[i % n].1 += row.energy_kwh;
        }
        totals
    }
}

/// Records that could not be placed on the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregationReport {
    pub records: usize,
    pub matched_records: usize,
    pub unmatched_records: usize,
    pub unmatched_energy_kwh: f64,
}

/// Bins hourly demand onto a [`HexGrid`] and fills the gaps with zeros.
#[derive(Debug, Clone)]
pub struct SpatialAggregator {
    grid: HexGrid,
    spec: AggregationSpec,
}

impl SpatialAggregator {
    pub fn new(grid: HexGrid, spec: AggregationSpec) -> Self {
        Self { grid, spec }
    }

    pub fn grid(&self) -> &HexGrid {
        &self.grid
    }

    pub fn spec(&self) -> &AggregationSpec {
        &self.spec
    }

    /// Aggregates `records` per `(cell, hour)` and left-joins them onto the
    /// full grid.
    ///
    /// Records whose cell lies outside the grid are counted in the report
    /// and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidCoordinate`] if a record's position cannot
    /// be indexed.
    pub fn aggregate(
        &self,
        records: &[HourlyDemandRecord],
    ) -> Result<(DemandTensor, AggregationReport), SimError> {
        let cells = self.grid.cells();
        let n = cells.len();
        let mut groups = vec![GroupAccumulator::default(); n * HOURS_PER_DAY as usize];
        let mut report = AggregationReport {
            records: records.len(),
            ..AggregationReport::default()
        };

        for record in records {
            let cell = self
                .grid
                .cell_for(GeoPoint::new(record.latitude, record.longitude))?;
            let slot = self
                .grid
                .position(cell)
                .filter(|_| record.hour_of_day < HOURS_PER_DAY)
                .map(|pos| record.hour_of_day as usize * n + pos);

            let Some(slot) = slot else {
                report.unmatched_records += 1;
                report.unmatched_energy_kwh += record.energy_share;
                continue;
            };

            let group = &mut groups[slot];
            group.energy_kwh.push(record.energy_share);
            group.delta_soc.push(record.delta_soc_share);
            group.start_soc.push(record.start_soc);
            group.minutes.push(f64::from(record.minutes_in_hour));
            report.matched_records += 1;
        }

        if report.unmatched_records > 0 {
            tracing::warn!(
                unmatched_records = report.unmatched_records,
                unmatched_energy_kwh = report.unmatched_energy_kwh,
                "demand outside the hex grid was dropped"
            );
        }

        let rows = (0..HOURS_PER_DAY)
            .flat_map(|hour| cells.iter().enumerate().map(move |(pos, &cell)| (hour, pos, cell)))
            .map(|(hour, pos, cell)| {
                let group = &groups[hour as usize * n + pos];
                DemandRow {
                    hex_id: cell,
                    hour,
                    energy_kwh: group.energy_kwh.finish(self.spec.energy_kwh),
                    delta_soc: group.delta_soc.finish(self.spec.delta_soc),
                    start_soc: group.start_soc.finish(self.spec.start_soc),
                    minutes: group.minutes.finish(self.spec.minutes),
                    observations: group.energy_kwh.count,
                }
            })
            .collect::<Vec<_>>();

        let tensor = DemandTensor {
            resolution: self.grid.resolution(),
            cells: cells.to_vec(),
            rows,
        };

        tracing::info!(
            cells = n,
            rows = tensor.len(),
            matched = report.matched_records,
            total_energy_kwh = tensor.total_energy_kwh(),
            "aggregated demand tensor"
        );

        Ok((tensor, report))
    }
}
