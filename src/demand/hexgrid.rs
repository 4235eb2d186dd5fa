//! Fixed H3 cell grid covering the operating region.

use std::collections::BTreeSet;

use h3o::geom::{self, ContainmentMode, PolyfillConfig, ToCells};
use h3o::{CellIndex, LatLng, Resolution};

use super::region::{GeoPoint, Region};
use crate::error::SimError;

/// Hours in the demand tensor's time axis.
pub const HOURS_PER_DAY: u32 = 24;

/// Every H3 cell whose centre lies inside the region, at one resolution.
///
/// Cells are kept sorted by index, so iteration order is deterministic and
/// lookups are binary searches. The grid does not depend on any observed
/// demand.
#[derive(Debug, Clone)]
pub struct HexGrid {
    resolution: Resolution,
    cells: Vec<CellIndex>,
}

impl HexGrid {
    /// Enumerates the cells of `region` at `resolution` by polyfilling each
    /// polygon with centroid containment.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidResolution`] for a resolution above 15 and
    /// [`SimError::InvalidRegion`] when a polygon cannot be converted to an
    /// H3 geometry.
    pub fn from_region(region: &Region, resolution: u8) -> Result<Self, SimError> {
        let res = Resolution::try_from(resolution)
            .map_err(|_| SimError::InvalidResolution(resolution))?;
        let config = PolyfillConfig::new(res)
            .containment_mode(ContainmentMode::ContainsCentroid);

        let mut cells = BTreeSet::new();
        for polygon in region.polygons() {
            let polygon = geom::Polygon::from_degrees(polygon.clone())
                .map_err(|e| SimError::InvalidRegion(e.to_string()))?;
            cells.extend(polygon.to_cells(config));
        }

        tracing::info!(
            resolution,
            polygons = region.polygons().len(),
            cells = cells.len(),
            "enumerated hex grid"
        );

        Ok(Self {
            resolution: res,
            cells: cells.into_iter().collect(),
        })
    }

    /// Builds a grid from an explicit cell list.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidResolution`] for a bad resolution and
    /// [`SimError::InvalidRegion`] when a cell has a different resolution.
    pub fn from_cells(
        cells: impl IntoIterator<Item = CellIndex>,
        resolution: u8,
    ) -> Result<Self, SimError> {
        let res = Resolution::try_from(resolution)
            .map_err(|_| SimError::InvalidResolution(resolution))?;
        let cells: BTreeSet<CellIndex> = cells.into_iter().collect();
        if let Some(cell) = cells.iter().find(|c| c.resolution() != res) {
            return Err(SimError::InvalidRegion(format!(
                "cell {cell} is not at resolution {resolution}"
            )));
        }
        Ok(Self {
            resolution: res,
            cells: cells.into_iter().collect(),
        })
    }

    pub fn resolution(&self) -> u8 {
        u8::from(self.resolution)
    }

    /// Grid cells in ascending index order.
    pub fn cells(&self) -> &[CellIndex] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of `(cell, hour)` pairs in the full grid.
    pub fn row_count(&self) -> usize {
        self.cells.len() * HOURS_PER_DAY as usize
    }

    /// Position of `cell` in [`cells`](Self::cells), if it belongs to the grid.
    pub fn position(&self, cell: CellIndex) -> Option<usize> {
        self.cells.binary_search(&cell).ok()
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        self.position(cell).is_some()
    }

    /// Cell at this grid's resolution containing `point`, whether or not it
    /// is part of the grid.
    pub fn cell_for(&self, point: GeoPoint) -> Result<CellIndex, SimError> {
        to_cell(point, self.resolution)
    }
}

/// Geo-to-cell lookup at `resolution`.
pub fn to_cell(point: GeoPoint, resolution: Resolution) -> Result<CellIndex, SimError> {
    LatLng::new(point.latitude, point.longitude)
        .map(|ll| ll.to_cell(resolution))
        .map_err(|e| SimError::InvalidCoordinate {
            latitude: point.latitude,
            longitude: point.longitude,
            message: e.to_string(),
        })
}

pub fn cell_center(cell: CellIndex) -> GeoPoint {
    let ll = LatLng::from(cell);
    GeoPoint::new(ll.lat(), ll.lng())
}

/// Cell outline as an open ring of vertices.
pub fn cell_boundary(cell: CellIndex) -> Vec<GeoPoint> {
    cell.boundary()
        .iter()
        .map(|ll| GeoPoint::new(ll.lat(), ll.lng()))
        .collect()
}
