//! Operating-region geometry.

use std::fs;
use std::path::Path;

use geo::{BoundingRect, Contains, Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use geojson::GeoJson;

use crate::error::SimError;

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(point: GeoPoint) -> Self {
        Point::new(point.longitude, point.latitude)
    }
}

/// Axis-aligned latitude/longitude bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// The area whose cells make up the demand grid.
///
/// One or more polygons in degrees, `x` = longitude and `y` = latitude. A
/// point is inside when any polygon contains it.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    polygons: MultiPolygon<f64>,
}

impl Region {
    /// Builds a region from one or more polygons.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidRegion`] when there is no polygon or a ring
    /// has fewer than three distinct vertices or an out-of-range coordinate.
    pub fn new(polygons: Vec<Polygon<f64>>) -> Result<Self, SimError> {
        if polygons.is_empty() {
            return Err(SimError::InvalidRegion("no polygons".to_string()));
        }
        for polygon in &polygons {
            validate_ring(polygon.exterior())?;
            for hole in polygon.interiors() {
                validate_ring(hole)?;
            }
        }
        Ok(Self {
            polygons: MultiPolygon::new(polygons),
        })
    }

    /// Builds a single-polygon region from `[latitude, longitude]` pairs.
    pub fn from_ring(ring: &[[f64; 2]]) -> Result<Self, SimError> {
        let exterior: LineString<f64> = ring
            .iter()
            .map(|&[lat, lng]| Coord { x: lng, y: lat })
            .collect();
        Self::new(vec![Polygon::new(exterior, Vec::new())])
    }

    /// Parses a GeoJSON document holding polygons. Features and collections
    /// are flattened; coordinates are `[longitude, latitude]`.
    pub fn from_geojson_str(input: &str) -> Result<Self, SimError> {
        let geojson: GeoJson = input
            .parse()
            .map_err(|e: geojson::Error| SimError::InvalidRegion(e.to_string()))?;
        let collection = geojson::quick_collection::<f64>(&geojson)
            .map_err(|e| SimError::InvalidRegion(e.to_string()))?;

        let mut polygons = Vec::new();
        for geometry in collection.0 {
            collect_polygons(geometry, &mut polygons)?;
        }
        Self::new(polygons)
    }

    pub fn from_geojson_file(path: &Path) -> Result<Self, SimError> {
        let input = fs::read_to_string(path).map_err(|source| SimError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_geojson_str(&input)
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.polygons.0
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        self.polygons.contains(&Point::from(point))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self.polygons.bounding_rect() {
            Some(rect) => BoundingBox {
                min_lat: rect.min().y,
                max_lat: rect.max().y,
                min_lng: rect.min().x,
                max_lng: rect.max().x,
            },
            // unreachable for a validated region
            None => BoundingBox {
                min_lat: 0.0,
                max_lat: 0.0,
                min_lng: 0.0,
                max_lng: 0.0,
            },
        }
    }
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) -> Result<(), SimError> {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon),
        Geometry::MultiPolygon(multi) => out.extend(multi.0),
        Geometry::Rect(rect) => out.push(rect.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for inner in collection.0 {
                collect_polygons(inner, out)?;
            }
        }
        _ => {
            return Err(SimError::InvalidRegion(
                "only Polygon and MultiPolygon geometries describe a region".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), SimError> {
    if let Some(c) = ring
        .coords()
        .find(|c| !(-90.0..=90.0).contains(&c.y) || !(-180.0..=180.0).contains(&c.x))
    {
        return Err(SimError::InvalidRegion(format!(
            "coordinate ({}, {}) is out of range",
            c.y, c.x
        )));
    }

    let mut distinct: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for &c in ring.coords() {
        if !distinct.contains(&c) {
            distinct.push(c);
        }
    }
    if distinct.len() < 3 {
        return Err(SimError::InvalidRegion(format!(
            "ring needs at least 3 distinct vertices, got {}",
            distinct.len()
        )));
    }
    Ok(())
}
