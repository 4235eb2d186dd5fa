//! From charging events to the dense `(cell, hour)` demand tensor.

pub mod aggregate;
pub mod hexgrid;
pub mod region;
pub mod resample;

pub use aggregate::{
    AggVerb, AggregationReport, AggregationSpec, DemandRow, DemandTensor, SpatialAggregator,
};
pub use hexgrid::{HOURS_PER_DAY, HexGrid};
pub use region::{GeoPoint, Region};
pub use resample::{HourlyDemandRecord, resample};
