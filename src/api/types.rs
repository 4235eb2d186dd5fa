//! API response and query types.
//!
//! Field names follow the tensor CSV columns so both outputs read the same.

use serde::{Deserialize, Serialize};

use crate::demand::DemandRow;

/// One `(cell, hour)` row of the demand tensor.
#[derive(Debug, Serialize)]
pub struct DemandRowDto {
    /// H3 cell index in its hexadecimal string form.
    pub hex_id: String,
    /// Hour of day in `0..24`.
    pub hour: u32,
    pub energy_kwh: f64,
    pub delta_soc: f64,
    pub start_soc: f64,
    pub minutes: f64,
    pub observations: usize,
}

impl From<&DemandRow> for DemandRowDto {
    fn from(r: &DemandRow) -> Self {
        Self {
            hex_id: r.hex_id.to_string(),
            hour: r.hour,
            energy_kwh: r.energy_kwh,
            delta_soc: r.delta_soc,
            start_soc: r.start_soc,
            minutes: r.minutes,
            observations: r.observations,
        }
    }
}

/// Optional hour filter for the demand endpoints.
#[derive(Debug, Deserialize)]
pub struct HourQuery {
    pub hour: Option<u32>,
}

/// Optional vehicle filter for the events endpoint.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub vehicle_id: Option<String>,
}

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::GeoPoint;
    use crate::demand::hexgrid::to_cell;
    use h3o::Resolution;

    #[test]
    fn demand_row_dto_uses_hex_string() {
        let cell = to_cell(GeoPoint::new(34.05, -118.25), Resolution::Eight).expect("valid point");
        let row = DemandRow {
            hex_id: cell,
            hour: 17,
            energy_kwh: 12.5,
            delta_soc: 22.7,
            start_soc: 41.0,
            minutes: 30.0,
            observations: 2,
        };
        let dto = DemandRowDto::from(&row);

        assert_eq!(dto.hex_id, cell.to_string());
        assert_eq!(dto.hex_id.len(), 15);
        assert_eq!(dto.hour, 17);
        assert_eq!(dto.energy_kwh, 12.5);
        assert_eq!(dto.observations, 2);
    }
}
