use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// A single simulated charging session.
///
/// Produced exactly once per [`VehicleState::charge`](super::vehicle::VehicleState::charge)
/// call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargingEvent {
    /// Identifier of the vehicle that charged.
    pub vehicle_id: String,
    /// Charger latitude in degrees.
    pub latitude: f64,
    /// Charger longitude in degrees.
    pub longitude: f64,
    /// Session start (plug-in) time.
    pub start_time: NaiveDateTime,
    /// Session end time, `start_time + charge_duration(..)`.
    pub end_time: NaiveDateTime,
    /// SOC added by the session, in percentage points.
    pub delta_soc: f64,
    /// SOC when the session began, in percentage points.
    pub start_soc: f64,
    /// Energy delivered (kWh).
    pub energy_kwh: f64,
}

impl ChargingEvent {
    /// Session length as a `TimeDelta`.
    pub fn duration(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    /// Session length in fractional hours.
    pub fn duration_hours(&self) -> f64 {
        self.duration().num_milliseconds() as f64 / MS_PER_HOUR
    }
}

/// Time needed to add `delta_soc` percentage points at a constant charge rate.
///
/// `hours = (delta_soc / 100) * battery_capacity_kwh / charge_rate_kw`,
/// rounded to the millisecond. Non-finite, negative, or out-of-range results
/// yield zero.
pub fn charge_duration(
    delta_soc: f64,
    battery_capacity_kwh: f64,
    charge_rate_kw: f64,
) -> TimeDelta {
    let hours = (delta_soc / 100.0) * battery_capacity_kwh / charge_rate_kw;
    if !hours.is_finite() || hours <= 0.0 {
        return TimeDelta::zero();
    }
    TimeDelta::try_milliseconds((hours * MS_PER_HOUR).round() as i64).unwrap_or(TimeDelta::zero())
}

impl fmt::Display for ChargingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | ({:.5}, {:.5}) | {} -> {} | start_soc={:.1}% delta_soc={:.1}% energy={:.2} kWh",
            self.vehicle_id,
            self.latitude,
            self.longitude,
            self.start_time,
            self.end_time,
            self.start_soc,
            self.delta_soc,
            self.energy_kwh,
        )
    }
}
