//! Live per-vehicle simulation state.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use super::event::{ChargingEvent, charge_duration};
use super::trajectory::Trajectory;

/// Constant physical parameters of a vehicle model and its charger.
///
/// # Examples
///
/// ```
/// use ev_demand_sim::sim::vehicle::VehicleSpec;
///
/// let spec = VehicleSpec::default();
/// assert_eq!(spec.battery_capacity_kwh, 55.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleSpec {
    /// Range on a full battery (miles).
    pub range_miles: f64,
    /// Usable battery capacity (kWh).
    pub battery_capacity_kwh: f64,
    /// SOC at the start of the trajectory (0-100).
    pub initial_soc: f64,
    /// Constant charger power used to derive session duration (kW).
    pub charge_rate_kw: f64,
}

impl Default for VehicleSpec {
    fn default() -> Self {
        Self {
            range_miles: 259.0,
            battery_capacity_kwh: 55.0,
            initial_soc: 100.0,
            charge_rate_kw: 50.0,
        }
    }
}

/// One vehicle's mutable simulation state backed by a shared trajectory.
///
/// Only [`drive`](Self::drive) and [`charge`](Self::charge) mutate the
/// state. Predictors get a read-only view through the accessors.
///
/// `state_of_charge` is deliberately left unclamped: a draw may push it
/// slightly below 0 and a charge may push it above 100.
#[derive(Debug, Clone)]
pub struct VehicleState {
    trajectory: Arc<Trajectory>,
    range_miles: f64,
    battery_capacity_kwh: f64,
    charge_rate_kw: f64,
    state_of_charge: f64,
    odometer_reading: f64,
    max_odometer: f64,
    time: NaiveDateTime,
    latitude: f64,
    longitude: f64,
    charging_events: Vec<ChargingEvent>,
}

impl VehicleState {
    /// Places a vehicle at the start of its trajectory.
    ///
    /// The odometer starts at the trajectory minimum, the clock at the
    /// earliest timestamp, and the position at the first sample.
    pub fn new(trajectory: Arc<Trajectory>, spec: VehicleSpec) -> Self {
        let first = *trajectory.first();
        Self {
            range_miles: spec.range_miles,
            battery_capacity_kwh: spec.battery_capacity_kwh,
            charge_rate_kw: spec.charge_rate_kw,
            state_of_charge: spec.initial_soc,
            odometer_reading: trajectory.min_odometer(),
            max_odometer: trajectory.max_odometer(),
            time: trajectory.start_time(),
            latitude: first.latitude,
            longitude: first.longitude,
            charging_events: Vec::new(),
            trajectory,
        }
    }

    /// Moves the vehicle forward by `miles` and drains the battery accordingly.
    ///
    /// Time and position snap to the trajectory sample whose odometer is
    /// closest to the new reading.
    pub fn drive(&mut self, miles: f64) {
        self.odometer_reading += miles;
        self.state_of_charge -= 100.0 * miles / self.range_miles;

        let nearest = self.trajectory.nearest_sample(self.odometer_reading);
        self.time = nearest.timestamp;
        self.latitude = nearest.latitude;
        self.longitude = nearest.longitude;
    }

    /// Adds `energy_kwh` to the battery and records the charging session.
    ///
    /// The session is anchored at the current time and position and lasts
    /// for the time the configured charge rate needs to deliver the energy.
    pub fn charge(&mut self, energy_kwh: f64) -> &ChargingEvent {
        let delta_soc = 100.0 * energy_kwh / self.battery_capacity_kwh;
        let duration = charge_duration(delta_soc, self.battery_capacity_kwh, self.charge_rate_kw);
        let end_time = self.time.checked_add_signed(duration).unwrap_or(self.time);

        let event = ChargingEvent {
            vehicle_id: self.trajectory.vehicle_id().to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            start_time: self.time,
            end_time,
            delta_soc,
            start_soc: self.state_of_charge,
            energy_kwh,
        };

        self.state_of_charge += delta_soc;
        self.charging_events.push(event);
        &self.charging_events[self.charging_events.len() - 1]
    }

    pub fn vehicle_id(&self) -> &str {
        self.trajectory.vehicle_id()
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn range_miles(&self) -> f64 {
        self.range_miles
    }

    pub fn battery_capacity_kwh(&self) -> f64 {
        self.battery_capacity_kwh
    }

    pub fn charge_rate_kw(&self) -> f64 {
        self.charge_rate_kw
    }

    pub fn state_of_charge(&self) -> f64 {
        self.state_of_charge
    }

    pub fn odometer_reading(&self) -> f64 {
        self.odometer_reading
    }

    /// Highest odometer reading in the backing trajectory.
    pub fn max_odometer(&self) -> f64 {
        self.max_odometer
    }

    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Miles drivable on the current charge.
    pub fn miles_available(&self) -> f64 {
        self.range_miles * self.state_of_charge / 100.0
    }

    /// SOC percentage points that can still be added before the battery is full.
    pub fn soc_headroom(&self) -> f64 {
        100.0 - self.state_of_charge
    }

    /// Events recorded so far, oldest first.
    pub fn charging_events(&self) -> &[ChargingEvent] {
        &self.charging_events
    }

    /// Consumes the state and hands back its recorded events.
    pub fn into_events(self) -> Vec<ChargingEvent> {
        self.charging_events
    }
}

impl fmt::Display for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: SoC={:.1}% odometer={:.1} mi time={} gps=({:.5}, {:.5})",
            self.vehicle_id(),
            self.state_of_charge,
            self.odometer_reading,
            self.time,
            self.latitude,
            self.longitude,
        )
    }
}
