//! Seeded synthetic trajectories and charging history.
//!
//! Lets a scenario run end to end without external data files.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::SyntheticConfig;
use crate::demand::region::BoundingBox;
use crate::demand::{GeoPoint, Region};
use crate::error::SimError;
use crate::predictors::types::gaussian_noise;
use crate::predictors::{ChargingHistory, HistoryRecord};
use crate::sim::trajectory::{Trajectory, TrajectorySample};

/// Seed offset for history generation so it does not correlate with movement.
const HISTORY_SEED_OFFSET: u64 = 7919;

const KM_PER_MILE: f64 = 1.609_344;
const KM_PER_DEGREE: f64 = 111.32;
const START_PLACEMENT_ATTEMPTS: usize = 1000;

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 3, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Generates one random-walk trajectory per vehicle inside `region`.
///
/// Each day a vehicle covers a uniform draw from
/// `[daily_miles_min, daily_miles_max]`, spread unevenly over
/// `samples_per_day` evenly spaced samples. Positions wander with random
/// headings and are kept inside the region's bounding box.
///
/// # Arguments
///
/// * `config` - Fleet size and movement parameters
/// * `region` - Area the vehicles start in
/// * `seed` - Master seed; vehicle `i` uses `seed + i`
pub fn trajectories(
    config: &SyntheticConfig,
    region: &Region,
    seed: u64,
) -> Result<Vec<Trajectory>, SimError> {
    let bbox = region.bounding_box();
    let samples_per_day = config.samples_per_day.max(2);
    let interval = TimeDelta::seconds(86_400 / samples_per_day as i64);

    (0..config.vehicles)
        .map(|v| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(v as u64));
            let mut position = start_position(region, &mut rng);
            let mut odometer = 0.0_f64;
            let mut time = epoch();
            let mut samples = Vec::with_capacity(config.days * samples_per_day + 1);

            samples.push(TrajectorySample {
                odometer,
                timestamp: time,
                latitude: position.latitude,
                longitude: position.longitude,
            });

            for _ in 0..config.days {
                let daily_miles = if config.daily_miles_max > config.daily_miles_min {
                    rng.random_range(config.daily_miles_min..config.daily_miles_max)
                } else {
                    config.daily_miles_min
                };
                // some legs are parked, so weights can be zero
                let weights: Vec<f64> = (0..samples_per_day)
                    .map(|_| {
                        if rng.random_bool(0.4) {
                            0.0
                        } else {
                            rng.random::<f64>()
                        }
                    })
                    .collect();
                let total_weight: f64 = weights.iter().sum();

                for w in weights {
                    let miles = if total_weight > 0.0 {
                        daily_miles * w / total_weight
                    } else {
                        daily_miles / samples_per_day as f64
                    };
                    odometer += miles;
                    time += interval;
                    position = step(position, miles, &mut rng, bbox);
                    samples.push(TrajectorySample {
                        odometer,
                        timestamp: time,
                        latitude: position.latitude,
                        longitude: position.longitude,
                    });
                }
            }

            Trajectory::new(format!("veh-{v:04}"), samples)
        })
        .collect()
}

fn start_position(region: &Region, rng: &mut StdRng) -> GeoPoint {
    let bbox = region.bounding_box();
    for _ in 0..START_PLACEMENT_ATTEMPTS {
        let candidate = GeoPoint::new(
            rng.random_range(bbox.min_lat..=bbox.max_lat),
            rng.random_range(bbox.min_lng..=bbox.max_lng),
        );
        if region.contains(candidate) {
            return candidate;
        }
    }
    GeoPoint::new(
        (bbox.min_lat + bbox.max_lat) / 2.0,
        (bbox.min_lng + bbox.max_lng) / 2.0,
    )
}

/// Moves `miles` in a random direction, reflecting off the bounding box.
fn step(from: GeoPoint, miles: f64, rng: &mut StdRng, bbox: BoundingBox) -> GeoPoint {
    if miles <= 0.0 {
        return from;
    }
    // straight-line displacement is a fraction of road distance
    let km = miles * KM_PER_MILE * rng.random_range(0.2..0.6);
    let heading = rng.random_range(0.0..std::f64::consts::TAU);
    let d_lat = km * heading.cos() / KM_PER_DEGREE;
    let d_lng = km * heading.sin() / (KM_PER_DEGREE * from.latitude.to_radians().cos());

    GeoPoint::new(
        reflect(from.latitude + d_lat, bbox.min_lat, bbox.max_lat),
        reflect(from.longitude + d_lng, bbox.min_lng, bbox.max_lng),
    )
}

fn reflect(value: f64, min: f64, max: f64) -> f64 {
    let reflected = if value < min {
        2.0 * min - value
    } else if value > max {
        2.0 * max - value
    } else {
        value
    };
    reflected.clamp(min, max)
}

/// Generates `history_events` plausible charging sessions.
///
/// Plug-in SOC is uniform in `[5, 90)`. The SOC delta falls linearly with
/// plug-in SOC plus Gaussian noise, kept within `[2, 100 - start_soc]`.
pub fn history(config: &SyntheticConfig, seed: u64) -> Result<ChargingHistory, SimError> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(HISTORY_SEED_OFFSET));
    let records = (0..config.history_events)
        .map(|_| {
            let start_soc = rng.random_range(5.0..90.0);
            let headroom = 100.0 - start_soc;
            let delta_soc =
                (80.0 - 0.7 * start_soc + gaussian_noise(&mut rng, 8.0)).clamp(2.0, headroom);
            HistoryRecord {
                start_soc,
                delta_soc,
            }
        })
        .collect();
    ChargingHistory::new(records)
}
