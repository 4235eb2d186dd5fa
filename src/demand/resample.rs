//! Temporal resampling of charging events into hour-of-day demand.

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde::Serialize;

use crate::sim::event::ChargingEvent;

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: i64 = 3_600_000;

/// One event's share of demand within a single hour of the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyDemandRecord {
    /// Position of the source event in the resampled input.
    pub event_id: usize,
    pub vehicle_id: String,
    /// Hour of day in `0..24`.
    pub hour_of_day: u32,
    /// Top of the first clock hour in which this hour of day occurred.
    pub period_start: NaiveDateTime,
    /// Whole minutes of the event that fall in this hour of day.
    pub minutes_in_hour: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub delta_soc_share: f64,
    pub energy_share: f64,
    /// Plug-in SOC of the source event.
    pub start_soc: f64,
}

/// Minutes of a single hour of day within an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourSlice {
    pub hour_of_day: u32,
    pub period_start: NaiveDateTime,
    pub minutes: u32,
}

/// Splits the whole minutes of `[start, end)` by hour of day.
///
/// Minute `k` starts at `start + k` minutes for `k < floor(duration)`. A
/// partial trailing minute is not counted. Slices for the same hour of day
/// (intervals longer than a day) are merged, keeping the earliest
/// `period_start`. Slices are returned in order of first occurrence.
pub fn minutes_by_hour(start: NaiveDateTime, end: NaiveDateTime) -> Vec<HourSlice> {
    let total_ms = (end - start).num_milliseconds();
    let total_minutes = total_ms.div_euclid(MS_PER_MINUTE);
    if total_minutes <= 0 {
        return Vec::new();
    }

    let offset_ms = i64::from(start.minute()) * MS_PER_MINUTE
        + i64::from(start.second()) * 1_000
        + i64::from(start.nanosecond() / 1_000_000);
    let top_of_hour = start
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(start);

    let mut slices: Vec<HourSlice> = Vec::new();
    let mut minute = 0_i64;
    let mut segment = 0_i64;
    while minute < total_minutes {
        let boundary_ms = MS_PER_HOUR * (segment + 1) - offset_ms;
        let next_minute = ceil_div(boundary_ms, MS_PER_MINUTE).min(total_minutes);
        let count = next_minute - minute;

        if count > 0 {
            let hour_of_day = ((i64::from(start.hour()) + segment) % 24) as u32;
            match slices.iter_mut().find(|s| s.hour_of_day == hour_of_day) {
                Some(slice) => slice.minutes += count as u32,
                None => slices.push(HourSlice {
                    hour_of_day,
                    period_start: top_of_hour + TimeDelta::hours(segment),
                    minutes: count as u32,
                }),
            }
        }

        minute = next_minute;
        segment += 1;
    }
    slices
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    -((-numerator).div_euclid(denominator))
}

/// Redistributes each event's energy and SOC delta across the hours it spans.
///
/// Each event is identified by its position in `events`. Shares are proportional
/// to the minutes in each hour, so they sum to the event totals. Events
/// shorter than one minute produce no records.
///
/// Output is ordered by event id, then by first occurrence of each hour.
pub fn resample<'a>(
    events: impl IntoIterator<Item = &'a ChargingEvent>,
) -> Vec<HourlyDemandRecord> {
    let mut records = Vec::new();
    let mut event_count = 0_usize;
    let mut dropped = 0_usize;

    for (event_id, event) in events.into_iter().enumerate() {
        event_count += 1;
        let slices = minutes_by_hour(event.start_time, event.end_time);
        let minutes_sum: u32 = slices.iter().map(|s| s.minutes).sum();
        if minutes_sum == 0 {
            dropped += 1;
            continue;
        }

        let total = f64::from(minutes_sum);
        records.extend(slices.into_iter().map(|slice| {
            let weight = f64::from(slice.minutes) / total;
            HourlyDemandRecord {
                event_id,
                vehicle_id: event.vehicle_id.clone(),
                hour_of_day: slice.hour_of_day,
                period_start: slice.period_start,
                minutes_in_hour: slice.minutes,
                latitude: event.latitude,
                longitude: event.longitude,
                delta_soc_share: event.delta_soc * weight,
                energy_share: event.energy_kwh * weight,
                start_soc: event.start_soc,
            }
        }));
    }

    tracing::debug!(
        events = event_count,
        records = records.len(),
        dropped,
        "resampled charging events to hourly demand"
    );
    records
}
