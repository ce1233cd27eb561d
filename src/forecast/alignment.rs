//! Nearest-timestamp merge of two sample streams
//!
//! The join is one-directional: every element of the left series looks up its
//! nearest right element, and a right element may be reused any number of times.
//! Left elements with nothing in reach are dropped.

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use super::gap_fill::fill_gaps;
use super::solar::SolarPosition;
use crate::domain::{
    AlignedSample, ForecastRow, OperationalReadings, OperationalSample, Station, Timestamped,
    WeatherSample,
};

/// Station readings against weather observations (battery and calibration paths)
pub const STATION_WEATHER_TOLERANCE_MINUTES: i64 = 60;
/// Hourly forecast rows against denser historical operational rows
pub const FORECAST_HISTORY_TOLERANCE_MINUTES: i64 = 120;

/// Nearest element of `sorted` to `target`, if within `tolerance`.
///
/// `sorted` must be in ascending time order. Ties go to the earlier element.
pub fn nearest_within<'b, B: Timestamped>(
    sorted: &[&'b B],
    target: NaiveDateTime,
    tolerance: Duration,
) -> Option<&'b B> {
    // first element at or after target; already the first of its run of equal timestamps
    let after = sorted.partition_point(|b| b.timestamp() < target);

    let before = after.checked_sub(1).map(|last| {
        // walk back to the first element sharing that timestamp
        let ts = sorted[last].timestamp();
        sorted.partition_point(|b| b.timestamp() < ts)
    });

    let distance = |i: usize| (sorted[i].timestamp() - target).abs();

    let best = match (before, (after < sorted.len()).then_some(after)) {
        (Some(b), Some(a)) => {
            if distance(b) <= distance(a) {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    (distance(best) <= tolerance).then_some(sorted[best])
}

fn sorted_refs<T: Timestamped>(series: &[T]) -> Vec<&T> {
    let mut refs: Vec<&T> = series.iter().collect();
    refs.sort_by_key(|s| s.timestamp());
    refs
}

/// Pair every element of `series_a` with its nearest `series_b` element within `tolerance`.
///
/// Output follows `series_a` in ascending time order.
pub fn align_nearest<'a, 'b, A: Timestamped, B: Timestamped>(
    series_a: &'a [A],
    series_b: &'b [B],
    tolerance: Duration,
) -> Vec<(&'a A, &'b B)> {
    let sorted_b = sorted_refs(series_b);
    sorted_refs(series_a)
        .into_iter()
        .filter_map(|a| nearest_within(&sorted_b, a.timestamp(), tolerance).map(|b| (a, b)))
        .collect()
}

/// Merge station readings with weather observations into aligned samples.
///
/// Adds solar position, clamps the state of charge to [0, 100] and gap-fills it.
pub fn align_station_weather(
    operational: &[OperationalSample],
    weather: &[WeatherSample],
    station: &Station,
) -> Vec<AlignedSample> {
    let tolerance = Duration::minutes(STATION_WEATHER_TOLERANCE_MINUTES);
    let mut aligned: Vec<AlignedSample> = align_nearest(operational, weather, tolerance)
        .into_iter()
        .map(|(op, wx)| {
            let sun = SolarPosition::at(station, op.timestamp);
            AlignedSample {
                operational: *op,
                weather: *wx,
                solar_elevation_deg: sun.elevation_deg,
                solar_elevation_norm: sun.normalized,
                soc_clean: op.battery_soc_raw.clamp(0.0, 100.0),
            }
        })
        .collect();

    fill_soc_gaps(&mut aligned);

    debug!(
        operational = operational.len(),
        weather = weather.len(),
        aligned = aligned.len(),
        "aligned station readings with weather"
    );
    aligned
}

/// Gap-fill the cleaned state of charge across a chronological series.
pub fn fill_soc_gaps(samples: &mut [AlignedSample]) {
    let mut soc: Vec<f64> = samples.iter().map(|s| s.soc_clean).collect();
    fill_gaps(&mut soc);
    for (sample, value) in samples.iter_mut().zip(soc) {
        sample.soc_clean = value;
    }
}

/// Attach the nearest historical operational context to forecast weather rows.
///
/// Rows with no operational sample in reach are kept with `context: None`.
pub fn forecast_rows(
    weather: &[WeatherSample],
    history: &[OperationalSample],
    station: &Station,
) -> Vec<ForecastRow> {
    let tolerance = Duration::minutes(FORECAST_HISTORY_TOLERANCE_MINUTES);
    let sorted_history = sorted_refs(history);

    sorted_refs(weather)
        .into_iter()
        .map(|wx| {
            let sun = SolarPosition::at(station, wx.timestamp);
            let context = nearest_within(&sorted_history, wx.timestamp, tolerance)
                .map(OperationalReadings::from_sample);
            ForecastRow {
                weather: *wx,
                solar_elevation_deg: sun.elevation_deg,
                solar_elevation_norm: sun.normalized,
                context,
            }
        })
        .collect()
}
