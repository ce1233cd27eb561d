//! # Solar Geometry
//!
//! Simplified solar elevation from latitude and local wall-clock time.
//! No longitude/timezone correction and no atmospheric refraction.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::domain::Station;

pub const MIN_ELEVATION_DEG: f64 = -5.0;
pub const MAX_ELEVATION_DEG: f64 = 90.0;

/// Solar elevation angle in degrees, unclamped.
///
/// declination = 23.45° · sin(360° · (284 + day_of_year) / 365)
/// hour_angle  = 15° · (hour + minute / 60 − 12)
pub fn solar_elevation(latitude_deg: f64, _longitude_deg: f64, local: NaiveDateTime) -> f64 {
    let day_of_year = local.ordinal() as f64;
    let hour = local.hour() as f64 + local.minute() as f64 / 60.0;

    let declination = (23.45 * (360.0 * (284.0 + day_of_year) / 365.0).to_radians().sin())
        .to_radians();
    let hour_angle = (15.0 * (hour - 12.0)).to_radians();
    let latitude = latitude_deg.to_radians();

    let sin_elevation = latitude.sin() * declination.sin()
        + latitude.cos() * declination.cos() * hour_angle.cos();

    sin_elevation.clamp(-1.0, 1.0).asin().to_degrees()
}

/// Elevation limited to [-5°, 90°]
pub fn clamp_elevation(elevation_deg: f64) -> f64 {
    elevation_deg.clamp(MIN_ELEVATION_DEG, MAX_ELEVATION_DEG)
}

/// Map an elevation onto [0, 1]: max(0, elevation) / 90
pub fn normalize_elevation(elevation_deg: f64) -> f64 {
    (elevation_deg.max(0.0) / MAX_ELEVATION_DEG).min(1.0)
}

/// Clamped and normalized sun position at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarPosition {
    pub elevation_deg: f64,
    pub normalized: f64,
}

impl SolarPosition {
    pub fn at(station: &Station, local: NaiveDateTime) -> Self {
        let elevation_deg = clamp_elevation(solar_elevation(
            station.latitude,
            station.longitude,
            local,
        ));
        Self {
            elevation_deg,
            normalized: normalize_elevation(elevation_deg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const STOCKHOLM: Station = Station {
        latitude: 59.33,
        longitude: 18.06,
    };

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_summer_noon_elevation() {
        // 90 - (59.33 - 23.45)
        let elevation = solar_elevation(59.33, 18.06, at(6, 20, 12));
        assert!((elevation - 54.12).abs() < 0.2, "got {}", elevation);
    }

    #[test]
    fn test_winter_noon_lower_than_summer() {
        let summer = solar_elevation(59.33, 18.06, at(6, 20, 12));
        let winter = solar_elevation(59.33, 18.06, at(12, 21, 12));
        assert!(winter < 10.0, "got {}", winter);
        assert!(winter < summer);
    }

    #[test]
    fn test_longitude_is_ignored() {
        let a = solar_elevation(45.0, 0.0, at(3, 21, 9));
        let b = solar_elevation(45.0, 120.0, at(3, 21, 9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_midnight_is_clamped() {
        let position = SolarPosition::at(&STOCKHOLM, at(6, 20, 0));
        assert_eq!(position.elevation_deg, MIN_ELEVATION_DEG);
        assert_eq!(position.normalized, 0.0);
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_elevation(45.0), 0.5);
        assert_eq!(normalize_elevation(-3.0), 0.0);
        assert_eq!(normalize_elevation(90.0), 1.0);
    }
}
