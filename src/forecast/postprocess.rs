//! Raw model output to reported forecast value
//!
//! The steps run in a fixed order. Clipping and clamping are non-linear, so the
//! capacity clip is applied both before and after the calibration slope.

use serde::{Deserialize, Serialize};

use crate::domain::Calibration;

pub const DEFAULT_PERFORMANCE_RATIO: f64 = 0.8;

/// Irradiance (W/m²) at which the fade saturates without help from sun height
const FADE_IRRADIANCE_REF: f64 = 800.0;
const FADE_CLOUD_DIVISOR: f64 = 300.0;
const FADE_ELEVATION_WEIGHT: f64 = 0.3;

/// Dampening in [0, 1] under cloud and low sun.
pub fn fade_factor(
    irradiance_w_m2: f64,
    cloud_cover_percent: f64,
    solar_elevation_norm: f64,
) -> f64 {
    let fade = (irradiance_w_m2 / FADE_IRRADIANCE_REF)
        * (1.0 - cloud_cover_percent / FADE_CLOUD_DIVISOR)
        + solar_elevation_norm * FADE_ELEVATION_WEIGHT;
    fade.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostProcessingChain {
    /// Derate divided out of the faded output; ignored when not positive
    pub performance_ratio: f64,
    /// Plant power limit (kW); 0 disables clipping
    pub capacity_kw: f64,
    pub calibration: Calibration,
}

impl Default for PostProcessingChain {
    fn default() -> Self {
        Self::new(DEFAULT_PERFORMANCE_RATIO, 0.0)
    }
}

impl PostProcessingChain {
    /// Chain with identity calibration.
    pub fn new(performance_ratio: f64, capacity_kw: f64) -> Self {
        Self {
            performance_ratio,
            capacity_kw,
            calibration: Calibration::IDENTITY,
        }
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    fn clip(&self, kw: f64) -> f64 {
        if self.capacity_kw > 0.0 {
            kw.min(self.capacity_kw)
        } else {
            kw
        }
    }

    /// Clamp, fade, derate and clip. This is what calibration is fitted against.
    pub fn pre_calibration_kw(&self, raw_kw: f64, fade: f64) -> f64 {
        let mut kw = raw_kw.max(0.0) * fade;
        if self.performance_ratio > 0.0 {
            kw /= self.performance_ratio;
        }
        self.clip(kw)
    }

    /// Full chain in kW. Only the calibration slope is applied; the intercept is not.
    pub fn final_kw(&self, raw_kw: f64, fade: f64) -> f64 {
        let calibrated = self.pre_calibration_kw(raw_kw, fade) * self.calibration.slope;
        self.clip(calibrated.max(0.0))
    }

    /// Reported value in W.
    pub fn final_watts(&self, raw_kw: f64, fade: f64) -> f64 {
        self.final_kw(raw_kw, fade) * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_capacity_clipped_before_and_after_slope() {
        let chain = PostProcessingChain::new(1.0, 5.0).with_calibration(Calibration {
            slope: 2.0,
            intercept: 0.0,
        });
        assert_eq!(chain.pre_calibration_kw(10.0, 1.0), 5.0);
        assert_eq!(chain.final_watts(10.0, 1.0), 5000.0);
    }

    #[test]
    fn test_negative_raw_output_is_zero() {
        let chain = PostProcessingChain::default();
        assert_eq!(chain.final_watts(-3.0, 1.0), 0.0);
    }

    #[test]
    fn test_negative_slope_clamped() {
        let chain = PostProcessingChain::new(1.0, 0.0).with_calibration(Calibration {
            slope: -1.0,
            intercept: 0.0,
        });
        assert_eq!(chain.final_kw(4.0, 1.0), 0.0);
    }

    #[test]
    fn test_intercept_not_applied() {
        let chain = PostProcessingChain::new(1.0, 0.0).with_calibration(Calibration {
            slope: 1.0,
            intercept: 3.0,
        });
        assert_eq!(chain.final_kw(2.0, 1.0), 2.0);
    }

    #[test]
    fn test_performance_ratio_divides() {
        let chain = PostProcessingChain::new(0.8, 0.0);
        assert!((chain.pre_calibration_kw(4.0, 0.5) - 2.5).abs() < 1e-12);

        let no_ratio = PostProcessingChain::new(0.0, 0.0);
        assert_eq!(no_ratio.pre_calibration_kw(4.0, 0.5), 2.0);
    }

    #[test]
    fn test_fade_factor() {
        assert_eq!(fade_factor(800.0, 0.0, 0.0), 1.0);
        assert_eq!(fade_factor(0.0, 100.0, 0.0), 0.0);
        assert!((fade_factor(400.0, 150.0, 0.5) - 0.4).abs() < 1e-12);
        assert_eq!(fade_factor(2000.0, 0.0, 1.0), 1.0);
    }

    proptest! {
        #[test]
        fn prop_output_within_capacity(
            raw in -50.0..50.0f64,
            irradiance in 0.0..1200.0f64,
            cloud in 0.0..100.0f64,
            elevation in 0.0..1.0f64,
            slope in -3.0..3.0f64,
            capacity in 0.1..20.0f64,
        ) {
            let chain = PostProcessingChain::new(DEFAULT_PERFORMANCE_RATIO, capacity)
                .with_calibration(Calibration { slope, intercept: 0.0 });
            let kw = chain.final_kw(raw, fade_factor(irradiance, cloud, elevation));
            prop_assert!(kw >= 0.0);
            prop_assert!(kw <= capacity);
        }
    }
}
