//! Bin to m/z conversion.
//!
//! A TOF bin converts to m/z through the frame's mass calibration and the
//! dataset's bin width and TOF correction time:
//!
//! ```text
//! t  = bin * bin_width_ns / 1000
//! mz = (slope * (t - tof_correction/1000 - intercept))^2 + residual(t)
//! residual(t) = a2*t + b2*t^3 + c2*t^5 + d2*t^7 + e2*t^9 + f2*t^11
//! ```
//!
//! The inverse used to turn an m/z window into bin bounds drops the
//! residual term; for real calibrations it is orders of magnitude below a
//! single bin.

use crate::params::{FrameParams, GlobalParams};

/// Converter between TOF bins and m/z for one frame's calibration
#[derive(Debug, Clone, Copy)]
pub struct MzCalibrator {
    slope: f64,
    intercept: f64,
    bin_width_ns: f64,
    tof_correction_time: f64,
    coefficients: [f64; 6],
}

impl MzCalibrator {
    /// Build a calibrator from a frame's calibration and the dataset
    /// globals.
    pub fn new(frame: &FrameParams, global: &GlobalParams) -> Self {
        Self {
            slope: frame.calibration_slope,
            intercept: frame.calibration_intercept,
            bin_width_ns: global.bin_width_ns,
            tof_correction_time: global.tof_correction_time,
            coefficients: frame.mass_error_coefficients(),
        }
    }

    /// Whether the calibration defines a bin/m-z conversion at all.
    ///
    /// Requires a strictly positive slope and bin width.
    pub fn is_defined(&self) -> bool {
        self.slope > 0.0 && self.bin_width_ns > 0.0
    }

    /// Convert a bin index to m/z. Returns 0.0 when the calibration is
    /// undefined, matching historical behavior for uncalibrated frames.
    pub fn bin_to_mz(&self, bin: f64) -> f64 {
        if !self.is_defined() {
            return 0.0;
        }
        let t = bin * self.bin_width_ns / 1000.0;
        let term = self.slope * (t - self.tof_correction_time / 1000.0 - self.intercept);
        term * term + self.residual(t)
    }

    /// Convert an m/z to a fractional bin index, ignoring the residual
    /// polynomial. Returns `None` for undefined calibrations or negative
    /// m/z.
    pub fn mz_to_bin(&self, mz: f64) -> Option<f64> {
        if !self.is_defined() || mz < 0.0 {
            return None;
        }
        let t = mz.sqrt() / self.slope + self.intercept + self.tof_correction_time / 1000.0;
        Some(t * 1000.0 / self.bin_width_ns)
    }

    fn residual(&self, t: f64) -> f64 {
        let [a2, b2, c2, d2, e2, f2] = self.coefficients;
        if a2 == 0.0 && b2 == 0.0 && c2 == 0.0 && d2 == 0.0 && e2 == 0.0 && f2 == 0.0 {
            return 0.0;
        }
        let t2 = t * t;
        let t3 = t2 * t;
        let t5 = t3 * t2;
        let t7 = t5 * t2;
        let t9 = t7 * t2;
        let t11 = t9 * t2;
        a2 * t + b2 * t3 + c2 * t5 + d2 * t7 + e2 * t9 + f2 * t11
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{FrameParams, FrameType, GlobalParams};

    fn fixture(slope: f64, intercept: f64) -> MzCalibrator {
        let mut frame = FrameParams::new(FrameType::Ms1);
        frame.calibration_slope = slope;
        frame.calibration_intercept = intercept;
        let mut global = GlobalParams::new();
        global.bin_width_ns = 1.0;
        global.bins = 10;
        MzCalibrator::new(&frame, &global)
    }

    #[test]
    fn known_bin_converts() {
        let cal = fixture(0.5, 0.0);
        let mz = cal.bin_to_mz(6.0);
        assert!((mz - 9.0e-6).abs() < 1e-18);
    }

    #[test]
    fn inverse_recovers_bin() {
        let cal = fixture(0.35, 0.03);
        for bin in [100.0, 5_000.0, 147_999.0] {
            let mz = cal.bin_to_mz(bin);
            let back = cal.mz_to_bin(mz).unwrap();
            assert!((back - bin).abs() < 1e-6, "bin {bin} came back as {back}");
        }
    }

    #[test]
    fn residual_polynomial_contributes() {
        let mut frame = FrameParams::new(FrameType::Ms1);
        frame.calibration_slope = 0.5;
        frame.mass_error_a2 = 0.001;
        let mut global = GlobalParams::new();
        global.bin_width_ns = 1.0;
        let cal = MzCalibrator::new(&frame, &global);

        let t = 6.0 * 1.0 / 1000.0;
        let expected = (0.5 * t) * (0.5 * t) + 0.001 * t;
        assert!((cal.bin_to_mz(6.0) - expected).abs() < 1e-18);
    }

    #[test]
    fn undefined_calibration_yields_zero() {
        let cal = fixture(0.0, 0.0);
        assert_eq!(cal.bin_to_mz(100.0), 0.0);
        assert!(cal.mz_to_bin(50.0).is_none());
    }
}
