//! Full-range depth transform.
//!
//! Transforms a k-space-resampled spectrum into the complete depth-domain
//! magnitude profile: FFT, magnitude, and the non-negative half of the OPD
//! axis derived from the grid spacing. The windowed peak detector then scopes
//! searches into this single full-range result.

use num_complex::Complex64;
use rustfft::FftPlanner;
use std::f64::consts::PI;

/// Full-spectrum transform stage.
///
/// Wraps an FFT planner so repeated per-point calls of the same length reuse
/// the planned transform.
pub struct FullRangeTransform {
    planner: FftPlanner<f64>,
}

impl FullRangeTransform {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Transform a resampled spectrum into `(opd_axis_m, magnitude)`.
    ///
    /// The OPD axis is the non-negative half of the discrete frequency axis
    /// for a grid sampled at `dk` rad/m: `opd[i] = 2π·i/(n·dk)` meters. Both
    /// returned sequences have `(n+1)/2` entries.
    pub fn process(&mut self, signal: &[f64], dk: f64) -> (Vec<f64>, Vec<f64>) {
        let n = signal.len();
        if n == 0 {
            return (Vec::new(), Vec::new());
        }

        let mut buffer: Vec<Complex64> =
            signal.iter().map(|&s| Complex64::new(s, 0.0)).collect();
        self.planner.plan_fft_forward(n).process(&mut buffer);

        // Non-negative frequencies only: n/2 bins for even n, (n+1)/2 for odd.
        let n_pos = n.div_ceil(2);
        let bin = 2.0 * PI / (n as f64 * dk);
        let opd: Vec<f64> = (0..n_pos).map(|i| i as f64 * bin).collect();
        let magnitude: Vec<f64> = buffer[..n_pos].iter().map(|c| c.norm()).collect();

        (opd, magnitude)
    }
}

impl Default for FullRangeTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_fringe_peaks_at_its_opd() {
        // A pure fringe cos(k·x₀) sampled on a uniform k grid must transform
        // into a peak at OPD x₀.
        let n = 1024;
        let dk = 600.0; // rad/m
        let x0 = 0.8e-3; // meters
        let signal: Vec<f64> = (0..n).map(|i| (i as f64 * dk * x0).cos()).collect();

        let mut transform = FullRangeTransform::new();
        let (opd, mag) = transform.process(&signal, dk);
        assert_eq!(opd.len(), n / 2);
        assert_eq!(mag.len(), n / 2);

        // Skip the DC bin when locating the fringe peak
        let peak = mag
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let bin = 2.0 * PI / (n as f64 * dk);
        assert!((opd[peak] - x0).abs() < bin, "peak at {} m", opd[peak]);
    }

    #[test]
    fn axis_spacing_follows_grid() {
        let signal = vec![0.0; 128];
        let mut transform = FullRangeTransform::new();
        let (opd, _) = transform.process(&signal, 500.0);
        let expected = 2.0 * PI / (128.0 * 500.0);
        assert!((opd[1] - opd[0] - expected).abs() < 1e-15);
        assert_eq!(opd[0], 0.0);
    }

    #[test]
    fn odd_length_keeps_extra_bin() {
        let signal = vec![1.0; 129];
        let mut transform = FullRangeTransform::new();
        let (opd, mag) = transform.process(&signal, 500.0);
        assert_eq!(opd.len(), 65);
        assert_eq!(mag.len(), 65);
    }

    #[test]
    fn empty_signal_yields_empty_profile() {
        let mut transform = FullRangeTransform::new();
        let (opd, mag) = transform.process(&[], 500.0);
        assert!(opd.is_empty());
        assert!(mag.is_empty());
    }
}
