//! The k-space grid cache and the wavelength-to-wavenumber resampler.
//!
//! The sampled-Fourier relationship between spectrum and depth profile only
//! holds when the spectrum is uniformly sampled in wavenumber `k = 2π/λ`.
//! Detector pixels are (roughly) uniform in wavelength, so every acquisition
//! must be remapped onto a uniform k grid before any transform runs.
//!
//! The grid depends only on the wavelength axis, which is fixed for a given
//! detector, so it is cached and only recomputed when the incoming axis
//! actually differs from the cached snapshot (length mismatch, or any sample
//! out of tolerance). During a scan this check runs once per point and the
//! recompute almost never fires.

use crate::dsp::spline::CubicSpline;
use crate::error::{OctError, OctResult};
use std::f64::consts::PI;

/// Relative tolerance for the cache-validity comparison.
pub const AXIS_RTOL: f64 = 1e-5;
/// Absolute tolerance for the cache-validity comparison.
pub const AXIS_ATOL: f64 = 1e-8;

/// Interpolation strategy for the resampling step.
///
/// `Spline` is the default, higher-quality strategy. `Linear` is required
/// whenever the per-window CZT path is active (the CZT already resamples the
/// output axis finely) and is the internal fallback when spline construction
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleStrategy {
    Spline,
    Linear,
}

/// Cached uniform k-space grid derived from a wavelength axis.
///
/// Holds the source-axis snapshot it was built from, the reversed-ascending
/// wavenumber axis `k`, the linearized grid `k_lin` spanning the same range
/// with the same sample count, the grid spacing `dk`, and the derived sample
/// rate `fs = 2π/dk` used by the transform stages.
#[derive(Debug, Clone, Default)]
pub struct KSpaceCache {
    /// Snapshot of the source wavelength axis, in meters.
    wavelengths_m: Vec<f64>,
    /// Wavenumber axis `2π/λ`, reversed to ascending order.
    k: Vec<f64>,
    /// Uniform grid over `[k[0], k[last]]` with the same sample count.
    k_lin: Vec<f64>,
    /// Mean spacing of `k_lin`.
    dk: f64,
    /// Sample rate of the uniform grid, `2π/dk`.
    fs: f64,
}

impl KSpaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the cache against a wavelength axis (nanometers), rebuilding
    /// the grid if the axis changed. Returns `true` when a rebuild happened.
    ///
    /// # Errors
    ///
    /// Fails with [`OctError::Processing`] if the axis has fewer than two
    /// samples; a one-pixel spectrum has no spacing to derive a grid from.
    pub fn refresh(&mut self, wavelengths_nm: &[f64]) -> OctResult<bool> {
        if wavelengths_nm.len() < 2 {
            return Err(OctError::Processing(format!(
                "wavelength axis too short: {} samples",
                wavelengths_nm.len()
            )));
        }

        let wl_m: Vec<f64> = wavelengths_nm.iter().map(|wl| wl * 1e-9).collect();
        if self.matches(&wl_m) {
            return Ok(false);
        }

        let n = wl_m.len();
        let mut k: Vec<f64> = wl_m.iter().map(|wl| 2.0 * PI / wl).collect();
        k.reverse();

        let k0 = k[0];
        let k1 = k[n - 1];
        let k_lin: Vec<f64> = (0..n)
            .map(|i| k0 + (k1 - k0) * i as f64 / (n - 1) as f64)
            .collect();

        let dk = k_lin
            .windows(2)
            .map(|w| w[1] - w[0])
            .sum::<f64>()
            / (n - 1) as f64;

        log::debug!(
            "k-space grid rebuilt: {} samples, dk = {:.6e} rad/m",
            n,
            dk
        );

        self.wavelengths_m = wl_m;
        self.k = k;
        self.k_lin = k_lin;
        self.dk = dk;
        self.fs = 2.0 * PI / dk;
        Ok(true)
    }

    fn matches(&self, wl_m: &[f64]) -> bool {
        self.wavelengths_m.len() == wl_m.len()
            && self
                .wavelengths_m
                .iter()
                .zip(wl_m.iter())
                .all(|(cached, new)| (cached - new).abs() <= AXIS_ATOL + AXIS_RTOL * new.abs())
    }

    /// Resample an intensity axis onto the cached uniform grid.
    ///
    /// The intensity sequence is reversed to pair with the reversed wavenumber
    /// axis, then interpolated at every `k_lin` position. A spline that fails
    /// to construct is recovered by re-attempting with the linear strategy;
    /// the failure never reaches the caller.
    ///
    /// # Errors
    ///
    /// Fails with [`OctError::Processing`] if the cache is empty or the
    /// intensity length does not match the cached axis.
    pub fn resample(
        &self,
        intensities: &[f64],
        strategy: ResampleStrategy,
    ) -> OctResult<Vec<f64>> {
        if self.k.is_empty() {
            return Err(OctError::Processing(
                "k-space cache not initialized; call refresh first".into(),
            ));
        }
        if intensities.len() != self.k.len() {
            return Err(OctError::Processing(format!(
                "intensity length {} does not match grid length {}",
                intensities.len(),
                self.k.len()
            )));
        }

        let mut s: Vec<f64> = intensities.to_vec();
        s.reverse();

        match strategy {
            ResampleStrategy::Spline => match CubicSpline::new(&self.k, &s) {
                Ok(spline) => Ok(spline.evaluate_many(&self.k_lin)),
                Err(err) => {
                    log::warn!("spline resampling failed ({err}); falling back to linear");
                    Ok(self.linear_resample(&s))
                }
            },
            ResampleStrategy::Linear => Ok(self.linear_resample(&s)),
        }
    }

    /// Piecewise-linear interpolation of `s` (paired with `self.k`) at every
    /// `k_lin` position, clamped at the grid ends.
    fn linear_resample(&self, s: &[f64]) -> Vec<f64> {
        let k = &self.k;
        let n = k.len();
        self.k_lin
            .iter()
            .map(|&x| {
                if x <= k[0] {
                    return s[0];
                }
                if x >= k[n - 1] {
                    return s[n - 1];
                }
                let mut lo = 0;
                let mut hi = n - 1;
                while hi - lo > 1 {
                    let mid = (lo + hi) / 2;
                    if k[mid] > x {
                        hi = mid;
                    } else {
                        lo = mid;
                    }
                }
                let h = k[hi] - k[lo];
                if h == 0.0 {
                    s[hi]
                } else {
                    s[lo] + (s[hi] - s[lo]) * (x - k[lo]) / h
                }
            })
            .collect()
    }

    /// The uniform wavenumber grid.
    pub fn k_lin(&self) -> &[f64] {
        &self.k_lin
    }

    /// Grid spacing in rad/m.
    pub fn dk(&self) -> f64 {
        self.dk
    }

    /// Sample rate of the uniform grid, `2π/dk` (meters of OPD).
    pub fn fs(&self) -> f64 {
        self.fs
    }

    pub fn is_initialized(&self) -> bool {
        !self.k.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(n: usize) -> Vec<f64> {
        // Ascending wavelength axis, 780..920 nm
        (0..n)
            .map(|i| 780.0 + 140.0 * i as f64 / (n - 1) as f64)
            .collect()
    }

    #[test]
    fn grid_is_ascending_and_uniform() {
        let mut cache = KSpaceCache::new();
        assert!(cache.refresh(&axis(512)).unwrap());
        let k_lin = cache.k_lin();
        for w in k_lin.windows(2) {
            assert!(w[1] > w[0]);
            assert!((w[1] - w[0] - cache.dk()).abs() < 1e-6 * cache.dk());
        }
        assert!((cache.fs() - 2.0 * PI / cache.dk()).abs() < 1e-9);
    }

    #[test]
    fn refresh_skips_unchanged_axis() {
        let mut cache = KSpaceCache::new();
        assert!(cache.refresh(&axis(256)).unwrap());
        assert!(!cache.refresh(&axis(256)).unwrap());

        // Sub-tolerance jitter must not invalidate the cache
        let mut jittered = axis(256);
        for wl in jittered.iter_mut() {
            *wl += *wl * 1e-9;
        }
        assert!(!cache.refresh(&jittered).unwrap());
    }

    #[test]
    fn refresh_rebuilds_on_real_change() {
        let mut cache = KSpaceCache::new();
        assert!(cache.refresh(&axis(256)).unwrap());

        let mut shifted = axis(256);
        shifted[100] += 0.5; // half a nanometer is far beyond tolerance
        assert!(cache.refresh(&shifted).unwrap());

        // Length change always rebuilds
        assert!(cache.refresh(&axis(128)).unwrap());
    }

    #[test]
    fn linear_resampling_is_exact_for_linear_data() {
        let mut cache = KSpaceCache::new();
        let wl = axis(128);
        cache.refresh(&wl).unwrap();

        // Intensities linear in k: after reversal and interpolation onto the
        // uniform grid the values must lie on the same line.
        let intens: Vec<f64> = wl
            .iter()
            .map(|wl_nm| {
                let k = 2.0 * PI / (wl_nm * 1e-9);
                3.0 * k * 1e-7 + 1.0
            })
            .collect();
        let out = cache.resample(&intens, ResampleStrategy::Linear).unwrap();
        for (i, &v) in out.iter().enumerate() {
            let expected = 3.0 * cache.k_lin()[i] * 1e-7 + 1.0;
            assert!((v - expected).abs() < 1e-9, "index {i}");
        }
    }

    #[test]
    fn spline_resampling_matches_smooth_signal() {
        let mut cache = KSpaceCache::new();
        let wl = axis(256);
        cache.refresh(&wl).unwrap();

        let intens: Vec<f64> = wl
            .iter()
            .map(|wl_nm| {
                let k = 2.0 * PI / (wl_nm * 1e-9);
                (k * 1e-6).sin()
            })
            .collect();
        let out = cache.resample(&intens, ResampleStrategy::Spline).unwrap();
        for (i, &v) in out.iter().enumerate() {
            let expected = (cache.k_lin()[i] * 1e-6).sin();
            assert!((v - expected).abs() < 1e-4, "index {i}");
        }
    }

    #[test]
    fn spline_failure_falls_back_to_linear() {
        let mut cache = KSpaceCache::new();
        let wl = axis(64);
        cache.refresh(&wl).unwrap();

        // A non-finite intensity sample makes spline construction fail; the
        // resampler must still return a result via the linear path.
        let mut intens = vec![1.0; 64];
        intens[10] = f64::NAN;
        let out = cache.resample(&intens, ResampleStrategy::Spline).unwrap();
        assert_eq!(out.len(), 64);
    }

    #[test]
    fn rejects_uninitialized_cache() {
        let cache = KSpaceCache::new();
        assert!(cache.resample(&[1.0, 2.0], ResampleStrategy::Linear).is_err());
    }

    #[test]
    fn rejects_short_axis() {
        let mut cache = KSpaceCache::new();
        assert!(cache.refresh(&[800.0]).is_err());
    }
}
