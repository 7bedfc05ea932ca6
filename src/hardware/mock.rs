//! Mock hardware implementations.
//!
//! Simulated devices for testing and hardware-free runs. All mocks use
//! async-safe operations (`tokio::time::sleep`, never `std::thread::sleep`).
//!
//! - `MockSpectrometer` - synthesizes interference spectra for a configurable
//!   set of reflectors, with dark subtraction and gamma correction applied
//!   the way the real detector module would
//! - `MockStage` - simulated 3-axis positioning stage with realistic motion
//!   timing and optional fault injection

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::Rng;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};

use crate::hardware::capabilities::{Axis, ExposureControl, MotionControl, SpectrumSource};
use crate::hardware::Spectrum;

// =============================================================================
// MockSpectrometer - Simulated Spectrometer
// =============================================================================

/// A simulated reflector in the sample arm.
#[derive(Debug, Clone, Copy)]
pub struct Reflector {
    /// Optical path difference in meters.
    pub opd_m: f64,
    /// Fringe amplitude relative to the source envelope.
    pub amplitude: f64,
}

/// Mock spectrometer producing synthetic interference spectra.
///
/// The source envelope is a Gaussian over the configured wavelength span;
/// each reflector contributes a cosine fringe `cos(k·x)` at its OPD. Dark
/// subtraction (minimum removal) and gamma correction (power law, clamped to
/// 0.1..=3.0) are applied before the data leaves the device, matching the
/// behavior of the real detector module.
pub struct MockSpectrometer {
    n_pixels: usize,
    wl_min_nm: f64,
    wl_max_nm: f64,
    reflectors: Vec<Reflector>,
    noise_level: f64,
    exposure_s: RwLock<f64>,
    dark_enabled: RwLock<bool>,
    gamma: RwLock<f64>,
}

impl MockSpectrometer {
    /// Create a mock spectrometer for a wavelength span and pixel count.
    pub fn new(wl_min_nm: f64, wl_max_nm: f64, n_pixels: usize) -> Self {
        Self {
            n_pixels,
            wl_min_nm,
            wl_max_nm,
            reflectors: Vec::new(),
            noise_level: 0.005,
            exposure_s: RwLock::new(0.01),
            dark_enabled: RwLock::new(false),
            gamma: RwLock::new(1.0),
        }
    }

    /// Add a simulated reflector.
    pub fn with_reflector(mut self, opd_m: f64, amplitude: f64) -> Self {
        self.reflectors.push(Reflector { opd_m, amplitude });
        self
    }

    /// Set the relative noise level (fraction of the envelope).
    pub fn with_noise(mut self, noise_level: f64) -> Self {
        self.noise_level = noise_level;
        self
    }

    /// Enable or disable dark subtraction.
    pub async fn set_dark_enabled(&self, enabled: bool) {
        *self.dark_enabled.write().await = enabled;
    }

    /// Configure gamma correction.
    ///
    /// Gamma < 1.0 compresses high counts, gamma > 1.0 expands contrast;
    /// 1.0 disables the correction. Values are clamped to 0.1..=3.0.
    pub async fn set_gamma(&self, gamma: f64) {
        *self.gamma.write().await = gamma.clamp(0.1, 3.0);
    }

    fn synthesize(&self) -> Spectrum {
        let n = self.n_pixels;
        let wl_center = (self.wl_min_nm + self.wl_max_nm) / 2.0;
        let wl_sigma = (self.wl_max_nm - self.wl_min_nm) / 4.0;
        let mut rng = rand::thread_rng();

        let mut wavelengths_nm = Vec::with_capacity(n);
        let mut intensities = Vec::with_capacity(n);
        for i in 0..n {
            let wl = self.wl_min_nm
                + (self.wl_max_nm - self.wl_min_nm) * i as f64 / (n - 1) as f64;
            let envelope = (-((wl - wl_center) / wl_sigma).powi(2) / 2.0).exp();

            let k = 2.0 * PI / (wl * 1e-9);
            let mut fringes = 1.0;
            for r in &self.reflectors {
                fringes += r.amplitude * (k * r.opd_m).cos();
            }

            let noise = self.noise_level * rng.gen_range(-1.0..1.0);
            wavelengths_nm.push(wl);
            intensities.push((envelope * fringes + noise).max(0.0));
        }

        Spectrum {
            wavelengths_nm,
            intensities,
        }
    }
}

#[async_trait]
impl SpectrumSource for MockSpectrometer {
    async fn connect(&self) -> Result<bool> {
        Ok(true)
    }

    async fn read_spectrum(&self) -> Result<Option<Spectrum>> {
        // Simulate the integration time
        let exposure = *self.exposure_s.read().await;
        if exposure > 0.0 {
            sleep(Duration::from_secs_f64(exposure)).await;
        }

        let mut spectrum = self.synthesize();

        if *self.dark_enabled.read().await {
            let min = spectrum
                .intensities
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min);
            for v in spectrum.intensities.iter_mut() {
                *v -= min;
            }
        }

        let gamma = *self.gamma.read().await;
        if gamma != 1.0 {
            for v in spectrum.intensities.iter_mut() {
                *v = v.max(0.0).powf(gamma);
            }
        }

        Ok(Some(spectrum))
    }
}

#[async_trait]
impl ExposureControl for MockSpectrometer {
    async fn set_exposure(&self, seconds: f64) -> Result<()> {
        *self.exposure_s.write().await = seconds;
        Ok(())
    }

    async fn get_exposure(&self) -> Result<f64> {
        Ok(*self.exposure_s.read().await)
    }
}

// =============================================================================
// MockStage - Simulated 3-Axis Stage
// =============================================================================

/// Mock 3-axis positioning stage with realistic timing.
///
/// Moves at a configurable speed (default 10 mm/s) and tracks positions per
/// axis. `fail_after_moves` injects a motion fault after a given number of
/// successful moves, for exercising the scan engine's hardware-error path.
pub struct MockStage {
    positions: RwLock<[f64; 3]>,
    speed_mm_per_sec: f64,
    move_count: AtomicU64,
    fail_after_moves: Option<u64>,
}

impl MockStage {
    /// Create a new mock stage at the origin.
    pub fn new() -> Self {
        Self {
            positions: RwLock::new([0.0; 3]),
            speed_mm_per_sec: 10.0,
            move_count: AtomicU64::new(0),
            fail_after_moves: None,
        }
    }

    /// Create a mock stage with custom motion speed.
    pub fn with_speed(speed_mm_per_sec: f64) -> Self {
        Self {
            speed_mm_per_sec,
            ..Self::new()
        }
    }

    /// Inject a motion fault after `n` successful moves.
    pub fn failing_after(mut self, n: u64) -> Self {
        self.fail_after_moves = Some(n);
        self
    }

    /// Total number of completed moves.
    pub fn move_count(&self) -> u64 {
        self.move_count.load(Ordering::SeqCst)
    }
}

impl Default for MockStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotionControl for MockStage {
    async fn goto_and_wait(&self, axis: Axis, position_mm: f64) -> Result<f64> {
        if let Some(limit) = self.fail_after_moves {
            if self.move_count.load(Ordering::SeqCst) >= limit {
                return Err(anyhow!(
                    "axis {} stopped responding (injected fault)",
                    axis.label()
                ));
            }
        }

        let idx = axis.controller_index() as usize - 1;
        let current = self.positions.read().await[idx];
        let distance = (position_mm - current).abs();
        let delay = Duration::from_secs_f64(distance / self.speed_mm_per_sec);
        log::debug!(
            "MockStage: {} {:.3} -> {:.3} mm ({} ms)",
            axis.label(),
            current,
            position_mm,
            delay.as_millis()
        );
        sleep(delay).await;

        self.positions.write().await[idx] = position_mm;
        self.move_count.fetch_add(1, Ordering::SeqCst);
        Ok(position_mm)
    }

    async fn position(&self, axis: Axis) -> Result<f64> {
        let idx = axis.controller_index() as usize - 1;
        Ok(self.positions.read().await[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_moves_and_reports_position() {
        let stage = MockStage::with_speed(1e6);
        stage.goto_and_wait(Axis::X, 2.5).await.unwrap();
        stage.goto_and_wait(Axis::Z, -1.0).await.unwrap();
        assert_eq!(stage.position(Axis::X).await.unwrap(), 2.5);
        assert_eq!(stage.position(Axis::Y).await.unwrap(), 0.0);
        assert_eq!(stage.position(Axis::Z).await.unwrap(), -1.0);
        assert_eq!(stage.move_count(), 2);
    }

    #[tokio::test]
    async fn stage_fault_injection_fires() {
        let stage = MockStage::with_speed(1e6).failing_after(2);
        stage.goto_and_wait(Axis::X, 1.0).await.unwrap();
        stage.goto_and_wait(Axis::X, 2.0).await.unwrap();
        assert!(stage.goto_and_wait(Axis::X, 3.0).await.is_err());
    }

    #[tokio::test]
    async fn spectrometer_produces_monotonic_axis() {
        let spec = MockSpectrometer::new(780.0, 920.0, 512).with_reflector(0.8e-3, 0.5);
        spec.set_exposure(0.0).await.unwrap();
        let spectrum = spec.read_spectrum().await.unwrap().unwrap();
        assert_eq!(spectrum.len(), 512);
        for w in spectrum.wavelengths_nm.windows(2) {
            assert!(w[1] > w[0]);
        }
        assert!(spectrum.intensities.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[tokio::test]
    async fn gamma_is_clamped_to_safe_range() {
        let spec = MockSpectrometer::new(780.0, 920.0, 16);
        spec.set_gamma(99.0).await;
        assert_eq!(*spec.gamma.read().await, 3.0);
        spec.set_gamma(0.0).await;
        assert_eq!(*spec.gamma.read().await, 0.1);
    }

    #[tokio::test]
    async fn dark_subtraction_zeroes_the_floor() {
        let spec = MockSpectrometer::new(780.0, 920.0, 256).with_noise(0.0);
        spec.set_exposure(0.0).await.unwrap();
        spec.set_dark_enabled(true).await;
        let spectrum = spec.read_spectrum().await.unwrap().unwrap();
        let min = spectrum
            .intensities
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        assert!(min.abs() < 1e-12);
    }
}
