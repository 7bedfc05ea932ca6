//! Per-point processing pipeline.
//!
//! Turns one acquired spectrum into a filled peak buffer (plus the full
//! magnitude profile when the full-range path is active). The transform mode
//! is a tagged variant fixed when the processor is built and carried through
//! the whole scan - it cannot change mid-run, and the per-window CZT variant
//! structurally forces the linear resampling strategy it requires.

use num_complex::Complex64;

use crate::config::WindowSpec;
use crate::dsp::czt::czt;
use crate::dsp::fft::FullRangeTransform;
use crate::dsp::kspace::{KSpaceCache, ResampleStrategy};
use crate::dsp::peaks::{
    detect_peaks, detect_peaks_in_window, DEFAULT_MIN_WIDTH_M, DEFAULT_THRESHOLD_RATIO,
};
use crate::error::OctResult;
use crate::hardware::Spectrum;
use crate::scan::accumulator::{PeakBuffer, MAX_WINDOWS, PEAKS_PER_WINDOW};

/// Output resolution of each per-window CZT, regardless of window span.
pub const CZT_WINDOW_POINTS: usize = 2048;

/// Which transform path a scan runs. Selected once per scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// One full-range FFT per point; windows only scope the peak search.
    FullSpectrum,
    /// One zoomed CZT per enabled window per point.
    PerWindow,
}

impl TransformMode {
    /// Archive metadata label.
    pub fn label(self) -> &'static str {
        match self {
            TransformMode::FullSpectrum => "FFT",
            TransformMode::PerWindow => "CZT",
        }
    }
}

/// A validated, meter-converted snapshot of one enabled window.
#[derive(Debug, Clone, Copy)]
pub struct ActiveWindow {
    pub index: usize,
    pub min_m: f64,
    pub max_m: f64,
}

/// Snapshot the enabled windows from configuration, converting mm to meters.
/// Disabled windows and windows with `max ≤ min` are skipped silently.
pub fn active_windows(windows: &[WindowSpec]) -> Vec<ActiveWindow> {
    windows
        .iter()
        .enumerate()
        .take(MAX_WINDOWS)
        .filter(|(_, w)| w.enabled)
        .map(|(index, w)| ActiveWindow {
            index,
            min_m: w.min_mm * 1e-3,
            max_m: w.max_mm * 1e-3,
        })
        .filter(|w| w.max_m > w.min_m)
        .collect()
}

/// Result of processing one point.
#[derive(Debug, Clone)]
pub struct ProcessedPoint {
    pub peaks: PeakBuffer,
    /// Full-range magnitude profile (full-spectrum mode only).
    pub full_magnitude: Option<Vec<f64>>,
    /// OPD axis matching `full_magnitude` (full-spectrum mode only).
    pub opd_axis: Option<Vec<f64>>,
}

/// The per-point processor: k-space cache, transform stage, and the static
/// window snapshot for one scan run.
///
/// Exactly one task may hold this mutably at a time - the scan engine during
/// a scan, the preview cycle otherwise - which is what serializes access to
/// the interpolation cache.
pub struct PointProcessor {
    mode: TransformMode,
    strategy: ResampleStrategy,
    windows: Vec<ActiveWindow>,
    cache: KSpaceCache,
    transform: FullRangeTransform,
}

impl PointProcessor {
    /// Build a processor for one scan run.
    ///
    /// `cubic_resampling` selects the spline strategy for the full-spectrum
    /// path; the per-window CZT path always resamples linearly (the CZT
    /// itself provides the fine output sampling).
    pub fn new(mode: TransformMode, cubic_resampling: bool, windows: &[WindowSpec]) -> Self {
        let strategy = match mode {
            TransformMode::PerWindow => ResampleStrategy::Linear,
            TransformMode::FullSpectrum => {
                if cubic_resampling {
                    ResampleStrategy::Spline
                } else {
                    ResampleStrategy::Linear
                }
            }
        };
        Self {
            mode,
            strategy,
            windows: active_windows(windows),
            cache: KSpaceCache::new(),
            transform: FullRangeTransform::new(),
        }
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    /// Number of windows that survived the configuration snapshot.
    pub fn active_window_count(&self) -> usize {
        self.windows.len()
    }

    /// Process one spectrum into a peak buffer (and, in full-spectrum mode,
    /// the magnitude profile). Shared by the scan path and the live preview.
    pub fn process(&mut self, spectrum: &Spectrum) -> OctResult<ProcessedPoint> {
        self.cache.refresh(&spectrum.wavelengths_nm)?;
        let resampled = self.cache.resample(&spectrum.intensities, self.strategy)?;

        let mut peaks = PeakBuffer::new();
        match self.mode {
            TransformMode::FullSpectrum => {
                let (opd, magnitude) = self.transform.process(&resampled, self.cache.dk());
                let z: Vec<Complex64> =
                    magnitude.iter().map(|&m| Complex64::new(m, 0.0)).collect();

                for window in &self.windows {
                    let found = detect_peaks_in_window(
                        &z,
                        &opd,
                        window.min_m,
                        window.max_m,
                        PEAKS_PER_WINDOW,
                        DEFAULT_MIN_WIDTH_M,
                    );
                    for (slot, (&loc, &mag)) in found
                        .locations
                        .iter()
                        .zip(found.magnitudes.iter())
                        .enumerate()
                    {
                        peaks.set(window.index, slot, loc, mag);
                    }
                }

                Ok(ProcessedPoint {
                    peaks,
                    full_magnitude: Some(magnitude),
                    opd_axis: Some(opd),
                })
            }
            TransformMode::PerWindow => {
                let signal: Vec<Complex64> =
                    resampled.iter().map(|&s| Complex64::new(s, 0.0)).collect();
                let fs = self.cache.fs();

                for window in &self.windows {
                    let (z, fz) = czt(&signal, window.min_m, window.max_m, fs, CZT_WINDOW_POINTS);
                    // The CZT already scoped the axis to this window; no
                    // further windowing is needed.
                    let found = detect_peaks(
                        &z,
                        &fz,
                        PEAKS_PER_WINDOW,
                        DEFAULT_THRESHOLD_RATIO,
                        DEFAULT_MIN_WIDTH_M,
                    );
                    for (slot, (&loc, &mag)) in found
                        .locations
                        .iter()
                        .zip(found.magnitudes.iter())
                        .enumerate()
                    {
                        peaks.set(window.index, slot, loc, mag);
                    }
                }

                Ok(ProcessedPoint {
                    peaks,
                    full_magnitude: None,
                    opd_axis: None,
                })
            }
        }
    }
}
