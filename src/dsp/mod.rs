//! The signal-processing core.
//!
//! Raw spectrometer samples are a function of wavelength; the depth profile
//! is the Fourier pair of the spectrum expressed in wavenumber (k-space).
//! This module provides the pieces of that conversion:
//!
//! - [`kspace`]: the cached uniform k-space grid and the resampler that maps
//!   detector intensities onto it (cubic spline or linear).
//! - [`czt`]: the chirp Z-transform engine used to evaluate a zoomed,
//!   arbitrary-resolution transform over a single depth window.
//! - [`fft`]: the full-range transform producing the complete non-negative
//!   OPD magnitude profile.
//! - [`peaks`]: the three-tier adaptive peak detector with windowed scoping.
//! - [`optics`]: closed-form axial resolution and depth range figures.
//! - [`spline`]: the natural cubic spline used by the resampler.

pub mod czt;
pub mod fft;
pub mod kspace;
pub mod optics;
pub mod peaks;
pub mod spline;
