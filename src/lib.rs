//! # OCT DAQ Core Library
//!
//! This crate is the core library for the `oct_daq` application: the control
//! and signal-processing backend of a spectral-domain optical coherence
//! tomography (OCT) instrument. It converts raw spectrometer intensity
//! samples (a function of wavelength) into a depth-domain reflectivity
//! profile (a function of optical path difference, OPD) and extracts the
//! dominant reflectors within user-declared depth windows, while driving a
//! motorized stage through 1D/2D/3D raster scans.
//!
//! ## Crate Structure
//!
//! The library is organized into several modules, each with a distinct
//! responsibility:
//!
//! - **`config`**: Structures for loading and validating application
//!   configuration from TOML files. See [`config::Settings`].
//! - **`dsp`**: The numerical core - k-space resampling, the chirp
//!   Z-transform engine, the full-spectrum transform, adaptive peak
//!   detection, and closed-form instrument figures of merit.
//! - **`error`**: The custom [`error::OctError`] enum for centralized error
//!   handling across the application.
//! - **`hardware`**: Capability traits for the spectrometer and the motion
//!   controller, plus mock implementations for tests and simulated runs.
//! - **`scan`**: The per-point processing pipeline, the scan accumulation
//!   buffers, and the raster scan engine with cooperative cancellation.
//! - **`storage`**: The archive writer boundary, a JSON bundle writer, and
//!   spectrum snapshot helpers.
//!
//! ## Processing Overview
//!
//! For each acquired spectrum, data flows through the resampler (wavelength
//! axis onto a uniform wavenumber grid), then either a full-range FFT or a
//! per-window chirp Z-transform, then the adaptive peak detector. Results are
//! accumulated per scan point and handed wholesale to the archive writer at
//! checkpoints and at scan end.

pub mod config;
pub mod dsp;
pub mod error;
pub mod hardware;
pub mod scan;
pub mod storage;

pub use error::{OctError, OctResult};
