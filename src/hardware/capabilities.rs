//! Atomic hardware capabilities.
//!
//! Fine-grained capability traits the devices of an OCT bench implement.
//! Instead of one monolithic `Instrument` trait, devices implement the
//! specific capabilities they actually support:
//!
//! - A spectrometer implements `SpectrumSource + ExposureControl`
//! - A motion controller implements `MotionControl`
//!
//! Each capability trait:
//! - Is async (uses `#[async_trait]`)
//! - Is thread-safe (requires `Send + Sync`)
//! - Uses `anyhow::Result` for errors
//! - Focuses on ONE thing
//!
//! An `Err` from any of these traits means a hardware/communication fault.
//! That is the only error category the scan engine escalates; every
//! processing-side problem is degraded gracefully instead.

use crate::hardware::Spectrum;
use anyhow::Result;
use async_trait::async_trait;

/// A spatial axis of the sample positioning stage.
///
/// Maps onto motion-controller axis numbers 1–3 for drivers that address
/// axes by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in controller order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Controller axis number (1-based, as the serial protocol addresses it).
    pub fn controller_index(self) -> u8 {
        match self {
            Axis::X => 1,
            Axis::Y => 2,
            Axis::Z => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

/// Capability: Spectrum Acquisition
///
/// Devices that produce wavelength-resolved intensity readings.
///
/// # Contract
/// - `read_spectrum` returns `Ok(Some(..))` with one acquisition,
///   `Ok(None)` when no valid frame is available (the caller skips the
///   reading), and `Err` on a hardware fault
/// - Detector-side post-processing (dark subtraction, gamma correction) is
///   applied by the implementation before data reaches the caller
#[async_trait]
pub trait SpectrumSource: Send + Sync {
    /// Establish the device connection.
    ///
    /// # Returns
    /// - Ok(true) if the device is ready
    /// - Ok(false) if no device was found
    /// - Err on a communication fault
    async fn connect(&self) -> Result<bool>;

    /// Acquire one spectrum.
    ///
    /// # Returns
    /// - Ok(Some(spectrum)) on a valid acquisition
    /// - Ok(None) when no data is available (skip, don't fail)
    /// - Err on a hardware fault
    async fn read_spectrum(&self) -> Result<Option<Spectrum>>;
}

/// Capability: Exposure Time Control
///
/// Devices with configurable integration time.
///
/// # Contract
/// - Exposure is in seconds (not milliseconds)
/// - Setting exposure does not start acquisition; it applies to the next one
#[async_trait]
pub trait ExposureControl: Send + Sync {
    /// Set exposure/integration time.
    ///
    /// # Arguments
    /// * `seconds` - Exposure time in seconds
    async fn set_exposure(&self, seconds: f64) -> Result<()>;

    /// Get the current exposure setting, in seconds.
    async fn get_exposure(&self) -> Result<f64>;
}

/// Capability: Multi-Axis Motion Control
///
/// Positioning stages addressed by [`Axis`].
///
/// # Contract
/// - Positions are in millimeters
/// - `goto_and_wait` blocks until the stage settles at the target (within
///   the device's tolerance) and returns the settled position; retry and
///   stuck-detection policies live inside the implementation
/// - An `Err` is fatal to the enclosing scan
#[async_trait]
pub trait MotionControl: Send + Sync {
    /// Move an axis to an absolute position and wait for it to settle.
    ///
    /// # Returns
    /// The settled position in millimeters.
    async fn goto_and_wait(&self, axis: Axis, position_mm: f64) -> Result<f64>;

    /// Current position of an axis, in millimeters.
    async fn position(&self, axis: Axis) -> Result<f64>;
}
