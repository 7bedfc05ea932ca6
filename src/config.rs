//! Configuration management.
//!
//! Settings are loaded from `config/<name>.toml` via the `config` crate and
//! validated semantically before a run starts. Validation is where the
//! per-scan policy invariants are enforced once - most importantly that the
//! per-window CZT mode is paired with linear resampling - so the processing
//! path never has to re-check them per point.

use crate::error::{OctError, OctResult};
use crate::scan::accumulator::MAX_WINDOWS;
use config::Config;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub log_level: String,
    pub acquisition: AcquisitionSettings,
    pub processing: ProcessingSettings,
    #[serde(default)]
    pub windows: Vec<WindowSpec>,
    pub scan: ScanSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionSettings {
    /// Detector integration time in milliseconds.
    pub exposure_ms: f64,
    /// Spectra averaged per reading (recorded in the archive metadata).
    #[serde(default = "default_averages")]
    pub averages: u32,
    /// Subtract the per-frame minimum before processing.
    #[serde(default)]
    pub dark_correction: bool,
    /// Power-law correction exponent; 1.0 disables it.
    #[serde(default = "default_gamma")]
    pub gamma_correction: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingSettings {
    /// Cubic-spline resampling (higher quality). Incompatible with
    /// `czt_windows`, which requires the linear strategy.
    #[serde(default = "default_true")]
    pub cubic_interpolation: bool,
    /// Per-window CZT mode: one dedicated zoomed transform per enabled
    /// window instead of a single full-range FFT.
    #[serde(default)]
    pub czt_windows: bool,
}

/// One user-declared OPD search window, in millimeters.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct WindowSpec {
    pub enabled: bool,
    pub min_mm: f64,
    pub max_mm: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanSettings {
    pub x: Option<AxisRange>,
    pub y: Option<AxisRange>,
    pub z: Option<AxisRange>,
    /// Wait after each motion for vibrations to die down, in milliseconds.
    #[serde(default = "default_settling_ms")]
    pub settling_ms: f64,
    /// Persist an accumulative checkpoint every 10% of progress.
    #[serde(default)]
    pub partial_saves: bool,
}

/// Traversal range of one scan axis, in millimeters.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct AxisRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub default_path: String,
}

fn default_averages() -> u32 {
    1
}

fn default_gamma() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_settling_ms() -> f64 {
    50.0
}

impl Settings {
    pub fn new(config_name: Option<&str>) -> OctResult<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path))
            .build()
            .map_err(OctError::Config)?;

        let settings: Settings = s.try_deserialize().map_err(OctError::Config)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic validation of values that parse fine but are logically
    /// invalid.
    pub fn validate(&self) -> OctResult<()> {
        if self.acquisition.exposure_ms <= 0.0 {
            return Err(OctError::Configuration(format!(
                "exposure_ms must be positive, got {}",
                self.acquisition.exposure_ms
            )));
        }
        if self.acquisition.averages == 0 {
            return Err(OctError::Configuration("averages must be at least 1".into()));
        }
        if self.windows.len() > MAX_WINDOWS {
            return Err(OctError::Configuration(format!(
                "at most {MAX_WINDOWS} windows are supported, got {}",
                self.windows.len()
            )));
        }
        if self.processing.czt_windows && self.processing.cubic_interpolation {
            return Err(OctError::Configuration(
                "czt_windows requires linear resampling; disable cubic_interpolation".into(),
            ));
        }
        for (name, range) in [
            ("x", &self.scan.x),
            ("y", &self.scan.y),
            ("z", &self.scan.z),
        ] {
            if let Some(r) = range {
                if r.step == 0.0 || !r.step.is_finite() {
                    return Err(OctError::Configuration(format!(
                        "scan.{name}.step must be a finite non-zero value"
                    )));
                }
            }
        }
        if self.scan.settling_ms < 0.0 {
            return Err(OctError::Configuration("settling_ms must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            log_level: "info".into(),
            acquisition: AcquisitionSettings {
                exposure_ms: 10.0,
                averages: 1,
                dark_correction: false,
                gamma_correction: 1.0,
            },
            processing: ProcessingSettings {
                cubic_interpolation: true,
                czt_windows: false,
            },
            windows: vec![WindowSpec {
                enabled: true,
                min_mm: 0.5,
                max_mm: 1.0,
            }],
            scan: ScanSettings {
                x: Some(AxisRange {
                    start: 0.0,
                    end: 1.0,
                    step: 0.5,
                }),
                y: None,
                z: None,
                settling_ms: 0.0,
                partial_saves: false,
            },
            storage: StorageSettings {
                default_path: "scans".into(),
            },
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn czt_mode_rejects_cubic_resampling() {
        let mut s = base_settings();
        s.processing.czt_windows = true;
        assert!(s.validate().is_err());

        s.processing.cubic_interpolation = false;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn too_many_windows_rejected() {
        let mut s = base_settings();
        s.windows = vec![
            WindowSpec {
                enabled: false,
                min_mm: 0.0,
                max_mm: 1.0
            };
            MAX_WINDOWS + 1
        ];
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_step_rejected() {
        let mut s = base_settings();
        s.scan.x = Some(AxisRange {
            start: 0.0,
            end: 1.0,
            step: 0.0,
        });
        assert!(s.validate().is_err());
    }

    #[test]
    fn non_positive_exposure_rejected() {
        let mut s = base_settings();
        s.acquisition.exposure_ms = 0.0;
        assert!(s.validate().is_err());
    }
}
