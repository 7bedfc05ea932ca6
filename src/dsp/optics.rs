//! Closed-form instrument figures of merit.
//!
//! Two stateless formulas derived from the source bandwidth and the detector
//! geometry, used for display and sanity checks; neither sits in the per-point
//! processing path. Both are undefined for `wl_min == wl_max` (division by
//! zero) - callers are responsible for avoiding a zero-span bandwidth.

use std::f64::consts::PI;

/// Theoretical axial resolution (FWHM) in micrometers for a source spanning
/// `wl_min_nm..wl_max_nm`:
///
/// `(2·ln2/π) · λc² / Δλ`, with `λc` the mean of the bounds.
pub fn axial_resolution_um(wl_min_nm: f64, wl_max_nm: f64) -> f64 {
    let wl_min = wl_min_nm * 1e-9;
    let wl_max = wl_max_nm * 1e-9;
    let wl_center = (wl_min + wl_max) / 2.0;

    let resolution = (2.0 * 2.0_f64.ln() / PI) * wl_center * wl_center / (wl_max - wl_min);
    resolution * 1e6
}

/// Maximum reachable depth range in millimeters for `n_pixels` detector
/// pixels over the span `wl_min_nm..wl_max_nm`:
///
/// `π / dk`, with `dk = (k_max − k_min)/n_pixels` and `k = 2π/λ`. The range
/// grows linearly with the pixel count (finer k sampling pushes the aliasing
/// depth out).
pub fn max_depth_range_mm(wl_min_nm: f64, wl_max_nm: f64, n_pixels: usize) -> f64 {
    let wl_min = wl_min_nm * 1e-9;
    let wl_max = wl_max_nm * 1e-9;

    let k_max = 2.0 * PI / wl_min;
    let k_min = 2.0 * PI / wl_max;
    let dk = (k_max - k_min) / n_pixels as f64;

    (PI / dk) * 1e3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_for_typical_source() {
        // 780–920 nm superluminescent diode
        let res = axial_resolution_um(780.0, 920.0);
        assert!((res - 2.2773).abs() < 0.01, "got {res}");
    }

    #[test]
    fn resolution_improves_with_bandwidth() {
        let narrow = axial_resolution_um(820.0, 880.0);
        let broad = axial_resolution_um(780.0, 920.0);
        assert!(broad < narrow);
    }

    #[test]
    fn depth_range_for_typical_detector() {
        let depth = max_depth_range_mm(780.0, 920.0, 3648);
        assert!((depth - 9.35).abs() < 0.01, "got {depth}");
    }

    #[test]
    fn depth_range_scales_with_pixel_count() {
        let d1 = max_depth_range_mm(780.0, 920.0, 1024);
        let d2 = max_depth_range_mm(780.0, 920.0, 2048);
        assert!((d2 / d1 - 2.0).abs() < 1e-12);
    }
}
