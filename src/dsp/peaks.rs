//! Adaptive peak detection over depth-domain magnitude profiles.
//!
//! Real interferograms range from strong mirror-like reflectors to weak
//! scattering layers, so a single fixed threshold either drowns in noise or
//! misses everything. The detector runs up to three tiers, stopping at the
//! first one that yields a peak:
//!
//! 1. height ≥ 30% of the maximum, prominence ≥ half that height, and a
//!    minimum width converted from meters to samples;
//! 2. no height constraint, prominence ≥ 5% of the maximum, width floor
//!    halved (still at least one sample);
//! 3. height ≥ 5% of the maximum only.
//!
//! Candidates are sorted by descending magnitude and truncated to the
//! requested count. Any numeric degeneracy at a tier (non-finite magnitudes,
//! empty input) counts as "no peaks at this tier", never an error.
//!
//! The windowed variant restricts the search to a sub-range of the output
//! axis and maps the returned indices back into the full index space.

use num_complex::Complex64;

/// Default initial height threshold as a fraction of the maximum magnitude.
pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.3;
/// Default minimum peak width, in meters of OPD.
pub const DEFAULT_MIN_WIDTH_M: f64 = 3e-6;

/// Relaxed-tier threshold fraction.
const TIER2_RATIO: f64 = 0.1;
/// Last-resort height fraction.
const TIER3_RATIO: f64 = 0.05;

/// Peaks found in a magnitude profile, parallel-indexed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Peaks {
    /// Positions on the provided axis (meters of OPD).
    pub locations: Vec<f64>,
    /// Peak magnitudes.
    pub magnitudes: Vec<f64>,
    /// Indices into the analyzed sequence.
    pub indices: Vec<usize>,
}

impl Peaks {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Detect up to `max_peaks` peaks in a complex transform result.
///
/// * `z` - transform output; the detector works on `|z|`
/// * `axis` - matching output axis in meters, used for the width conversion
///   and the reported locations
/// * `threshold_ratio` - first-tier height threshold as a fraction of the
///   maximum magnitude (0.3 by default)
/// * `min_width_m` - minimum acceptable peak width in meters
pub fn detect_peaks(
    z: &[Complex64],
    axis: &[f64],
    max_peaks: usize,
    threshold_ratio: f64,
    min_width_m: f64,
) -> Peaks {
    let mag: Vec<f64> = z.iter().map(|c| c.norm()).collect();
    if mag.is_empty() {
        return Peaks::default();
    }

    // Width floor in samples, from the mean axis spacing.
    let width_samples = if axis.len() > 1 {
        let df = (axis[axis.len() - 1] - axis[0]) / (axis.len() - 1) as f64;
        ((min_width_m / df.abs()) as usize).max(1)
    } else {
        1
    };

    let max_mag = mag
        .iter()
        .copied()
        .filter(|m| m.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max_mag.is_finite() {
        return Peaks::default();
    }

    let candidates = local_maxima(&mag);

    // Tier 1: high threshold with prominence and width constraints.
    let high = max_mag * threshold_ratio;
    let mut peaks = filter_candidates(
        &mag,
        &candidates,
        Some(high),
        Some(high * 0.5),
        Some(width_samples as f64),
    );

    // Tier 2: drop the height constraint, relax prominence and width.
    if peaks.is_empty() {
        let low = max_mag * TIER2_RATIO;
        peaks = filter_candidates(
            &mag,
            &candidates,
            None,
            Some(low * 0.5),
            Some((width_samples / 2).max(1) as f64),
        );
    }

    // Tier 3: height floor only.
    if peaks.is_empty() {
        peaks = filter_candidates(&mag, &candidates, Some(max_mag * TIER3_RATIO), None, None);
    }

    if peaks.is_empty() {
        return Peaks::default();
    }

    // Strongest first, truncated to the requested count.
    peaks.sort_by(|&a, &b| mag[b].total_cmp(&mag[a]));
    peaks.truncate(max_peaks);

    Peaks {
        locations: peaks.iter().map(|&p| axis[p]).collect(),
        magnitudes: peaks.iter().map(|&p| mag[p]).collect(),
        indices: peaks,
    }
}

/// Detect peaks within `[f_min, f_max]` (inclusive) of the output axis.
///
/// Runs the three-tier detector on the restricted slice, then maps every
/// returned index back to its position in the unrestricted sequence. Returns
/// empty results when no axis sample falls inside the range.
pub fn detect_peaks_in_window(
    z: &[Complex64],
    axis: &[f64],
    f_min: f64,
    f_max: f64,
    max_peaks: usize,
    min_width_m: f64,
) -> Peaks {
    let global_indices: Vec<usize> = axis
        .iter()
        .enumerate()
        .filter(|(_, &f)| f >= f_min && f <= f_max)
        .map(|(i, _)| i)
        .collect();
    if global_indices.is_empty() {
        return Peaks::default();
    }

    let z_window: Vec<Complex64> = global_indices.iter().map(|&i| z[i]).collect();
    let axis_window: Vec<f64> = global_indices.iter().map(|&i| axis[i]).collect();

    let mut peaks = detect_peaks(
        &z_window,
        &axis_window,
        max_peaks,
        DEFAULT_THRESHOLD_RATIO,
        min_width_m,
    );
    for idx in peaks.indices.iter_mut() {
        *idx = global_indices[*idx];
    }
    peaks
}

/// Indices of local maxima, interior samples only. Plateaus of equal values
/// report their midpoint.
fn local_maxima(mag: &[f64]) -> Vec<usize> {
    let n = mag.len();
    let mut out = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if mag[i - 1] < mag[i] {
            // Walk the plateau of equal values, if any.
            let mut ahead = i + 1;
            while ahead < n - 1 && mag[ahead] == mag[i] {
                ahead += 1;
            }
            if mag[ahead] < mag[i] {
                out.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Apply height/prominence/width constraints to candidate maxima.
fn filter_candidates(
    mag: &[f64],
    candidates: &[usize],
    min_height: Option<f64>,
    min_prominence: Option<f64>,
    min_width: Option<f64>,
) -> Vec<usize> {
    candidates
        .iter()
        .copied()
        .filter(|&p| {
            if let Some(h) = min_height {
                if !(mag[p] >= h) {
                    return false;
                }
            }
            if min_prominence.is_some() || min_width.is_some() {
                let prom = prominence(mag, p);
                if let Some(pr) = min_prominence {
                    if !(prom >= pr) {
                        return false;
                    }
                }
                if let Some(wmin) = min_width {
                    if !(width_at_half_prominence(mag, p, prom) >= wmin) {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

/// Topographic prominence of the peak at `p`: its height above the higher of
/// the two valley minima found by extending left and right until a sample
/// taller than the peak (or the signal edge) is reached.
fn prominence(mag: &[f64], p: usize) -> f64 {
    let mut left_min = mag[p];
    let mut i = p;
    while i > 0 {
        i -= 1;
        if mag[i] > mag[p] {
            break;
        }
        if mag[i] < left_min {
            left_min = mag[i];
        }
    }

    let mut right_min = mag[p];
    let mut j = p;
    while j + 1 < mag.len() {
        j += 1;
        if mag[j] > mag[p] {
            break;
        }
        if mag[j] < right_min {
            right_min = mag[j];
        }
    }

    mag[p] - left_min.max(right_min)
}

/// Peak width in samples, measured at half the peak's prominence below its
/// apex, with linear interpolation of the two crossings.
fn width_at_half_prominence(mag: &[f64], p: usize, prom: f64) -> f64 {
    let height = mag[p] - prom * 0.5;

    let mut i = p;
    while i > 0 && mag[i] > height {
        i -= 1;
    }
    let mut left = i as f64;
    if mag[i] < height {
        left += (height - mag[i]) / (mag[i + 1] - mag[i]);
    }

    let mut j = p;
    while j + 1 < mag.len() && mag[j] > height {
        j += 1;
    }
    let mut right = j as f64;
    if mag[j] < height {
        right -= (height - mag[j]) / (mag[j - 1] - mag[j]);
    }

    right - left
}
