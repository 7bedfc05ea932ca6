//! The raster scan engine.
//!
//! Drives the stage through the configured axes (outermost Z, then Y, then
//! X), acquires and processes one spectrum per point, checkpoints the
//! accumulation buffers every 10% of progress when enabled, and persists the
//! final bundle on every exit path - completion, cancellation, and hardware
//! failure alike. The stage returns to its start coordinates on every exit
//! path too, so no scan ever leaves the bench in a half-moved state.
//!
//! Error policy: only motion faults terminate a scan. A failed spectrometer
//! read or a processing hiccup skips that point with a warning; a scan hours
//! into a raster must not die to one transient bad frame.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::{AxisRange, ScanSettings, Settings};
use crate::error::{OctError, OctResult};
use crate::hardware::capabilities::{Axis, MotionControl, SpectrumSource};
use crate::scan::accumulator::{PointRecord, ScanAccumulator};
use crate::scan::pipeline::PointProcessor;
use crate::storage::{ArchiveWriter, ScanMetadata, SCHEMA_VERSION};

/// Fraction of total points between partial-save checkpoints.
pub const PARTIAL_SAVE_INTERVAL: f64 = 0.10;

/// Cooperative cancellation flag, checked at point boundaries only.
///
/// Cancelling never interrupts a point mid-flight: the engine finishes the
/// current point's motion and processing, then exits cleanly.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    Aborted,
}

/// Result summary of one scan run.
#[derive(Debug)]
pub struct ScanSummary {
    pub outcome: ScanOutcome,
    pub points_acquired: usize,
    pub points_total: usize,
    /// Where the final bundle was written, if a writer was configured.
    pub archive_path: Option<PathBuf>,
}

/// The static traversal plan for one scan run.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub x: Option<AxisRange>,
    pub y: Option<AxisRange>,
    pub z: Option<AxisRange>,
    pub settling: Duration,
    pub exposure: Duration,
    pub partial_saves: bool,
}

impl ScanPlan {
    pub fn from_settings(settings: &Settings) -> Self {
        let ScanSettings {
            x,
            y,
            z,
            settling_ms,
            partial_saves,
        } = settings.scan.clone();
        Self {
            x,
            y,
            z,
            settling: Duration::from_secs_f64(settling_ms / 1e3),
            exposure: Duration::from_secs_f64(settings.acquisition.exposure_ms / 1e3),
            partial_saves,
        }
    }

    /// Total number of points the raster will visit.
    pub fn total_points(&self) -> usize {
        count_points(&self.x) * count_points(&self.y) * count_points(&self.z)
    }

    /// Scan dimensionality label for the archive metadata.
    pub fn scan_type(&self) -> &'static str {
        match [&self.x, &self.y, &self.z]
            .iter()
            .filter(|a| a.is_some())
            .count()
        {
            1 => "1D",
            2 => "2D",
            3 => "3D",
            _ => "unknown",
        }
    }

    /// Positions an axis visits; a disabled axis contributes a single origin
    /// coordinate and no motion commands.
    fn positions(range: &Option<AxisRange>) -> Vec<f64> {
        match range {
            Some(r) => float_range(r.start, r.end, r.step),
            None => vec![0.0],
        }
    }
}

/// Inclusive float range from `start` toward `end` in |step| increments,
/// direction-aware, with a small epsilon so the endpoint survives float
/// accumulation.
pub fn float_range(start: f64, end: f64, step: f64) -> Vec<f64> {
    let step = step.abs();
    if step == 0.0 || !step.is_finite() || start == end {
        return vec![start];
    }
    let mut out = Vec::new();
    let mut v = start;
    if end > start {
        while v <= end + 1e-12 {
            out.push(v);
            v += step;
        }
    } else {
        while v >= end - 1e-12 {
            out.push(v);
            v -= step;
        }
    }
    out
}

fn count_points(range: &Option<AxisRange>) -> usize {
    match range {
        Some(r) if r.step != 0.0 => ((r.end - r.start).abs() / r.step.abs()) as usize + 1,
        _ => 1,
    }
}

enum ScanExit {
    Finished,
    Cancelled,
}

struct CheckpointTracker {
    last_saved_fraction: f64,
    partial_counter: u32,
}

/// Orchestrates one scan run over the hardware boundary.
pub struct ScanEngine<M, S> {
    motion: Arc<M>,
    spectrometer: Arc<S>,
    writer: Option<Arc<dyn ArchiveWriter>>,
    plan: ScanPlan,
    instrument: String,
}

impl<M, S> ScanEngine<M, S>
where
    M: MotionControl,
    S: SpectrumSource,
{
    pub fn new(
        motion: Arc<M>,
        spectrometer: Arc<S>,
        writer: Option<Arc<dyn ArchiveWriter>>,
        plan: ScanPlan,
        instrument: impl Into<String>,
    ) -> Self {
        Self {
            motion,
            spectrometer,
            writer,
            plan,
            instrument: instrument.into(),
        }
    }

    /// Run the scan to completion, cancellation, or hardware failure.
    ///
    /// The processor and accumulator are exclusively borrowed for the whole
    /// run; see the module docs for the single-writer rationale.
    ///
    /// # Errors
    ///
    /// Returns [`OctError::Motion`] if the stage faults. Everything already
    /// accumulated is persisted before the error is returned.
    pub async fn run(
        &self,
        processor: &mut PointProcessor,
        accumulator: &mut ScanAccumulator,
        cancel: &CancelToken,
    ) -> OctResult<ScanSummary> {
        accumulator.reset();
        let start_time = Utc::now();
        let total = self.plan.total_points();
        log::info!(
            "starting {} scan: {} points, mode {}",
            self.plan.scan_type(),
            total,
            processor.mode().label()
        );

        let mut tracker = CheckpointTracker {
            last_saved_fraction: 0.0,
            partial_counter: 0,
        };

        let traversal = self
            .traverse(processor, accumulator, cancel, &mut tracker, total, start_time)
            .await;

        // The stage goes home on every exit path; a cleanup failure must not
        // mask the original error.
        if let Err(e) = self.return_to_start().await {
            log::warn!("return-to-start failed: {e}");
        }

        let acquired = accumulator.len();
        match traversal {
            Ok(ScanExit::Finished) => {
                let path = self
                    .persist(processor, accumulator, start_time, total, acquired, None)
                    .await;
                log::info!("scan completed: {acquired}/{total} points");
                Ok(ScanSummary {
                    outcome: ScanOutcome::Completed,
                    points_acquired: acquired,
                    points_total: total,
                    archive_path: path,
                })
            }
            Ok(ScanExit::Cancelled) => {
                let path = self
                    .persist(
                        processor,
                        accumulator,
                        start_time,
                        total,
                        acquired,
                        Some((0, 1)),
                    )
                    .await;
                log::warn!("scan cancelled by user: {acquired}/{total} points kept");
                Ok(ScanSummary {
                    outcome: ScanOutcome::Aborted,
                    points_acquired: acquired,
                    points_total: total,
                    archive_path: path,
                })
            }
            Err(e) => {
                // Persist what was accumulated, then escalate.
                let _ = self
                    .persist(
                        processor,
                        accumulator,
                        start_time,
                        total,
                        acquired,
                        Some((0, 1)),
                    )
                    .await;
                log::error!("scan failed after {acquired}/{total} points: {e}");
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn traverse(
        &self,
        processor: &mut PointProcessor,
        accumulator: &mut ScanAccumulator,
        cancel: &CancelToken,
        tracker: &mut CheckpointTracker,
        total: usize,
        start_time: chrono::DateTime<Utc>,
    ) -> OctResult<ScanExit> {
        let zs = ScanPlan::positions(&self.plan.z);
        let ys = ScanPlan::positions(&self.plan.y);
        let xs = ScanPlan::positions(&self.plan.x);

        for &zp in &zs {
            if cancel.is_cancelled() {
                return Ok(ScanExit::Cancelled);
            }
            if self.plan.z.is_some() {
                self.move_axis(Axis::Z, zp).await?;
            }

            for &yp in &ys {
                if cancel.is_cancelled() {
                    return Ok(ScanExit::Cancelled);
                }
                if self.plan.y.is_some() {
                    self.move_axis(Axis::Y, yp).await?;
                }

                for &xp in &xs {
                    if cancel.is_cancelled() {
                        return Ok(ScanExit::Cancelled);
                    }
                    if self.plan.x.is_some() {
                        self.move_axis(Axis::X, xp).await?;
                    }

                    self.acquire_point(processor, accumulator, xp, yp, zp).await;

                    if self.plan.partial_saves && total > 0 {
                        self.maybe_checkpoint(
                            processor,
                            accumulator,
                            tracker,
                            total,
                            start_time,
                        )
                        .await;
                    }
                }
            }
        }

        Ok(ScanExit::Finished)
    }

    async fn move_axis(&self, axis: Axis, position_mm: f64) -> OctResult<f64> {
        let settled = self
            .motion
            .goto_and_wait(axis, position_mm)
            .await
            .map_err(|e| OctError::Motion(format!("{e:#}")))?;
        if !self.plan.settling.is_zero() {
            tokio::time::sleep(self.plan.settling).await;
        }
        Ok(settled)
    }

    /// Acquire and process one point. The first read discards the exposure
    /// that integrated while the stage was moving; after one clean exposure
    /// period, the second read is the valid one.
    ///
    /// Spectrometer and processing failures skip the point; they never end
    /// the scan.
    async fn acquire_point(
        &self,
        processor: &mut PointProcessor,
        accumulator: &mut ScanAccumulator,
        x_mm: f64,
        y_mm: f64,
        z_mm: f64,
    ) {
        if let Err(e) = self.spectrometer.read_spectrum().await {
            log::warn!("stale-frame read failed at ({x_mm:.3}, {y_mm:.3}, {z_mm:.3}): {e:#}");
        }
        if !self.plan.exposure.is_zero() {
            tokio::time::sleep(self.plan.exposure).await;
        }

        let spectrum = match self.spectrometer.read_spectrum().await {
            Ok(Some(s)) if !s.is_empty() => s,
            Ok(_) => {
                log::warn!("no spectrum at ({x_mm:.3}, {y_mm:.3}, {z_mm:.3}); point skipped");
                return;
            }
            Err(e) => {
                log::warn!(
                    "spectrometer fault at ({x_mm:.3}, {y_mm:.3}, {z_mm:.3}): {e:#}; point skipped"
                );
                return;
            }
        };

        accumulator.record_wavelengths_once(&spectrum.wavelengths_nm);

        match processor.process(&spectrum) {
            Ok(point) => {
                accumulator.push(PointRecord {
                    x_mm,
                    y_mm,
                    z_mm,
                    spectrum: spectrum.intensities,
                    full_magnitude: point.full_magnitude,
                    peaks: point.peaks,
                });
                log::debug!(
                    "point {}: ({x_mm:.3}, {y_mm:.3}, {z_mm:.3}) mm",
                    accumulator.len()
                );
            }
            Err(e) => {
                log::warn!(
                    "processing failed at ({x_mm:.3}, {y_mm:.3}, {z_mm:.3}): {e}; point skipped"
                );
            }
        }
    }

    async fn maybe_checkpoint(
        &self,
        processor: &PointProcessor,
        accumulator: &ScanAccumulator,
        tracker: &mut CheckpointTracker,
        total: usize,
        start_time: chrono::DateTime<Utc>,
    ) {
        let fraction = accumulator.len() as f64 / total as f64;
        if fraction - tracker.last_saved_fraction < PARTIAL_SAVE_INTERVAL {
            return;
        }
        tracker.partial_counter += 1;
        tracker.last_saved_fraction = fraction;

        let parts_total = (1.0 / PARTIAL_SAVE_INTERVAL) as u32;
        if let Some(writer) = &self.writer {
            let metadata = self.metadata(
                processor,
                start_time,
                total,
                accumulator.len(),
                Some((tracker.partial_counter, parts_total)),
            );
            // Checkpoint failures never terminate a running scan.
            match writer.save_scan(&accumulator.snapshot(), &metadata).await {
                Ok(path) => log::info!(
                    "checkpoint {}/{} -> '{}'",
                    tracker.partial_counter,
                    parts_total,
                    path.display()
                ),
                Err(e) => log::warn!("checkpoint write failed: {e}"),
            }
        }
    }

    async fn persist(
        &self,
        processor: &PointProcessor,
        accumulator: &ScanAccumulator,
        start_time: chrono::DateTime<Utc>,
        total: usize,
        acquired: usize,
        partial: Option<(u32, u32)>,
    ) -> Option<PathBuf> {
        let writer = self.writer.as_ref()?;
        let metadata = self.metadata(processor, start_time, total, acquired, partial);
        match writer.save_scan(&accumulator.snapshot(), &metadata).await {
            Ok(path) => Some(path),
            Err(e) => {
                log::error!("archive write failed: {e}");
                None
            }
        }
    }

    fn metadata(
        &self,
        processor: &PointProcessor,
        start_time: chrono::DateTime<Utc>,
        total: usize,
        acquired: usize,
        partial: Option<(u32, u32)>,
    ) -> ScanMetadata {
        let end_time = Utc::now();
        let (part_index, parts_total, is_final) = match partial {
            Some((index, parts)) => (index, parts, false),
            None => (0, 1, true),
        };
        ScanMetadata {
            exposure_ms: self.plan.exposure.as_secs_f64() * 1e3,
            averages: 1,
            fft_mode: processor.mode().label().to_string(),
            n_windows: processor.active_window_count() as u32,
            scan_type: self.plan.scan_type().to_string(),
            n_points_total: total as u32,
            n_points_acquired: acquired as u32,
            part_index,
            parts_total,
            is_final,
            start_time,
            end_time,
            duration_sec: (end_time - start_time).num_milliseconds() as f64 / 1e3,
            instrument: self.instrument.clone(),
            software_version: SCHEMA_VERSION.to_string(),
        }
    }

    /// Send every enabled axis back to its range start.
    async fn return_to_start(&self) -> OctResult<()> {
        for (axis, range) in [
            (Axis::X, &self.plan.x),
            (Axis::Y, &self.plan.y),
            (Axis::Z, &self.plan.z),
        ] {
            if let Some(r) = range {
                self.motion
                    .goto_and_wait(axis, r.start)
                    .await
                    .map_err(|e| OctError::Motion(format!("{e:#}")))?;
            }
        }
        log::info!("stage returned to start coordinates");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_range_is_inclusive_both_directions() {
        assert_eq!(float_range(0.0, 1.0, 0.5), vec![0.0, 0.5, 1.0]);
        assert_eq!(float_range(1.0, 0.0, 0.5), vec![1.0, 0.5, 0.0]);
        assert_eq!(float_range(2.0, 2.0, 0.1), vec![2.0]);
        // Negative steps are taken as magnitude
        assert_eq!(float_range(0.0, 1.0, -0.5), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn float_range_survives_accumulation_error() {
        let pts = float_range(0.0, 0.3, 0.1);
        assert_eq!(pts.len(), 4);
        assert!((pts[3] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn plan_point_counts_multiply_across_axes() {
        let plan = ScanPlan {
            x: Some(AxisRange {
                start: 0.0,
                end: 1.0,
                step: 0.5,
            }),
            y: Some(AxisRange {
                start: 0.0,
                end: 0.2,
                step: 0.1,
            }),
            z: None,
            settling: Duration::ZERO,
            exposure: Duration::ZERO,
            partial_saves: false,
        };
        assert_eq!(plan.total_points(), 9);
        assert_eq!(plan.scan_type(), "2D");
    }

    #[test]
    fn plan_without_axes_is_single_point() {
        let plan = ScanPlan {
            x: None,
            y: None,
            z: None,
            settling: Duration::ZERO,
            exposure: Duration::ZERO,
            partial_saves: false,
        };
        assert_eq!(plan.total_points(), 1);
        assert_eq!(plan.scan_type(), "unknown");
    }

    #[test]
    fn cancel_token_latches() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
