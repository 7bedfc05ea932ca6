//! Scan orchestration.
//!
//! A scan is one long-running task that moves the stage through a raster
//! (outermost Z, then Y, then X), acquires one spectrum per point, runs the
//! processing pipeline synchronously on it, and appends the result to the
//! accumulation buffers. Nothing overlaps: the next point is not touched
//! until the current one is processed.
//!
//! The pipeline state ([`pipeline::PointProcessor`]) and the buffers
//! ([`accumulator::ScanAccumulator`]) are exclusively borrowed by the running
//! scan, so a live-preview cycle - which reads the same instrument and
//! mutates the same k-space cache - cannot run concurrently with it by
//! construction. Whoever holds the `&mut` is the single writer.
//!
//! Cancellation is cooperative: the engine polls a [`engine::CancelToken`]
//! between points (never mid-point), finishes the current point cleanly and
//! returns the stage to its start position. A cancelled scan is a valid
//! partial result, never a torn one.

pub mod accumulator;
pub mod engine;
pub mod pipeline;

pub use accumulator::{PeakBuffer, ScanAccumulator, ScanSnapshot, MAX_WINDOWS, PEAKS_PER_WINDOW};
pub use engine::{CancelToken, ScanEngine, ScanOutcome, ScanPlan, ScanSummary};
pub use pipeline::{PointProcessor, TransformMode};
