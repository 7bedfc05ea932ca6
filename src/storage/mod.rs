//! Scan archive persistence.
//!
//! The scan engine hands the accumulated buffers plus a metadata record to
//! an [`ArchiveWriter`] at checkpoints and at scan end. The concrete format
//! behind the trait is the writer's contract; [`JsonArchiveWriter`] persists
//! one pretty-printed JSON document per bundle. Peak buffers keep their
//! fixed `MAX_WINDOWS × PEAKS_PER_WINDOW` shape in the document, with NaN
//! sentinels mapped to `null`.
//!
//! Filenames are timestamped:
//! `scan_YYYY-MM-DD_HH-MM.json` for final bundles and
//! `scan_YYYY-MM-DD_HH-MM_part_XXofYY.json` for checkpoints.

use crate::error::{OctError, OctResult};
use crate::hardware::Spectrum;
use crate::scan::accumulator::{ScanSnapshot, MAX_WINDOWS, PEAKS_PER_WINDOW};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Archive layout version recorded in every bundle.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Metadata record persisted alongside the accumulation buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub exposure_ms: f64,
    pub averages: u32,
    /// Transform mode label: "FFT" or "CZT".
    pub fft_mode: String,
    pub n_windows: u32,
    /// "1D", "2D" or "3D".
    pub scan_type: String,
    pub n_points_total: u32,
    pub n_points_acquired: u32,
    pub part_index: u32,
    pub parts_total: u32,
    pub is_final: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_sec: f64,
    pub instrument: String,
    pub software_version: String,
}

/// The complete persisted document: metadata plus the buffer bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveDocument {
    pub metadata: ScanMetadata,
    pub x_mm: Vec<f64>,
    pub y_mm: Vec<f64>,
    pub z_mm: Vec<f64>,
    pub wavelengths_nm: Option<Vec<f64>>,
    pub spectra: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub full_magnitude: Vec<Vec<f64>>,
    /// Per point: `MAX_WINDOWS` rows of `PEAKS_PER_WINDOW` OPD slots.
    pub peak_opd_m: Vec<Vec<Vec<Option<f64>>>>,
    /// Same shape for the peak amplitudes.
    pub peak_amplitude: Vec<Vec<Vec<Option<f64>>>>,
}

impl ArchiveDocument {
    /// Assemble a document from a buffer snapshot and its metadata.
    pub fn from_snapshot(snapshot: &ScanSnapshot, metadata: &ScanMetadata) -> Self {
        let to_rows = |grid: &[[f64; PEAKS_PER_WINDOW]; MAX_WINDOWS]| -> Vec<Vec<Option<f64>>> {
            grid.iter()
                .map(|row| {
                    row.iter()
                        .map(|v| if v.is_finite() { Some(*v) } else { None })
                        .collect()
                })
                .collect()
        };

        Self {
            metadata: metadata.clone(),
            x_mm: snapshot.x_mm.clone(),
            y_mm: snapshot.y_mm.clone(),
            z_mm: snapshot.z_mm.clone(),
            wavelengths_nm: snapshot.wavelengths_nm.clone(),
            spectra: snapshot.spectra.clone(),
            full_magnitude: snapshot.full_magnitude.clone(),
            peak_opd_m: snapshot.peaks.iter().map(|p| to_rows(p.opd())).collect(),
            peak_amplitude: snapshot
                .peaks
                .iter()
                .map(|p| to_rows(p.amplitude()))
                .collect(),
        }
    }
}

/// Consumer of finished (or checkpointed) scan bundles.
#[async_trait]
pub trait ArchiveWriter: Send + Sync {
    /// Persist one bundle and return the path it was written to.
    async fn save_scan(
        &self,
        snapshot: &ScanSnapshot,
        metadata: &ScanMetadata,
    ) -> OctResult<PathBuf>;
}

/// Writer persisting bundles as JSON documents under a base directory.
pub struct JsonArchiveWriter {
    base_dir: PathBuf,
}

impl JsonArchiveWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl ArchiveWriter for JsonArchiveWriter {
    async fn save_scan(
        &self,
        snapshot: &ScanSnapshot,
        metadata: &ScanMetadata,
    ) -> OctResult<PathBuf> {
        std::fs::create_dir_all(&self.base_dir)?;
        let path = generate_filename(
            &self.base_dir,
            !metadata.is_final,
            metadata.part_index,
            metadata.parts_total,
        );

        let document = ArchiveDocument::from_snapshot(snapshot, metadata);
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| OctError::Serialization(e.to_string()))?;
        std::fs::write(&path, json)?;

        log::info!(
            "archived {} points to '{}'",
            metadata.n_points_acquired,
            path.display()
        );
        Ok(path)
    }
}

/// Build a timestamped archive path under `base_dir`.
pub fn generate_filename(
    base_dir: &Path,
    is_partial: bool,
    part_index: u32,
    parts_total: u32,
) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M");
    let filename = if is_partial {
        format!("scan_{timestamp}_part_{part_index:02}of{parts_total:02}.json")
    } else {
        format!("scan_{timestamp}.json")
    };
    base_dir.join(filename)
}

/// Load a previously written archive document.
pub fn read_archive(path: &Path) -> OctResult<ArchiveDocument> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| OctError::Serialization(e.to_string()))
}

/// Write a single spectrum snapshot as CSV (`spec_YYYY-MM-DD_HH-MM-SS.csv`).
pub fn save_spectrum_csv(base_dir: &Path, spectrum: &Spectrum) -> OctResult<PathBuf> {
    std::fs::create_dir_all(base_dir)?;
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = base_dir.join(format!("spec_{timestamp}.csv"));

    let mut writer =
        csv::Writer::from_path(&path).map_err(|e| OctError::Storage(e.to_string()))?;
    writer
        .write_record(["Wavelength (nm)", "Intensity"])
        .map_err(|e| OctError::Storage(e.to_string()))?;
    for (wl, intensity) in spectrum
        .wavelengths_nm
        .iter()
        .zip(spectrum.intensities.iter())
    {
        writer
            .write_record([wl.to_string(), intensity.to_string()])
            .map_err(|e| OctError::Storage(e.to_string()))?;
    }
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::accumulator::{PeakBuffer, PointRecord, ScanAccumulator};
    use chrono::Utc;

    fn sample_metadata(is_final: bool) -> ScanMetadata {
        let now = Utc::now();
        ScanMetadata {
            exposure_ms: 10.0,
            averages: 1,
            fft_mode: "FFT".into(),
            n_windows: 1,
            scan_type: "1D".into(),
            n_points_total: 2,
            n_points_acquired: 2,
            part_index: 0,
            parts_total: 1,
            is_final,
            start_time: now,
            end_time: now,
            duration_sec: 0.0,
            instrument: "OCT-TEST".into(),
            software_version: SCHEMA_VERSION.into(),
        }
    }

    fn sample_snapshot() -> ScanSnapshot {
        let mut acc = ScanAccumulator::new();
        acc.record_wavelengths_once(&[780.0, 850.0, 920.0]);
        let mut peaks = PeakBuffer::new();
        peaks.set(0, 0, 0.8e-3, 12.5);
        acc.push(PointRecord {
            x_mm: 0.0,
            y_mm: 0.0,
            z_mm: 0.0,
            spectrum: vec![1.0, 2.0, 1.0],
            full_magnitude: Some(vec![4.0, 1.0]),
            peaks,
        });
        acc.push(PointRecord {
            x_mm: 0.1,
            y_mm: 0.0,
            z_mm: 0.0,
            spectrum: vec![1.0, 2.1, 1.0],
            full_magnitude: Some(vec![4.1, 1.1]),
            peaks: PeakBuffer::new(),
        });
        acc.snapshot()
    }

    #[test]
    fn document_maps_sentinels_to_null_and_keeps_shape() {
        let doc = ArchiveDocument::from_snapshot(&sample_snapshot(), &sample_metadata(true));
        assert_eq!(doc.peak_opd_m.len(), 2);
        for point in &doc.peak_opd_m {
            assert_eq!(point.len(), MAX_WINDOWS);
            for row in point {
                assert_eq!(row.len(), PEAKS_PER_WINDOW);
            }
        }
        assert_eq!(doc.peak_opd_m[0][0][0], Some(0.8e-3));
        assert_eq!(doc.peak_opd_m[0][0][1], None);
        assert_eq!(doc.peak_amplitude[0][0][0], Some(12.5));
        assert_eq!(doc.peak_opd_m[1][0][0], None);
    }

    #[tokio::test]
    async fn json_round_trip_preserves_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonArchiveWriter::new(dir.path());
        let snapshot = sample_snapshot();
        let metadata = sample_metadata(true);

        let path = writer.save_scan(&snapshot, &metadata).await.unwrap();
        assert!(path.exists());

        let loaded = read_archive(&path).unwrap();
        assert_eq!(loaded.metadata.n_points_acquired, 2);
        assert_eq!(loaded.metadata.fft_mode, "FFT");
        assert!(loaded.metadata.is_final);
        assert_eq!(loaded.x_mm, snapshot.x_mm);
        assert_eq!(loaded.spectra, snapshot.spectra);
        assert_eq!(loaded.peak_opd_m[0][0][0], Some(0.8e-3));
    }

    #[test]
    fn partial_filenames_carry_part_indices() {
        let path = generate_filename(Path::new("scans"), true, 3, 10);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("scan_"));
        assert!(name.ends_with("_part_03of10.json"));

        let final_path = generate_filename(Path::new("scans"), false, 0, 1);
        let final_name = final_path.file_name().unwrap().to_string_lossy();
        assert!(!final_name.contains("part"));
    }

    #[test]
    fn spectrum_csv_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let spectrum = Spectrum {
            wavelengths_nm: vec![780.0, 850.0],
            intensities: vec![1.5, 2.5],
        };
        let path = save_spectrum_csv(dir.path(), &spectrum).unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("Wavelength (nm),Intensity"));
        assert!(contents.contains("780,1.5"));
    }
}
