//! CLI entry point for oct_daq.
//!
//! Drives the scan controller against simulated hardware:
//! - `scan` - run the configured raster scan and archive the bundle
//! - `preview` - acquire and process one spectrum, print the peaks
//! - `theory` - print axial resolution and depth range for a source/detector
//! - `info` - summarize a previously written scan archive
//!
//! Ctrl-C during a scan requests a cooperative abort: the current point
//! finishes, the stage returns to its start coordinates, and the partial
//! bundle is archived.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use oct_daq::config::Settings;
use oct_daq::dsp::optics::{axial_resolution_um, max_depth_range_mm};
use oct_daq::hardware::capabilities::ExposureControl;
use oct_daq::hardware::mock::{MockSpectrometer, MockStage};
use oct_daq::hardware::SpectrumSource;
use oct_daq::scan::{
    CancelToken, PointProcessor, ScanAccumulator, ScanEngine, ScanOutcome, ScanPlan,
    TransformMode, MAX_WINDOWS, PEAKS_PER_WINDOW,
};
use oct_daq::storage::{read_archive, ArchiveWriter, JsonArchiveWriter};

#[derive(Parser)]
#[command(name = "oct_daq")]
#[command(about = "Spectral-domain OCT scan controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured scan against simulated hardware
    Scan {
        /// Configuration name under config/ (without extension)
        #[arg(long)]
        config: Option<String>,
    },

    /// Acquire one spectrum and print the detected peaks
    Preview {
        /// Configuration name under config/ (without extension)
        #[arg(long)]
        config: Option<String>,
    },

    /// Print theoretical resolution and depth range
    Theory {
        /// Minimum source wavelength in nm
        #[arg(long, default_value = "780")]
        wl_min: f64,
        /// Maximum source wavelength in nm
        #[arg(long, default_value = "920")]
        wl_max: f64,
        /// Detector pixel count
        #[arg(long, default_value = "3648")]
        pixels: usize,
    },

    /// Summarize a scan archive
    Info {
        /// Path to a scan .json archive
        archive: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { config } => run_scan(config.as_deref()).await,
        Commands::Preview { config } => run_preview(config.as_deref()).await,
        Commands::Theory {
            wl_min,
            wl_max,
            pixels,
        } => {
            println!(
                "Axial resolution ({wl_min}-{wl_max} nm): {:.2} um",
                axial_resolution_um(wl_min, wl_max)
            );
            println!(
                "Max depth range ({pixels} px): {:.2} mm",
                max_depth_range_mm(wl_min, wl_max, pixels)
            );
            Ok(())
        }
        Commands::Info { archive } => {
            let doc = read_archive(&archive)?;
            let m = &doc.metadata;
            println!("Archive: {}", archive.display());
            println!(
                "Points: {}/{} ({})",
                m.n_points_acquired, m.n_points_total, m.scan_type
            );
            println!("Mode: {} | Windows: {}", m.fft_mode, m.n_windows);
            if m.is_final {
                println!("Final bundle");
            } else {
                println!("Partial bundle {}/{}", m.part_index, m.parts_total);
            }
            println!("Start: {}", m.start_time);
            println!("End:   {} ({:.1} s)", m.end_time, m.duration_sec);
            println!("Instrument: {} (schema {})", m.instrument, m.software_version);
            Ok(())
        }
    }
}

fn build_hardware() -> (Arc<MockSpectrometer>, Arc<MockStage>) {
    // Simulated bench: a broadband source over the HR4000's span and two
    // reflectors inside the first default window.
    let spectrometer = Arc::new(
        MockSpectrometer::new(780.0, 920.0, 2048)
            .with_reflector(0.8e-3, 0.5)
            .with_reflector(0.62e-3, 0.2),
    );
    let stage = Arc::new(MockStage::new());
    (spectrometer, stage)
}

async fn run_scan(config: Option<&str>) -> Result<()> {
    let settings = Settings::new(config)?;
    let (spectrometer, stage) = build_hardware();

    spectrometer.connect().await?;
    spectrometer
        .set_exposure(settings.acquisition.exposure_ms / 1e3)
        .await?;
    spectrometer
        .set_dark_enabled(settings.acquisition.dark_correction)
        .await;
    spectrometer
        .set_gamma(settings.acquisition.gamma_correction)
        .await;

    let mode = if settings.processing.czt_windows {
        TransformMode::PerWindow
    } else {
        TransformMode::FullSpectrum
    };
    let mut processor = PointProcessor::new(
        mode,
        settings.processing.cubic_interpolation,
        &settings.windows,
    );
    let mut accumulator = ScanAccumulator::new();

    let writer: Arc<dyn ArchiveWriter> =
        Arc::new(JsonArchiveWriter::new(settings.storage.default_path.clone()));
    let engine = ScanEngine::new(
        stage,
        spectrometer,
        Some(writer),
        ScanPlan::from_settings(&settings),
        "OCT-HR4000-SIM",
    );

    let cancel = CancelToken::new();
    let ctrlc_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("abort requested - finishing current point");
            ctrlc_token.cancel();
        }
    });

    let summary = engine.run(&mut processor, &mut accumulator, &cancel).await?;
    match summary.outcome {
        ScanOutcome::Completed => println!(
            "Scan completed: {}/{} points",
            summary.points_acquired, summary.points_total
        ),
        ScanOutcome::Aborted => println!(
            "Scan aborted: {}/{} points kept",
            summary.points_acquired, summary.points_total
        ),
    }
    if let Some(path) = summary.archive_path {
        println!("Archived to {}", path.display());
    }
    Ok(())
}

async fn run_preview(config: Option<&str>) -> Result<()> {
    let settings = Settings::new(config)?;
    let (spectrometer, _) = build_hardware();

    spectrometer.connect().await?;
    spectrometer
        .set_exposure(settings.acquisition.exposure_ms / 1e3)
        .await?;

    let Some(spectrum) = spectrometer.read_spectrum().await? else {
        println!("No spectrum available");
        return Ok(());
    };

    let mode = if settings.processing.czt_windows {
        TransformMode::PerWindow
    } else {
        TransformMode::FullSpectrum
    };
    let mut processor = PointProcessor::new(
        mode,
        settings.processing.cubic_interpolation,
        &settings.windows,
    );
    let point = processor.process(&spectrum)?;

    println!(
        "Spectrum: {} px, {:.1}-{:.1} nm",
        spectrum.len(),
        spectrum.wavelengths_nm.first().copied().unwrap_or(0.0),
        spectrum.wavelengths_nm.last().copied().unwrap_or(0.0)
    );
    println!(
        "Resolution: {:.2} um",
        axial_resolution_um(
            spectrum.wavelengths_nm.first().copied().unwrap_or(0.0),
            spectrum.wavelengths_nm.last().copied().unwrap_or(0.0)
        )
    );
    for w in 0..MAX_WINDOWS {
        if point.peaks.filled(w) == 0 {
            continue;
        }
        for slot in 0..PEAKS_PER_WINDOW {
            let opd = point.peaks.opd()[w][slot];
            let amp = point.peaks.amplitude()[w][slot];
            if opd.is_finite() {
                println!("W{} peak {}: {:.2} um (amp {:.1})", w + 1, slot + 1, opd * 1e6, amp);
            }
        }
    }
    Ok(())
}
