//! Custom error types for the application.
//!
//! This module defines the primary error type, `OctError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle different kinds of errors, from I/O and
//! configuration issues to hardware and processing problems.
//!
//! ## Error Hierarchy
//!
//! `OctError` consolidates several error sources:
//!
//! - **`Config`**: Wraps errors from the `config` crate, typically related to
//!   file parsing or format issues in the configuration files.
//! - **`Configuration`**: Semantic errors in the configuration - values that
//!   parse fine but are logically invalid (e.g. more depth windows than the
//!   archive layout allows). Caught during the validation step.
//! - **`Io`**: Wraps standard `std::io::Error` for file I/O.
//! - **`Interpolation`**: Construction failure of an interpolant. This is
//!   always recovered internally by the resampler (it falls back to the
//!   linear strategy) and never crosses the pipeline boundary.
//! - **`Processing`**: Errors in the signal-processing stages.
//! - **`Spectrometer`** / **`Motion`**: Hardware/communication failures. The
//!   processing core itself never raises these; they originate at the
//!   hardware boundary and terminate the enclosing scan.
//! - **`Storage`** / **`Serialization`**: Archive persistence failures.
//!
//! By using `#[from]`, `OctError` can be seamlessly created from underlying
//! error types, simplifying error handling with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type OctResult<T> = std::result::Result<T, OctError>;

#[derive(Error, Debug)]
pub enum OctError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interpolation error: {0}")]
    Interpolation(String),

    #[error("Data processing error: {0}")]
    Processing(String),

    #[error("Spectrometer error: {0}")]
    Spectrometer(String),

    #[error("Motion error: {0}")]
    Motion(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
