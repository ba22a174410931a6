//! Error types for the extension pipeline
//!
//! Only `MetadataCopyError::UnsupportedFormat` is recovered (logged, run
//! continues). Everything else aborts the run and leaves already-produced
//! files on disk.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

use crate::OutputFormat;

/// Rejected command-line options. Raised before any file is touched.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("--fade-length must not be 0 (omit it to extend without fading out)")]
    ZeroFadeLength,

    #[error("--fade-length must be a positive number of seconds, got {0}")]
    InvalidFadeLength(f64),

    #[error("--extended-length must be a positive number of seconds, got {0}")]
    InvalidExtendedLength(f64),

    #[error("--min-duration-multiplier must be in [0, 1), got {0}")]
    InvalidMinDurationMultiplier(f64),

    #[error("format '{0}' is not one of WAV, FLAC, OGG, MP3, M4A")]
    UnknownFormat(String),

    #[error("format '{format}' is not supported on {platform}")]
    FormatUnsupportedOnPlatform {
        format: OutputFormat,
        platform: &'static str,
    },
}

/// Failures of the loop extension engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to decode '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("No usable loop points found in '{path}'\n  Tip: try --brute-force or a lower --min-duration-multiplier")]
    NoLoopFound { path: PathBuf },

    #[error("The loop extension engine cannot produce {0} output directly")]
    UnsupportedFormat(OutputFormat),

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Loop selection aborted: {0}")]
    Selection(#[source] std::io::Error),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Failures of the external audio encoder.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to start encoder '{program}': {source}\n  Tip: make sure ffmpeg is installed or pass --ffmpeg")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoder exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Failures of the tag copy collaborator.
#[derive(Debug, Error)]
pub enum MetadataCopyError {
    #[error("Unsupported format for '{path}': {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("Failed to copy tags to '{path}': {reason}")]
    Tag { path: PathBuf, reason: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error of one extension run.
#[derive(Debug, Error)]
pub enum ExtendError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Metadata(#[from] MetadataCopyError),

    #[error("Failed to copy file dates from '{source_path}' to '{path}': {source}")]
    TimestampCopy {
        source_path: PathBuf,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete intermediate file '{path}': {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ExtendError>;
