//! Error types.

use std::io;
use std::num::{ParseFloatError, ParseIntError};

pub type Result<T> = core::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Self::WorkbookError(e.to_string())
    }
}

/// Crate-wide error type.
///
/// Point-level failures carry enough context (artifact path, sweep
/// coordinates, node coordinate) to reproduce the failing point without
/// re-running the whole campaign.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IoError(String),

    #[error("cannot read campaign input: {path}: {reason}")]
    InputUnavailable { path: String, reason: String },
    #[error("toml deserialization error: {0}")]
    TomlDeserError(#[from] toml::de::Error),
    #[error("failed parsing int: {0}")]
    ParseIntError(#[from] ParseIntError),
    #[error("failed parsing float: {0}")]
    ParseFloatError(#[from] ParseFloatError),

    #[error("config field not found: `{field}` in {path}")]
    FieldNotFound { field: String, path: String },
    #[error("config field `{field}` matches {count} lines in {path}, expected exactly one")]
    FieldAmbiguous {
        field: String,
        path: String,
        count: usize,
    },
    #[error("driver artifact {path} has {found} seed call sites, expected exactly 2")]
    SeedSiteMismatch { path: String, found: usize },
    #[error("malformed artifact {path}: {reason}")]
    MalformedArtifact { path: String, reason: String },

    #[error("simulator exited with non-zero status: {code:?}")]
    SimulationFailed { code: Option<i32> },
    #[error("simulator exceeded time limit of {seconds}s and was killed")]
    SimulationTimeout { seconds: u64 },

    #[error("missing transcript for node ({x},{y}): {path}")]
    MissingTranscript { x: u32, y: u32, path: String },
    #[error("malformed transcript {path} at line {line}: {reason}")]
    MalformedTranscript {
        path: String,
        line: usize,
        reason: String,
    },
    #[error("aggregate for rate {rate} holds {found} records, expected {expected}")]
    RecordCountMismatch {
        rate: String,
        expected: usize,
        found: usize,
    },

    #[error("workbook error: {0}")]
    WorkbookError(String),

    #[error("sweep point failed (weight scenario {weight_idx}, rate index {rate_idx}): {source}")]
    Point {
        weight_idx: usize,
        rate_idx: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("other error: {0}")]
    Other(String),
}

impl Error {
    /// Wraps a stage error with the coordinates of the sweep point it
    /// occurred at.
    pub fn at_point(self, weight_idx: usize, rate_idx: usize) -> Self {
        Error::Point {
            weight_idx,
            rate_idx,
            source: Box::new(self),
        }
    }
}
