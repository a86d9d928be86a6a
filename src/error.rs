//! Error types for record construction, model loading and inference

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to coerce raw form fields into a typed patient record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("treatment method code {0} is outside 1..=5")]
    MethodOutOfDomain(i64),

    #[error("lesion location code {0} is outside 1..=9")]
    LocationOutOfDomain(i64),

    #[error("descending duodenum flag must be 0 or 1, got {0}")]
    InvalidFlag(i64),

    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} must be an integer between 0 and 255, got {value}")]
    ScoreOutOfRange { field: &'static str, value: i64 },
}

/// Model loading and inference errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Artifact path does not resolve
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Artifact exists but the runtime could not build a session from it
    #[error("failed to load model from {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },

    #[error("invalid patient record: {0}")]
    Record(#[from] RecordError),

    #[error("model has no input for feature '{0}'")]
    MissingInput(String),

    #[error("inference failed: {0}")]
    Runtime(#[from] ort::Error),

    #[error("could not extract a rebleeding probability from model output")]
    NoProbability,

    #[error("model returned a non-finite probability ({0})")]
    NonFiniteProbability(f64),

    #[error("model session lock poisoned")]
    Poisoned,

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference task failed: {0}")]
    Task(String),
}
