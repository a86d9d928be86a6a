//! Rebleeding Risk Library
//!
//! Scores rebleeding risk after endoscopic hemostasis for peptic ulcer
//! bleeding with a pre-trained CatBoost model exported to ONNX, and maps
//! the probability to a low / moderate / high risk band.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod models;
pub mod report;
pub mod types;

pub use config::AppConfig;
pub use error::{ModelError, RecordError};
pub use feature_extractor::FeatureExtractor;
pub use models::inference::{InferenceEngine, PredictionOutcome};
pub use types::{assessment::RiskAssessment, assessment::RiskBand, patient::RawAssessment};
