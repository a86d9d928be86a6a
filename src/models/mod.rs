//! ML model loading and inference components

pub mod classifier;
pub mod inference;
pub mod loader;

pub use classifier::{Classifier, OnnxClassifier};
pub use inference::{InferenceEngine, PredictionOutcome, FALLBACK_PROBABILITY};
pub use loader::ModelLoader;
