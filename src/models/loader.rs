//! ONNX model loader

use crate::error::ModelError;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};
use tracing::info;

/// How the feature row is fed to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLayout {
    /// Single `[1, n]` float tensor in schema order
    Packed(String),
    /// One `[1, 1]` tensor per feature, bound by input name
    Named(Vec<String>),
}

impl InputLayout {
    /// Pick the layout from the session's declared input names
    pub fn from_input_names(mut names: Vec<String>) -> Self {
        match names.len() {
            0 => InputLayout::Packed("float_input".to_string()),
            1 => InputLayout::Packed(names.remove(0)),
            _ => InputLayout::Named(names),
        }
    }
}

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input binding discovered from the session
    pub layout: InputLayout,
    /// Output name for probabilities
    pub output_name: String,
}

/// Loader for the classifier artifact
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    pub fn onnx_threads(&self) -> usize {
        self.onnx_threads
    }

    /// Load a single ONNX model from file.
    ///
    /// The artifact's feature schema is not checked here; a mismatch shows up
    /// as an inference error on the first call.
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel, ModelError> {
        let path = resolve_model_path(path)?;

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let load_error = |source: ort::Error| ModelError::Load {
            path: path.clone(),
            source,
        };

        ort::init().commit().map_err(load_error)?;

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(self.onnx_threads))
            .and_then(|b| b.commit_from_file(&path))
            .map_err(load_error)?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let layout = InputLayout::from_input_names(input_names);

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            layout = ?layout,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            layout,
            output_name,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that the artifact path resolves to a file before touching the runtime
pub fn resolve_model_path<P: AsRef<Path>>(path: P) -> Result<PathBuf, ModelError> {
    let path = path.as_ref();
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(ModelError::NotFound(path.to_path_buf()))
    }
}
