//! Classifier handle shared by the inference engine

use crate::error::ModelError;
use crate::feature_extractor::{FeatureRow, FeatureValue};
use crate::models::loader::{InputLayout, LoadedModel, ModelLoader};
use ort::memory::Allocator;
use ort::session::SessionInputValue;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Class index of the rebleeding (DN group) outcome
pub const POSITIVE_CLASS: i64 = 1;

/// A binary classifier that scores one feature row.
pub trait Classifier: Send + Sync {
    /// Model name for logs and reports
    fn name(&self) -> &str;

    /// Unclamped probability of the positive class
    fn predict_proba(&self, row: &FeatureRow) -> Result<f64, ModelError>;
}

/// Classifier backed by an ONNX Runtime session.
///
/// The session needs exclusive access while running, so calls are serialized.
pub struct OnnxClassifier {
    name: String,
    model: Mutex<LoadedModel>,
}

impl OnnxClassifier {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            name: model.name.clone(),
            model: Mutex::new(model),
        }
    }

    /// Load the artifact at `path` and wrap it
    pub fn load<P: AsRef<Path>>(path: P, name: &str, onnx_threads: usize) -> Result<Self, ModelError> {
        let model = ModelLoader::with_threads(onnx_threads).load_model(path, name)?;
        Ok(Self::new(model))
    }

    fn run_model(model: &mut LoadedModel, row: &FeatureRow) -> Result<f64, ModelError> {
        let outputs = match &model.layout {
            InputLayout::Packed(input_name) => {
                let features = row.to_dense();
                let shape = vec![1_i64, features.len() as i64];
                let input_tensor = Tensor::from_array((shape, features))?;
                model
                    .session
                    .run(ort::inputs![input_name.as_str() => input_tensor])?
            }
            InputLayout::Named(input_names) => {
                let mut inputs: Vec<(Cow<'static, str>, SessionInputValue<'static>)> =
                    Vec::with_capacity(row.len());
                for (name, element) in bind_named_inputs(input_names, row)? {
                    let shape = vec![1_i64, 1];
                    let tensor: SessionInputValue<'static> = match element {
                        InputElement::Int64(code) => {
                            Tensor::from_array((shape, vec![code]))?.into()
                        }
                        InputElement::Float32(value) => {
                            Tensor::from_array((shape, vec![value]))?.into()
                        }
                    };
                    inputs.push((Cow::Owned(name), tensor));
                }
                model.session.run(inputs)?
            }
        };

        extract_probability(&outputs, &model.output_name, &model.name)
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        let mut model = self.model.lock().map_err(|_| ModelError::Poisoned)?;
        Self::run_model(&mut model, row)
    }
}

/// Element of a single-feature input tensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputElement {
    Int64(i64),
    Float32(f32),
}

impl From<FeatureValue> for InputElement {
    /// Categorical codes stay integers; everything else is sent as `f32`
    fn from(value: FeatureValue) -> Self {
        match value {
            FeatureValue::Categorical(code) => InputElement::Int64(code),
            other => InputElement::Float32(other.as_f32()),
        }
    }
}

/// Match each feature to a session input by name (case-insensitive)
/// and pick the tensor element type for it.
pub fn bind_named_inputs(
    input_names: &[String],
    row: &FeatureRow,
) -> Result<Vec<(String, InputElement)>, ModelError> {
    row.iter()
        .map(|feature| {
            input_names
                .iter()
                .find(|n| n.eq_ignore_ascii_case(feature.name))
                .map(|n| (n.clone(), InputElement::from(feature.value)))
                .ok_or_else(|| ModelError::MissingInput(feature.name.to_string()))
        })
        .collect()
}

/// Extract the rebleeding probability from model output.
///
/// Handles tensor outputs and the seq(map) output CatBoost/LightGBM exports produce.
fn extract_probability(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64, ModelError> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(prob) = extract_from_value(&output, model_name) {
            return Ok(prob);
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(prob) = extract_from_value(&output, model_name) {
            debug!(model = %model_name, output = %name, "Extracted probability from fallback output");
            return Ok(prob);
        }
    }

    warn!(model = %model_name, "Could not extract probability from model output");
    Err(ModelError::NoProbability)
}

fn extract_from_value(output: &ort::value::DynValue, model_name: &str) -> Option<f64> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        let prob = positive_prob_from_tensor(&dims, data);
        debug!(model = %model_name, prob = ?prob, "Extracted from tensor");
        return prob;
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        return extract_from_sequence_map(output, model_name).ok();
    }

    None
}

/// Probability from seq(map(int64, float)) output
fn extract_from_sequence_map(
    output: &ort::value::DynValue,
    model_name: &str,
) -> Result<f64, ModelError> {
    let allocator = Allocator::default();

    let sequence = output.downcast_ref::<DynSequenceValueType>()?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    // Batch size is always 1
    let map_value = maps.first().ok_or(ModelError::NoProbability)?;
    let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;

    let prob = positive_prob_from_map(&kv_pairs).ok_or(ModelError::NoProbability)?;
    debug!(model = %model_name, prob = prob, "Extracted from seq(map)");
    Ok(prob)
}

/// Positive-class probability from a `[batch, classes]`, `[classes]` or
/// single-probability tensor.
pub fn positive_prob_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims {
        [_, classes] | [classes] => *classes,
        _ => return data.last().map(|&v| v as f64),
    };

    match classes {
        c if c >= 2 => data.get(POSITIVE_CLASS as usize).map(|&v| v as f64),
        1 => data.first().map(|&v| v as f64),
        _ => None,
    }
}

/// Positive-class probability from class → probability pairs
pub fn positive_prob_from_map(pairs: &[(i64, f32)]) -> Option<f64> {
    if let Some((_, prob)) = pairs.iter().find(|(class, _)| *class == POSITIVE_CLASS) {
        return Some(*prob as f64);
    }
    pairs
        .iter()
        .find(|(class, _)| *class == 0)
        .map(|(_, prob)| 1.0 - *prob as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::FeatureExtractor;
    use crate::types::patient::{PatientRecord, RawAssessment};

    fn row() -> FeatureRow {
        let record = PatientRecord::try_from(&RawAssessment::default()).unwrap();
        FeatureExtractor::new().extract(&record)
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_bind_named_inputs_sends_categoricals_as_int64() {
        let inputs = names(&[
            "AIMS65", "Rockall", "APTT", "PT", "BUN", "Creatinine", "Descending", "Location",
            "Method",
        ]);

        let bound = bind_named_inputs(&inputs, &row()).unwrap();

        assert_eq!(bound.len(), 9);
        assert_eq!(bound[0], ("Method".to_string(), InputElement::Int64(1)));
        assert_eq!(bound[1], ("Location".to_string(), InputElement::Int64(1)));
        assert_eq!(bound[2], ("Descending".to_string(), InputElement::Int64(0)));
        assert_eq!(bound[3], ("Creatinine".to_string(), InputElement::Float32(80.0)));
        assert_eq!(bound[7], ("Rockall".to_string(), InputElement::Float32(9.0)));
        assert_eq!(bound[8], ("AIMS65".to_string(), InputElement::Float32(3.0)));
    }

    #[test]
    fn test_input_element_from_feature_value() {
        assert_eq!(InputElement::from(FeatureValue::Categorical(7)), InputElement::Int64(7));
        assert_eq!(InputElement::from(FeatureValue::Continuous(12.5)), InputElement::Float32(12.5));
        assert_eq!(InputElement::from(FeatureValue::Score(4)), InputElement::Float32(4.0));
    }

    #[test]
    fn test_bind_named_inputs_is_case_insensitive() {
        let inputs = names(&[
            "method", "location", "descending", "creatinine", "bun", "pt", "aptt", "rockall",
            "aims65",
        ]);
        let bound = bind_named_inputs(&inputs, &row()).unwrap();
        assert_eq!(bound[4].0, "bun");
    }

    #[test]
    fn test_bind_named_inputs_reports_missing_feature() {
        let inputs = names(&["Method", "Location"]);
        let err = bind_named_inputs(&inputs, &row()).unwrap_err();
        assert!(matches!(err, ModelError::MissingInput(ref f) if f == "Descending"));
    }

    #[test]
    fn test_positive_prob_from_tensor() {
        assert_eq!(positive_prob_from_tensor(&[1, 2], &[0.25, 0.75]), Some(0.75));
        assert_eq!(positive_prob_from_tensor(&[2], &[0.5, 0.5]), Some(0.5));
        assert_eq!(positive_prob_from_tensor(&[1, 1], &[0.5]), Some(0.5));
        assert_eq!(positive_prob_from_tensor(&[1, 0], &[]), None);
    }

    #[test]
    fn test_positive_prob_from_map() {
        assert_eq!(positive_prob_from_map(&[(0, 0.25), (1, 0.75)]), Some(0.75));
        assert_eq!(positive_prob_from_map(&[(0, 0.25)]), Some(0.75));
        assert_eq!(positive_prob_from_map(&[(2, 0.25)]), None);
    }
}
