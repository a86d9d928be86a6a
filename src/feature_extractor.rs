//! Feature extraction for rebleeding model inference.
//!
//! Turns a typed patient record into the single-row feature layout the
//! trained CatBoost model expects: nine named features in a fixed order,
//! three of them tagged categorical.

use crate::types::patient::PatientRecord;

/// Number of model features
pub const FEATURE_COUNT: usize = 9;

/// How the model interprets a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Discrete unordered code
    Categorical,
    /// Continuous lab value
    Continuous,
    /// Pre-computed integer clinical score
    Score,
}

/// Feature names and kinds, in training order
pub const FEATURE_SCHEMA: [(&str, FeatureKind); FEATURE_COUNT] = [
    ("Method", FeatureKind::Categorical),
    ("Location", FeatureKind::Categorical),
    ("Descending", FeatureKind::Categorical),
    ("Creatinine", FeatureKind::Continuous),
    ("BUN", FeatureKind::Continuous),
    ("PT", FeatureKind::Continuous),
    ("APTT", FeatureKind::Continuous),
    ("Rockall", FeatureKind::Score),
    ("AIMS65", FeatureKind::Score),
];

/// A single tagged feature value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Categorical(i64),
    Continuous(f32),
    Score(i64),
}

impl FeatureValue {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValue::Categorical(_) => FeatureKind::Categorical,
            FeatureValue::Continuous(_) => FeatureKind::Continuous,
            FeatureValue::Score(_) => FeatureKind::Score,
        }
    }

    /// Numeric view used by the packed float layout
    pub fn as_f32(&self) -> f32 {
        match *self {
            FeatureValue::Categorical(code) => code as f32,
            FeatureValue::Continuous(value) => value,
            FeatureValue::Score(score) => score as f32,
        }
    }
}

/// Named feature inside a row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub name: &'static str,
    pub value: FeatureValue,
}

/// One model input row, in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    features: [Feature; FEATURE_COUNT],
}

impl FeatureRow {
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.features
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    /// Flatten to a dense f32 vector (categorical codes become floats)
    pub fn to_dense(&self) -> Vec<f32> {
        self.features.iter().map(|f| f.value.as_f32()).collect()
    }
}

/// Feature extractor that transforms patient records into model input rows.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract the feature row for a record.
    pub fn extract(&self, record: &PatientRecord) -> FeatureRow {
        let values = [
            FeatureValue::Categorical(record.method.code()),
            FeatureValue::Categorical(record.location.code()),
            FeatureValue::Categorical(i64::from(record.descending)),
            FeatureValue::Continuous(record.creatinine as f32),
            FeatureValue::Continuous(record.bun as f32),
            FeatureValue::Continuous(record.pt as f32),
            FeatureValue::Continuous(record.aptt as f32),
            FeatureValue::Score(i64::from(record.rockall)),
            FeatureValue::Score(i64::from(record.aims65)),
        ];

        FeatureRow {
            features: std::array::from_fn(|i| Feature {
                name: FEATURE_SCHEMA[i].0,
                value: values[i],
            }),
        }
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn feature_names(&self) -> Vec<&'static str> {
        FEATURE_SCHEMA.iter().map(|(name, _)| *name).collect()
    }

    /// Names of the features the model was trained to treat as categorical
    pub fn categorical_features(&self) -> Vec<&'static str> {
        FEATURE_SCHEMA
            .iter()
            .filter(|(_, kind)| *kind == FeatureKind::Categorical)
            .map(|(name, _)| *name)
            .collect()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
