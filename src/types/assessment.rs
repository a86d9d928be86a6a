//! Risk band classification and assessment report structures

use crate::types::patient::RawAssessment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound (inclusive) of the moderate band
pub const MODERATE_RISK_THRESHOLD: f64 = 0.4;

/// Lower bound (inclusive) of the high band
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Three-tier rebleeding risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    /// Map a probability in [0, 1] to its band using half-open intervals
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_THRESHOLD {
            RiskBand::High
        } else if probability >= MODERATE_RISK_THRESHOLD {
            RiskBand::Moderate
        } else {
            RiskBand::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Moderate => "Moderate Risk",
            RiskBand::High => "High Risk",
        }
    }

    /// Display color for the presentation layer
    pub fn color(self) -> &'static str {
        match self {
            RiskBand::Low => "green",
            RiskBand::Moderate => "orange",
            RiskBand::High => "red",
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            RiskBand::Low => {
                "Low short-term rebleeding risk. Routine monitoring may be sufficient."
            }
            RiskBand::Moderate => {
                "Consider close observation and evaluate need for intensified therapy."
            }
            RiskBand::High => {
                "High-risk patient! Consider blood transfusion, ICU admission, or early repeat endoscopy."
            }
        }
    }
}

/// Result of one assessment, ready for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Unique assessment identifier
    pub assessment_id: String,

    /// Rebleeding probability (0.0 - 1.0)
    pub probability: f64,

    /// Probability as a percentage, one decimal place
    pub probability_percent: f64,

    pub risk_band: RiskBand,

    pub risk_label: String,

    pub color: String,

    pub recommendation: String,

    /// Name of the model that produced the score
    pub model: String,

    /// Form fields as submitted
    pub inputs: RawAssessment,

    /// Set when the fallback probability was substituted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl RiskAssessment {
    /// Create a new assessment from a probability
    pub fn new(inputs: RawAssessment, probability: f64, model: impl Into<String>) -> Self {
        let band = RiskBand::from_probability(probability);

        Self {
            assessment_id: uuid::Uuid::new_v4().to_string(),
            probability,
            probability_percent: (probability * 1000.0).round() / 10.0,
            risk_band: band,
            risk_label: band.label().to_string(),
            color: band.color().to_string(),
            recommendation: band.recommendation().to_string(),
            model: model.into(),
            inputs,
            warning: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the reason the fallback probability was used
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}
