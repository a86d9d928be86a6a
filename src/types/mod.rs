//! Type definitions for rebleeding risk assessment

pub mod assessment;
pub mod patient;

pub use assessment::{RiskAssessment, RiskBand};
pub use patient::{LesionLocation, PatientRecord, RawAssessment, TreatmentMethod};
