//! Patient assessment data structures for rebleeding risk prediction

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Endoscopic hemostasis method (categorical, codes 1-5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreatmentMethod {
    Clip = 1,
    Electrocoagulation = 2,
    Spray = 3,
    Injection = 4,
    CombinedTherapy = 5,
}

impl TreatmentMethod {
    pub const ALL: [TreatmentMethod; 5] = [
        TreatmentMethod::Clip,
        TreatmentMethod::Electrocoagulation,
        TreatmentMethod::Spray,
        TreatmentMethod::Injection,
        TreatmentMethod::CombinedTherapy,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            TreatmentMethod::Clip => "Clip",
            TreatmentMethod::Electrocoagulation => "Electrocoagulation",
            TreatmentMethod::Spray => "Spray",
            TreatmentMethod::Injection => "Injection",
            TreatmentMethod::CombinedTherapy => "Combined Therapy",
        }
    }
}

impl TryFrom<i64> for TreatmentMethod {
    type Error = RecordError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|m| m.code() == code)
            .ok_or(RecordError::MethodOutOfDomain(code))
    }
}

impl fmt::Display for TreatmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code(), self.label())
    }
}

/// Lesion location (categorical, codes 1-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LesionLocation {
    Cardia = 1,
    GastricBody = 2,
    GastricFundus = 3,
    GastricAngle = 4,
    GastricAntrum = 5,
    Pylorus = 6,
    DuodenalBulb = 7,
    DescendingDuodenum = 8,
    AnastomoticStoma = 9,
}

impl LesionLocation {
    pub const ALL: [LesionLocation; 9] = [
        LesionLocation::Cardia,
        LesionLocation::GastricBody,
        LesionLocation::GastricFundus,
        LesionLocation::GastricAngle,
        LesionLocation::GastricAntrum,
        LesionLocation::Pylorus,
        LesionLocation::DuodenalBulb,
        LesionLocation::DescendingDuodenum,
        LesionLocation::AnastomoticStoma,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            LesionLocation::Cardia => "Cardia",
            LesionLocation::GastricBody => "Gastric Body",
            LesionLocation::GastricFundus => "Gastric Fundus",
            LesionLocation::GastricAngle => "Gastric Angle",
            LesionLocation::GastricAntrum => "Gastric Antrum",
            LesionLocation::Pylorus => "Pylorus",
            LesionLocation::DuodenalBulb => "Duodenal Bulb",
            LesionLocation::DescendingDuodenum => "Descending Duodenum",
            LesionLocation::AnastomoticStoma => "Anastomotic Stoma",
        }
    }
}

impl TryFrom<i64> for LesionLocation {
    type Error = RecordError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|l| l.code() == code)
            .ok_or(RecordError::LocationOutOfDomain(code))
    }
}

impl fmt::Display for LesionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code(), self.label())
    }
}

/// Inclusive range a form field must fall in to be clinically plausible
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    pub const fn new(field: &'static str, min: f64, max: f64) -> Self {
        Self { field, min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

pub const METHOD_RANGE: FieldRange = FieldRange::new("Method", 1.0, 5.0);
pub const LOCATION_RANGE: FieldRange = FieldRange::new("Location", 1.0, 9.0);
pub const DESCENDING_RANGE: FieldRange = FieldRange::new("Descending", 0.0, 1.0);
pub const CREATININE_RANGE: FieldRange = FieldRange::new("Creatinine", 0.0, 2000.0);
pub const BUN_RANGE: FieldRange = FieldRange::new("BUN", 0.0, 100.0);
pub const PT_RANGE: FieldRange = FieldRange::new("PT", 0.0, 60.0);
pub const APTT_RANGE: FieldRange = FieldRange::new("APTT", 0.0, 200.0);
pub const ROCKALL_RANGE: FieldRange = FieldRange::new("Rockall", 0.0, 12.0);
pub const AIMS65_RANGE: FieldRange = FieldRange::new("AIMS65", 0.0, 5.0);

/// The nine assessment fields as entered on the form, before coercion.
///
/// Keys accept either snake_case or the model's feature names; a missing
/// key takes the form default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAssessment {
    /// Treatment method code (1 = clip ... 5 = combined therapy)
    #[serde(alias = "Method")]
    pub method: i64,

    /// Lesion location code (1 = cardia ... 9 = anastomotic stoma)
    #[serde(alias = "Location")]
    pub location: i64,

    /// Lesion in descending duodenum (0 = no, 1 = yes)
    #[serde(alias = "Descending")]
    pub descending: i64,

    /// Creatinine, µmol/L
    #[serde(alias = "Creatinine")]
    pub creatinine: f64,

    /// Blood urea nitrogen, mmol/L
    #[serde(alias = "BUN")]
    pub bun: f64,

    /// Prothrombin time, seconds
    #[serde(alias = "PT")]
    pub pt: f64,

    /// Activated partial thromboplastin time, seconds
    #[serde(alias = "APTT")]
    pub aptt: f64,

    /// Rockall score (0-12)
    #[serde(alias = "Rockall")]
    pub rockall: i64,

    /// AIMS65 score (0-5)
    #[serde(alias = "AIMS65")]
    pub aims65: i64,
}

impl RawAssessment {
    /// List every field that falls outside its clinically plausible range.
    ///
    /// This is the input-collection check; record construction only enforces
    /// the categorical domains and numeric well-formedness.
    pub fn plausibility_violations(&self) -> Vec<String> {
        let checks = [
            (METHOD_RANGE, self.method as f64),
            (LOCATION_RANGE, self.location as f64),
            (DESCENDING_RANGE, self.descending as f64),
            (CREATININE_RANGE, self.creatinine),
            (BUN_RANGE, self.bun),
            (PT_RANGE, self.pt),
            (APTT_RANGE, self.aptt),
            (ROCKALL_RANGE, self.rockall as f64),
            (AIMS65_RANGE, self.aims65 as f64),
        ];

        checks
            .iter()
            .filter(|(range, value)| !range.contains(*value))
            .map(|(range, value)| {
                format!(
                    "{} = {} is outside [{}, {}]",
                    range.field, value, range.min, range.max
                )
            })
            .collect()
    }
}

impl Default for RawAssessment {
    fn default() -> Self {
        Self {
            method: 1,
            location: 1,
            descending: 0,
            creatinine: 80.0,
            bun: 10.0,
            pt: 13.0,
            aptt: 30.0,
            rockall: 9,
            aims65: 3,
        }
    }
}

/// Typed, immutable patient record handed to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatientRecord {
    pub method: TreatmentMethod,
    pub location: LesionLocation,
    pub descending: bool,
    pub creatinine: f64,
    pub bun: f64,
    pub pt: f64,
    pub aptt: f64,
    pub rockall: u8,
    pub aims65: u8,
}

impl PatientRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: TreatmentMethod,
        location: LesionLocation,
        descending: bool,
        creatinine: f64,
        bun: f64,
        pt: f64,
        aptt: f64,
        rockall: u8,
        aims65: u8,
    ) -> Result<Self, RecordError> {
        Ok(Self {
            method,
            location,
            descending,
            creatinine: finite("Creatinine", creatinine)?,
            bun: finite("BUN", bun)?,
            pt: finite("PT", pt)?,
            aptt: finite("APTT", aptt)?,
            rockall,
            aims65,
        })
    }
}

impl TryFrom<&RawAssessment> for PatientRecord {
    type Error = RecordError;

    fn try_from(raw: &RawAssessment) -> Result<Self, Self::Error> {
        let descending = match raw.descending {
            0 => false,
            1 => true,
            other => return Err(RecordError::InvalidFlag(other)),
        };

        Self::new(
            TreatmentMethod::try_from(raw.method)?,
            LesionLocation::try_from(raw.location)?,
            descending,
            raw.creatinine,
            raw.bun,
            raw.pt,
            raw.aptt,
            score("Rockall", raw.rockall)?,
            score("AIMS65", raw.aims65)?,
        )
    }
}

fn finite(field: &'static str, value: f64) -> Result<f64, RecordError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RecordError::NonFinite { field, value })
    }
}

fn score(field: &'static str, value: i64) -> Result<u8, RecordError> {
    u8::try_from(value).map_err(|_| RecordError::ScoreOutOfRange { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_assessment_converts() {
        let record = PatientRecord::try_from(&RawAssessment::default()).unwrap();

        assert_eq!(record.method, TreatmentMethod::Clip);
        assert_eq!(record.location, LesionLocation::Cardia);
        assert!(!record.descending);
        assert_eq!(record.rockall, 9);
        assert_eq!(record.aims65, 3);
    }

    #[test]
    fn test_out_of_domain_codes_rejected() {
        let raw = RawAssessment {
            method: 6,
            ..RawAssessment::default()
        };
        assert_eq!(
            PatientRecord::try_from(&raw),
            Err(RecordError::MethodOutOfDomain(6))
        );

        let raw = RawAssessment {
            location: 0,
            ..RawAssessment::default()
        };
        assert_eq!(
            PatientRecord::try_from(&raw),
            Err(RecordError::LocationOutOfDomain(0))
        );

        let raw = RawAssessment {
            descending: 2,
            ..RawAssessment::default()
        };
        assert_eq!(PatientRecord::try_from(&raw), Err(RecordError::InvalidFlag(2)));
    }

    #[test]
    fn test_non_finite_lab_value_rejected() {
        let raw = RawAssessment {
            bun: f64::NAN,
            ..RawAssessment::default()
        };
        assert!(matches!(
            PatientRecord::try_from(&raw),
            Err(RecordError::NonFinite { field: "BUN", .. })
        ));
    }

    #[test]
    fn test_negative_score_rejected() {
        let raw = RawAssessment {
            aims65: -1,
            ..RawAssessment::default()
        };
        assert_eq!(
            PatientRecord::try_from(&raw),
            Err(RecordError::ScoreOutOfRange {
                field: "AIMS65",
                value: -1
            })
        );
    }

    #[test]
    fn test_plausibility_violations() {
        assert!(RawAssessment::default().plausibility_violations().is_empty());

        let raw = RawAssessment {
            creatinine: 2500.0,
            rockall: 13,
            ..RawAssessment::default()
        };
        let violations = raw.plausibility_violations();
        assert_eq!(violations.len(), 2);
        assert!(violations[0].starts_with("Creatinine"));
        assert!(violations[1].starts_with("Rockall"));
    }

    #[test]
    fn test_deserialize_feature_name_keys() {
        let json = r#"{
            "Method": 4, "Location": 7, "Descending": 1,
            "Creatinine": 95.5, "BUN": 12.3, "PT": 14.1, "APTT": 33.0,
            "Rockall": 6, "AIMS65": 2
        }"#;
        let raw: RawAssessment = serde_json::from_str(json).unwrap();

        assert_eq!(raw.method, 4);
        assert_eq!(raw.bun, 12.3);
        assert_eq!(raw.aims65, 2);

        let record = PatientRecord::try_from(&raw).unwrap();
        assert_eq!(record.method, TreatmentMethod::Injection);
        assert_eq!(record.location, LesionLocation::DuodenalBulb);
        assert!(record.descending);
    }

    #[test]
    fn test_missing_keys_take_form_defaults() {
        let raw: RawAssessment = serde_json::from_str(r#"{"BUN": 20.0}"#).unwrap();

        assert_eq!(
            raw,
            RawAssessment {
                bun: 20.0,
                ..RawAssessment::default()
            }
        );

        let empty: RawAssessment = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, RawAssessment::default());
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(TreatmentMethod::CombinedTherapy.to_string(), "5 - Combined Therapy");
        assert_eq!(LesionLocation::AnastomoticStoma.to_string(), "9 - Anastomotic Stoma");
        assert_eq!(LesionLocation::try_from(8), Ok(LesionLocation::DescendingDuodenum));
    }
}
