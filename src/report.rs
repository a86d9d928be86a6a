//! Rendering of assessment reports for the terminal.

use crate::types::assessment::RiskAssessment;
use crate::types::patient::{LesionLocation, TreatmentMethod};
use anyhow::Result;

const BAR_WIDTH: usize = 20;

const DISCLAIMER: &str = "This model was trained on retrospective data to predict membership \
in the DN (high-risk) group. For research and clinical decision support only. \
Not a substitute for professional medical judgment.";

/// Render the assessment as a plain-text report
pub fn render_text(assessment: &RiskAssessment) -> String {
    let inputs = &assessment.inputs;
    let method = TreatmentMethod::try_from(inputs.method).ok().map(|m| m.label());
    let location = LesionLocation::try_from(inputs.location).ok().map(|l| l.label());

    let mut lines = vec![
        "Rebleeding Risk Prediction for Peptic Ulcer Bleeding".to_string(),
        "=".repeat(52),
    ];

    if let Some(warning) = &assessment.warning {
        lines.push(format!("WARNING: {}", warning));
    }

    lines.extend([
        format!(
            "Risk Level:               {} ({})",
            assessment.risk_label, assessment.color
        ),
        format!(
            "Rebleeding Probability:   {:.1}%",
            assessment.probability_percent
        ),
        format!("                          {}", progress_bar(assessment.probability)),
        String::new(),
        "Clinical Recommendation:".to_string(),
        format!("  {}", assessment.recommendation),
        String::new(),
        "Patient Parameters:".to_string(),
        format!("  Treatment Method:       {}", describe_code(inputs.method, method)),
        format!("  Lesion Location:        {}", describe_code(inputs.location, location)),
        format!(
            "  Descending Duodenum:    {}",
            if inputs.descending == 1 { "Yes" } else { "No" }
        ),
        format!("  Creatinine:             {:.1} µmol/L", inputs.creatinine),
        format!("  BUN:                    {:.1} mmol/L", inputs.bun),
        format!("  PT:                     {:.1} s", inputs.pt),
        format!("  APTT:                   {:.1} s", inputs.aptt),
        format!("  Rockall Score:          {}", inputs.rockall),
        format!("  AIMS65 Score:           {}", inputs.aims65),
        String::new(),
        format!(
            "Model: {}  Assessment: {}",
            assessment.model, assessment.assessment_id
        ),
        format!("Note: {}", DISCLAIMER),
    ]);

    lines.join("\n")
}

/// Render the assessment as pretty-printed JSON
pub fn render_json(assessment: &RiskAssessment) -> Result<String> {
    Ok(serde_json::to_string_pretty(assessment)?)
}

/// Fixed-width bar, one cell per 5%
pub fn progress_bar(probability: f64) -> String {
    let filled = ((probability.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn describe_code(code: i64, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{} - {}", code, label),
        None => code.to_string(),
    }
}
