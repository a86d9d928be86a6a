//! Rebleeding Risk - Main Entry Point
//!
//! Collects the nine assessment fields, loads the classifier once, runs a
//! single prediction and prints the risk report.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rebleed_risk::{
    config::{AppConfig, LoggingConfig, OutputFormat},
    models::inference::{InferenceEngine, SHUTDOWN_GRACE},
    report, RawAssessment,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Rebleeding risk prediction for peptic ulcer bleeding
#[derive(Parser, Debug)]
#[command(name = "rebleed-risk", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config/config.toml")]
    config: PathBuf,

    /// Model artifact (overrides model.path)
    #[arg(long)]
    model: Option<PathBuf>,

    /// JSON file with the nine assessment fields (takes precedence over field flags)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Treatment method: 1 Clip, 2 Electrocoagulation, 3 Spray, 4 Injection, 5 Combined Therapy
    #[arg(long, default_value_t = 1)]
    method: i64,

    /// Lesion location: 1 Cardia, 2 Gastric Body, 3 Gastric Fundus, 4 Gastric Angle,
    /// 5 Gastric Antrum, 6 Pylorus, 7 Duodenal Bulb, 8 Descending Duodenum, 9 Anastomotic Stoma
    #[arg(long, default_value_t = 1)]
    location: i64,

    /// Lesion in descending duodenum (0 = no, 1 = yes)
    #[arg(long, default_value_t = 0)]
    descending: i64,

    /// Creatinine (µmol/L)
    #[arg(long, default_value_t = 80.0)]
    creatinine: f64,

    /// Blood urea nitrogen (mmol/L)
    #[arg(long, default_value_t = 10.0)]
    bun: f64,

    /// Prothrombin time (seconds)
    #[arg(long, default_value_t = 13.0)]
    pt: f64,

    /// Activated partial thromboplastin time (seconds)
    #[arg(long, default_value_t = 30.0)]
    aptt: f64,

    /// Rockall score (0-12)
    #[arg(long, default_value_t = 9)]
    rockall: i64,

    /// AIMS65 score (0-5)
    #[arg(long, default_value_t = 3)]
    aims65: i64,

    /// Report format (defaults to output.format from the configuration)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

impl Cli {
    fn assessment(&self) -> Result<RawAssessment> {
        match &self.input {
            Some(path) => read_assessment(path),
            None => Ok(RawAssessment {
                method: self.method,
                location: self.location,
                descending: self.descending,
                creatinine: self.creatinine,
                bun: self.bun,
                pt: self.pt,
                aptt: self.aptt,
                rockall: self.rockall,
                aims65: self.aims65,
            }),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(run(cli));

    // A timed-out inference worker must not keep the process alive
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    result
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_from_path(&cli.config)?;
    if let Some(model) = &cli.model {
        config.model.path = model.display().to_string();
    }

    init_logging(&config.logging)?;
    info!(config = %cli.config.display(), model = %config.model.path, "Starting rebleeding risk assessment");

    let inputs = cli.assessment()?;

    let violations = inputs.plausibility_violations();
    if !violations.is_empty() {
        for violation in &violations {
            error!(violation = %violation, "Implausible input");
        }
        bail!("Invalid patient parameters: {}", violations.join("; "));
    }

    // Load failure is fatal: nothing is scored without a model
    let engine = match InferenceEngine::from_config(&config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(error = %e, path = %config.model.path, "Model loading failed");
            return Err(e).with_context(|| {
                format!(
                    "Model loading failed. Please check that '{}' exists and is a valid ONNX model",
                    config.model.path
                )
            });
        }
    };

    let outcome = engine.predict_bounded(inputs.clone()).await;
    let assessment = outcome.to_assessment(inputs, engine.model_name());

    info!(
        assessment_id = %assessment.assessment_id,
        probability = assessment.probability,
        risk_band = ?assessment.risk_band,
        fallback = outcome.is_fallback(),
        "Assessment complete"
    );

    let rendered = match cli.format.unwrap_or(config.output.format) {
        OutputFormat::Text => report::render_text(&assessment),
        OutputFormat::Json => report::render_json(&assessment)?,
    };
    println!("{}", rendered);

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("rebleed_risk={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

fn read_assessment(path: &Path) -> Result<RawAssessment> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse patient parameters from {}", path.display()))
}
