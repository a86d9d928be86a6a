//! Sample Patient Generator
//!
//! Prints one random, clinically plausible patient form as JSON for
//! trying out the `rebleed-risk --input` path.

use rand::Rng;
use rebleed_risk::RawAssessment;
use tracing::info;

const DEFAULT_HIGH_RISK_RATE: f64 = 0.3;

/// Patient form generator for testing
struct PatientGenerator {
    rng: rand::rngs::ThreadRng,
}

impl PatientGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate a patient with routine labs and low clinical scores
    fn generate_routine(&mut self) -> RawAssessment {
        let location = self.rng.gen_range(1..=9);

        RawAssessment {
            method: self.rng.gen_range(1..=5),
            location,
            descending: i64::from(location == 8),
            creatinine: round1(self.rng.gen_range(55.0..110.0)),
            bun: round1(self.rng.gen_range(3.0..8.0)),
            pt: round1(self.rng.gen_range(11.0..14.0)),
            aptt: round1(self.rng.gen_range(25.0..38.0)),
            rockall: self.rng.gen_range(0..=4),
            aims65: self.rng.gen_range(0..=1),
        }
    }

    /// Generate a patient with deranged labs and high clinical scores
    fn generate_high_risk(&mut self) -> RawAssessment {
        let location = [6, 7, 8][self.rng.gen_range(0..3)];

        RawAssessment {
            method: self.rng.gen_range(4..=5), // Injection or combined therapy
            location,
            descending: i64::from(location == 8),
            creatinine: round1(self.rng.gen_range(150.0..600.0)),
            bun: round1(self.rng.gen_range(15.0..45.0)),
            pt: round1(self.rng.gen_range(16.0..30.0)),
            aptt: round1(self.rng.gen_range(40.0..90.0)),
            rockall: self.rng.gen_range(7..=12),
            aims65: self.rng.gen_range(3..=5),
        }
    }
}

/// High-risk draw probability from the optional second argument.
///
/// Unparseable or non-finite rates use the default; the rest are clamped to [0, 1].
fn parse_rate(arg: Option<&str>) -> f64 {
    arg.and_then(|s| s.parse::<f64>().ok())
        .filter(|rate| rate.is_finite())
        .unwrap_or(DEFAULT_HIGH_RISK_RATE)
        .clamp(0.0, 1.0)
}

/// One decimal place, like the form's number inputs
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_patient=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    // Profile: "routine", "high-risk", or anything else for a random pick
    let args: Vec<String> = std::env::args().collect();
    let profile = args.get(1).map(|s| s.as_str()).unwrap_or("random");
    let high_risk_rate = parse_rate(args.get(2).map(|s| s.as_str()));

    let mut generator = PatientGenerator::new();
    let high_risk = match profile {
        "routine" => false,
        "high-risk" => true,
        _ => generator.rng.gen_bool(high_risk_rate),
    };

    let patient = if high_risk {
        generator.generate_high_risk()
    } else {
        generator.generate_routine()
    };

    debug_assert!(patient.plausibility_violations().is_empty());
    info!(profile = %profile, high_risk = high_risk, "Generated sample patient");

    println!("{}", serde_json::to_string_pretty(&patient)?);

    Ok(())
}
