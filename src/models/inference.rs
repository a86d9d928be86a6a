//! Rebleeding risk inference engine

use crate::config::AppConfig;
use crate::error::ModelError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::classifier::{Classifier, OnnxClassifier};
use crate::types::assessment::RiskAssessment;
use crate::types::patient::{PatientRecord, RawAssessment};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Probability substituted when coercion or inference fails
pub const FALLBACK_PROBABILITY: f64 = 0.5;

/// How long runtime shutdown waits for blocking inference workers.
///
/// A worker abandoned by [`InferenceEngine::predict_bounded`] keeps running
/// until the model returns; the runtime must be shut down with this grace
/// instead of dropped, or the process waits for that worker.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Result of one fail-soft prediction
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    /// Model produced a probability (already clamped to [0, 1])
    Scored(f64),
    /// Prediction failed; the neutral probability stands in
    Fallback { reason: String },
}

impl PredictionOutcome {
    pub fn probability(&self) -> f64 {
        match self {
            PredictionOutcome::Scored(probability) => *probability,
            PredictionOutcome::Fallback { .. } => FALLBACK_PROBABILITY,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PredictionOutcome::Fallback { .. })
    }

    /// Convert the outcome to an assessment report
    pub fn to_assessment(&self, inputs: RawAssessment, model: &str) -> RiskAssessment {
        let assessment = RiskAssessment::new(inputs, self.probability(), model);
        match self {
            PredictionOutcome::Scored(_) => assessment,
            PredictionOutcome::Fallback { reason } => {
                assessment.with_warning(format!("Error during prediction: {reason}"))
            }
        }
    }
}

/// Single-row inference engine around a shared classifier handle
pub struct InferenceEngine {
    classifier: Arc<dyn Classifier>,
    extractor: FeatureExtractor,
    /// Bound on one inference call, if any
    timeout: Option<Duration>,
}

impl InferenceEngine {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            extractor: FeatureExtractor::new(),
            timeout: None,
        }
    }

    /// Load the configured model and build an engine around it.
    ///
    /// Load errors are returned as-is; callers treat them as fatal.
    pub fn from_config(config: &AppConfig) -> Result<Self, ModelError> {
        let classifier = OnnxClassifier::load(
            &config.model.path,
            &config.model.name,
            config.model.onnx_threads,
        )?;

        let engine = Self::new(Arc::new(classifier)).with_timeout(config.inference.timeout());

        info!(
            model = %engine.model_name(),
            features = engine.extractor.feature_count(),
            feature_names = ?engine.extractor.feature_names(),
            categorical = ?engine.extractor.categorical_features(),
            timeout = ?engine.timeout,
            "Inference engine initialized"
        );

        Ok(engine)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    /// Score a typed record; the probability is clamped to [0, 1]
    pub fn try_predict(&self, record: &PatientRecord) -> Result<f64, ModelError> {
        let row = self.extractor.extract(record);
        let raw = self.classifier.predict_proba(&row)?;
        let probability = clamp_probability(raw)?;

        debug!(
            model = %self.model_name(),
            raw_probability = raw,
            probability = probability,
            "Inference complete"
        );

        Ok(probability)
    }

    /// Coerce raw form fields, then score them
    pub fn try_predict_raw(&self, inputs: &RawAssessment) -> Result<f64, ModelError> {
        let record = PatientRecord::try_from(inputs)?;
        self.try_predict(&record)
    }

    /// Fail-soft prediction: any error becomes the fallback probability
    pub fn predict(&self, inputs: &RawAssessment) -> PredictionOutcome {
        settle(self.try_predict_raw(inputs))
    }

    /// Fail-soft prediction bounded by the configured timeout.
    ///
    /// Without a timeout this is the same as [`InferenceEngine::predict`].
    /// On expiry the blocking worker is left to finish on its own and still
    /// holds the model session until it does, so a later call on the same
    /// engine is bounded by the same timeout rather than by that worker.
    pub async fn predict_bounded(self: &Arc<Self>, inputs: RawAssessment) -> PredictionOutcome {
        let Some(limit) = self.timeout else {
            return self.predict(&inputs);
        };

        let engine = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || engine.try_predict_raw(&inputs));

        let result = match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ModelError::Task(join_error.to_string())),
            Err(_) => Err(ModelError::Timeout(limit)),
        };

        settle(result)
    }
}

fn settle(result: Result<f64, ModelError>) -> PredictionOutcome {
    match result {
        Ok(probability) => PredictionOutcome::Scored(probability),
        Err(e) => {
            warn!(
                error = %e,
                fallback = FALLBACK_PROBABILITY,
                "Prediction failed, using fallback probability"
            );
            PredictionOutcome::Fallback {
                reason: e.to_string(),
            }
        }
    }
}

/// Clamp a model probability into [0, 1]; NaN and infinities are errors
pub fn clamp_probability(probability: f64) -> Result<f64, ModelError> {
    if probability.is_finite() {
        Ok(probability.clamp(0.0, 1.0))
    } else {
        Err(ModelError::NonFiniteProbability(probability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::{FeatureRow, FeatureValue};
    use crate::types::assessment::RiskBand;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed score and counts calls
    struct FixedClassifier {
        score: f64,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(score: f64) -> Self {
            Self {
                score,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict_proba(&self, _row: &FeatureRow) -> Result<f64, ModelError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.score)
        }
    }

    /// Deterministic function of the row, like a trained model
    struct LinearClassifier;

    impl Classifier for LinearClassifier {
        fn name(&self) -> &str {
            "linear"
        }

        fn predict_proba(&self, row: &FeatureRow) -> Result<f64, ModelError> {
            let rockall = match row.get("Rockall") {
                Some(FeatureValue::Score(s)) => *s as f64,
                _ => return Err(ModelError::MissingInput("Rockall".to_string())),
            };
            Ok(rockall / 12.0)
        }
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        fn predict_proba(&self, _row: &FeatureRow) -> Result<f64, ModelError> {
            Err(ModelError::NoProbability)
        }
    }

    /// Holds a session lock for the whole call, like the ONNX classifier
    struct SlowClassifier {
        delay: Duration,
        session: std::sync::Mutex<()>,
    }

    impl SlowClassifier {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                session: std::sync::Mutex::new(()),
            }
        }
    }

    impl Classifier for SlowClassifier {
        fn name(&self) -> &str {
            "slow"
        }

        fn predict_proba(&self, _row: &FeatureRow) -> Result<f64, ModelError> {
            let _session = self.session.lock().map_err(|_| ModelError::Poisoned)?;
            std::thread::sleep(self.delay);
            Ok(0.9)
        }
    }

    fn engine(classifier: impl Classifier + 'static) -> InferenceEngine {
        InferenceEngine::new(Arc::new(classifier))
    }

    #[test]
    fn test_probability_is_clamped() {
        let inputs = RawAssessment::default();

        assert_eq!(engine(FixedClassifier::new(1.3)).predict(&inputs), PredictionOutcome::Scored(1.0));
        assert_eq!(engine(FixedClassifier::new(-0.2)).predict(&inputs), PredictionOutcome::Scored(0.0));
        assert_eq!(engine(FixedClassifier::new(0.42)).predict(&inputs), PredictionOutcome::Scored(0.42));
    }

    #[test]
    fn test_non_finite_probability_falls_back() {
        let outcome = engine(FixedClassifier::new(f64::NAN)).predict(&RawAssessment::default());

        assert!(outcome.is_fallback());
        assert_eq!(outcome.probability(), FALLBACK_PROBABILITY);
    }

    #[test]
    fn test_inference_error_returns_exactly_fallback() {
        let outcome = engine(FailingClassifier).predict(&RawAssessment::default());

        assert_eq!(outcome.probability(), 0.5);
        match outcome {
            PredictionOutcome::Fallback { reason } => {
                assert!(reason.contains("could not extract"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_path_propagates_error() {
        let err = engine(FailingClassifier)
            .try_predict_raw(&RawAssessment::default())
            .unwrap_err();
        assert!(matches!(err, ModelError::NoProbability));
    }

    #[test]
    fn test_coercion_failure_falls_back_without_calling_model() {
        let classifier = Arc::new(FixedClassifier::new(0.9));
        let engine = InferenceEngine::new(classifier.clone());

        let inputs = RawAssessment {
            method: 6,
            ..RawAssessment::default()
        };
        let outcome = engine.predict(&inputs);

        assert_eq!(outcome.probability(), FALLBACK_PROBABILITY);
        assert_eq!(classifier.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_repeated_prediction_is_deterministic() {
        let engine = engine(LinearClassifier);
        let inputs = RawAssessment {
            rockall: 8,
            ..RawAssessment::default()
        };

        let first = engine.predict(&inputs).probability();
        for _ in 0..10 {
            assert_eq!(engine.predict(&inputs).probability(), first);
        }
        assert_relative_eq!(first, 8.0 / 12.0);
    }

    #[test]
    fn test_outcome_to_assessment() {
        let scored = PredictionOutcome::Scored(0.81);
        let assessment = scored.to_assessment(RawAssessment::default(), "catboost");
        assert_eq!(assessment.risk_band, RiskBand::High);
        assert!(assessment.warning.is_none());

        let fallback = PredictionOutcome::Fallback {
            reason: "boom".to_string(),
        };
        let assessment = fallback.to_assessment(RawAssessment::default(), "catboost");
        assert_eq!(assessment.probability, 0.5);
        assert_eq!(assessment.risk_band, RiskBand::Moderate);
        assert_eq!(
            assessment.warning.as_deref(),
            Some("Error during prediction: boom")
        );
    }

    #[tokio::test]
    async fn test_bounded_prediction_without_timeout() {
        let engine = Arc::new(engine(FixedClassifier::new(0.3)));
        let outcome = engine.predict_bounded(RawAssessment::default()).await;
        assert_eq!(outcome, PredictionOutcome::Scored(0.3));
    }

    #[tokio::test]
    async fn test_bounded_prediction_within_limit() {
        let engine = Arc::new(
            engine(FixedClassifier::new(0.75)).with_timeout(Some(Duration::from_secs(5))),
        );
        let outcome = engine.predict_bounded(RawAssessment::default()).await;
        assert_eq!(outcome, PredictionOutcome::Scored(0.75));
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let engine = Arc::new(
            engine(SlowClassifier::new(Duration::from_millis(300)))
                .with_timeout(Some(Duration::from_millis(20))),
        );

        let outcome = engine.predict_bounded(RawAssessment::default()).await;

        assert!(outcome.is_fallback());
        assert_eq!(outcome.probability(), FALLBACK_PROBABILITY);
    }

    #[test]
    fn test_runtime_shutdown_does_not_wait_for_timed_out_worker() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let engine = Arc::new(
            engine(SlowClassifier::new(Duration::from_secs(3)))
                .with_timeout(Some(Duration::from_millis(20))),
        );

        let outcome = runtime.block_on(engine.predict_bounded(RawAssessment::default()));
        assert!(outcome.is_fallback());

        let started = std::time::Instant::now();
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_second_call_after_timeout_is_still_bounded() {
        let engine = Arc::new(
            engine(SlowClassifier::new(Duration::from_millis(500)))
                .with_timeout(Some(Duration::from_millis(20))),
        );

        assert!(engine.predict_bounded(RawAssessment::default()).await.is_fallback());

        let started = std::time::Instant::now();
        assert!(engine.predict_bounded(RawAssessment::default()).await.is_fallback());
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_clamp_probability() {
        assert_eq!(clamp_probability(0.5).unwrap(), 0.5);
        assert_eq!(clamp_probability(1.0000001).unwrap(), 1.0);
        assert!(clamp_probability(f64::INFINITY).is_err());
    }
}
