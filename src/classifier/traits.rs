// Classifier trait and the values that cross its boundary.
//
// The Decision Combiner and the training loop only see `TextClassifier`, so a
// fake classifier can stand in for the statistical one in tests.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Binary class predicted by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Benign,
    Suspicious,
}

impl Label {
    pub fn as_i64(self) -> i64 {
        match self {
            Label::Benign => 0,
            Label::Suspicious => 1,
        }
    }

    /// Only 0 and 1 are labels; anything else is rejected.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Label::Benign),
            1 => Some(Label::Suspicious),
            _ => None,
        }
    }
}

/// A prediction with confidence always in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Label,
    /// Estimated probability of `label`
    pub confidence: f64,
}

impl Prediction {
    /// Clamps `confidence` into [0, 1]; NaN becomes 0.
    pub fn new(label: Label, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { label, confidence }
    }

    /// What an untrained classifier answers: benign with zero confidence.
    pub fn untrained() -> Self {
        Self::new(Label::Benign, 0.0)
    }

    /// Build from the positive-class probability.
    pub fn from_probability(p_suspicious: f64) -> Self {
        if p_suspicious >= 0.5 {
            Self::new(Label::Suspicious, p_suspicious)
        } else {
            Self::new(Label::Benign, 1.0 - p_suspicious)
        }
    }
}

/// Outcome of a training call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainingReport {
    /// Model refit from scratch. `accuracy` is holdout accuracy when a
    /// holdout split was made.
    Full {
        accuracy: Option<f64>,
        train_size: usize,
        test_size: usize,
    },
    /// One incremental pass over new samples.
    Incremental { new_samples: usize, dropped: usize },
    /// Nothing was learned; the model is unchanged.
    Rejected { reason: String },
}

impl TrainingReport {
    pub fn is_rejected(&self) -> bool {
        matches!(self, TrainingReport::Rejected { .. })
    }
}

/// Structured classifier failures.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("need at least {min} training examples, got {got}")]
    InsufficientData { got: usize, min: usize },

    #[error("{texts} texts but {labels} labels")]
    LengthMismatch { texts: usize, labels: usize },

    #[error("label {label} at position {index} is not 0 or 1")]
    InvalidLabel { index: usize, label: i64 },

    #[error("no n-gram survives the document-frequency cut; corpus too small or uniform")]
    EmptyVocabulary,

    #[error("model storage failed: {0:#}")]
    Storage(anyhow::Error),

    #[error("stored model is unreadable: {0}")]
    Corrupt(String),

    #[error("classifier worker failed: {0}")]
    Worker(String),
}

/// A text classifier usable by the Decision Combiner and the training loop.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn is_trained(&self) -> bool;

    /// Never fails for an untrained model: returns `Prediction::untrained()`.
    async fn predict(&self, text: &str) -> Result<Prediction, ClassifierError>;

    /// Update the model with labeled examples; labels outside {0, 1} are dropped.
    async fn incremental_train(
        &self,
        texts: &[String],
        labels: &[i64],
    ) -> Result<TrainingReport, ClassifierError>;
}

/// Classifier that is never trained and refuses training. For wiring the
/// detector up without a model, mostly in tests; a training run against it
/// fails and leaves the examples unprocessed.
pub struct NoopClassifier;

#[async_trait]
impl TextClassifier for NoopClassifier {
    async fn is_trained(&self) -> bool {
        false
    }

    async fn predict(&self, _text: &str) -> Result<Prediction, ClassifierError> {
        Ok(Prediction::untrained())
    }

    async fn incremental_train(
        &self,
        _texts: &[String],
        _labels: &[i64],
    ) -> Result<TrainingReport, ClassifierError> {
        Err(ClassifierError::Worker("no classifier configured".to_string()))
    }
}

/// Best-effort label coercion for loosely typed input (JSON, CSV).
///
/// Accepts integers, integral floats, booleans and numeric strings; returns
/// `None` for anything that isn't 0 or 1 afterwards.
pub fn coerce_label(value: &serde_json::Value) -> Option<i64> {
    use serde_json::Value;
    let n = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    Label::from_i64(n).map(Label::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prediction_clamps() {
        assert_eq!(Prediction::new(Label::Suspicious, 1.5).confidence, 1.0);
        assert_eq!(Prediction::new(Label::Benign, -0.2).confidence, 0.0);
        assert_eq!(Prediction::new(Label::Benign, f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_from_probability_reports_predicted_class() {
        let p = Prediction::from_probability(0.8);
        assert_eq!(p.label, Label::Suspicious);
        assert!((p.confidence - 0.8).abs() < 1e-12);

        let p = Prediction::from_probability(0.1);
        assert_eq!(p.label, Label::Benign);
        assert!((p.confidence - 0.9).abs() < 1e-12);

        assert_eq!(Prediction::from_probability(0.5).label, Label::Suspicious);
    }

    #[test]
    fn test_coerce_label() {
        assert_eq!(coerce_label(&json!(1)), Some(1));
        assert_eq!(coerce_label(&json!(0.0)), Some(0));
        assert_eq!(coerce_label(&json!("1")), Some(1));
        assert_eq!(coerce_label(&json!(true)), Some(1));
        assert_eq!(coerce_label(&json!(2)), None);
        assert_eq!(coerce_label(&json!(0.5)), None);
        assert_eq!(coerce_label(&json!("spam")), None);
        assert_eq!(coerce_label(&json!(null)), None);
    }

    #[tokio::test]
    async fn test_noop_classifier_is_untrained() {
        let c = NoopClassifier;
        assert!(!c.is_trained().await);
        assert_eq!(c.predict("x").await.unwrap(), Prediction::untrained());
        let err = c
            .incremental_train(&["x".to_string()], &[1])
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifierError::Worker(_)));
    }
}
