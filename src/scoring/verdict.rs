// Decision combiner — rules first, then a confidence-gated classifier.
//
// Exclusions are terminal and benign. Any rule hit is suspicious and reports
// no confidence. Only when no rule fired does the classifier get a say, and
// then only if it is trained and at least CONFIDENCE_THRESHOLD sure.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::classifier::{Label, TextClassifier};
use crate::message::AuthorInfo;
use crate::rules::RuleEngine;

/// Minimum classifier confidence for a suspicious verdict without rule evidence.
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Which part of the detector decided a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    EmptyText,
    Exclusion,
    Rule,
    Classifier,
    /// No rule fired and the classifier was untrained or failed
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub suspicious: bool,
    /// Classifier confidence; `None` whenever the classifier did not run
    pub confidence: Option<f64>,
    pub source: VerdictSource,
    /// Rule reason (exclusion or match), when a rule decided
    pub reason: Option<String>,
}

impl Verdict {
    fn benign(source: VerdictSource, reason: Option<String>) -> Self {
        Self {
            suspicious: false,
            confidence: None,
            source,
            reason,
        }
    }
}

/// Rule engine plus classifier, combined into one decision.
pub struct Detector {
    rules: RuleEngine,
    classifier: Arc<dyn TextClassifier>,
}

impl Detector {
    pub fn new(rules: RuleEngine, classifier: Arc<dyn TextClassifier>) -> Self {
        Self { rules, classifier }
    }

    /// Decide whether `text` is suspicious. Never fails: classifier errors are
    /// logged and the verdict falls back to the rule result.
    pub async fn decide(&self, text: &str, author: &AuthorInfo) -> Verdict {
        if text.trim().is_empty() {
            return Verdict::benign(VerdictSource::EmptyText, None);
        }

        // Rule evaluation is cheap and synchronous
        let result = self.rules.evaluate(text, author);
        if result.is_excluded() {
            return Verdict::benign(VerdictSource::Exclusion, result.reason);
        }
        if result.matched {
            debug!(reason = ?result.reason, user_id = author.id, "Rule matched");
            return Verdict {
                suspicious: true,
                confidence: None,
                source: VerdictSource::Rule,
                reason: result.reason,
            };
        }

        if !self.classifier.is_trained().await {
            return Verdict::benign(VerdictSource::Default, None);
        }

        match self.classifier.predict(text).await {
            Ok(prediction) => Verdict {
                suspicious: prediction.label == Label::Suspicious
                    && prediction.confidence >= CONFIDENCE_THRESHOLD,
                confidence: Some(prediction.confidence),
                source: VerdictSource::Classifier,
                reason: None,
            },
            Err(e) => {
                warn!(error = %e, user_id = author.id, "Classifier failed; using rule result only");
                Verdict::benign(VerdictSource::Default, None)
            }
        }
    }
}
