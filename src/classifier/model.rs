// The learned classifier state and the pure functions that produce it.
//
// Nothing here touches locks, threads or storage. `StatisticalClassifier`
// runs these on a blocking worker and decides when to swap the result in.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::preprocess::preprocess;
use super::sgd::{SgdClassifier, SEED};
use super::traits::{ClassifierError, Label, Prediction, TrainingReport};
use super::vectorizer::TfidfVectorizer;

/// Bumped whenever the serialized layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Fewer examples than this and `train` refuses to run.
pub const MIN_TRAINING_EXAMPLES: usize = 10;

/// At or above this many examples, `train` holds out a test split.
pub const HOLDOUT_MIN_EXAMPLES: usize = 20;

/// Share of examples held out for the accuracy estimate.
pub const HOLDOUT_FRACTION: f64 = 0.2;

/// Vectorizer and classifier fitted together. They only make sense as a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedState {
    pub vectorizer: TfidfVectorizer,
    pub classifier: SgdClassifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierModel {
    pub format_version: u32,
    pub trained_at: Option<DateTime<Utc>>,
    /// Examples the model has learned from, across full and incremental fits
    pub samples_seen: u64,
    pub state: Option<TrainedState>,
}

impl Default for ClassifierModel {
    fn default() -> Self {
        Self::untrained()
    }
}

impl ClassifierModel {
    pub fn untrained() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            trained_at: None,
            samples_seen: 0,
            state: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    pub fn predict(&self, text: &str) -> Prediction {
        match &self.state {
            None => Prediction::untrained(),
            Some(state) => {
                let row = state.vectorizer.transform(&preprocess(text));
                Prediction::from_probability(state.classifier.probability(&row))
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassifierError> {
        serde_json::to_vec(self)
            .map_err(|e| ClassifierError::Corrupt(format!("failed to serialize model: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ClassifierError> {
        let model: Self = serde_json::from_slice(bytes)
            .map_err(|e| ClassifierError::Corrupt(e.to_string()))?;

        if model.format_version != FORMAT_VERSION {
            return Err(ClassifierError::Corrupt(format!(
                "unsupported model format version {} (expected {})",
                model.format_version, FORMAT_VERSION
            )));
        }
        if let Some(state) = &model.state {
            state.vectorizer.validate()?;
            if state.classifier.n_features() != state.vectorizer.n_features() {
                return Err(ClassifierError::Corrupt(
                    "classifier width does not match vocabulary".to_string(),
                ));
            }
        }
        Ok(model)
    }
}

fn check_lengths(texts: &[String], labels: &[i64]) -> Result<(), ClassifierError> {
    if texts.len() != labels.len() {
        return Err(ClassifierError::LengthMismatch {
            texts: texts.len(),
            labels: labels.len(),
        });
    }
    Ok(())
}

/// Split indices into (train, test) with a fixed seed. Test gets
/// `ceil(HOLDOUT_FRACTION * n)` examples.
pub fn holdout_split(n: usize) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(SEED));
    let test_size = (HOLDOUT_FRACTION * n as f64).ceil() as usize;
    let train = idx.split_off(test_size);
    (train, idx)
}

fn fit_state(texts: &[String], labels: &[i64]) -> Result<TrainedState, ClassifierError> {
    let vectorizer = TfidfVectorizer::fit(texts)?;
    let rows = vectorizer.transform_all(texts);
    let mut classifier = SgdClassifier::new(vectorizer.n_features());
    classifier.fit(&rows, labels);
    Ok(TrainedState {
        vectorizer,
        classifier,
    })
}

/// Fit a brand-new model on labeled examples.
///
/// With at least `HOLDOUT_MIN_EXAMPLES` examples, fits on a seeded 80% split
/// and reports accuracy on the remaining 20%; otherwise fits on everything.
pub fn fit_full(
    texts: &[String],
    labels: &[i64],
) -> Result<(ClassifierModel, TrainingReport), ClassifierError> {
    check_lengths(texts, labels)?;
    if texts.len() < MIN_TRAINING_EXAMPLES {
        return Err(ClassifierError::InsufficientData {
            got: texts.len(),
            min: MIN_TRAINING_EXAMPLES,
        });
    }
    if let Some((index, &label)) = labels
        .iter()
        .enumerate()
        .find(|(_, l)| Label::from_i64(**l).is_none())
    {
        return Err(ClassifierError::InvalidLabel { index, label });
    }

    let processed: Vec<String> = texts.iter().map(|t| preprocess(t)).collect();

    let (state, report) = if processed.len() >= HOLDOUT_MIN_EXAMPLES {
        let (train_idx, test_idx) = holdout_split(processed.len());
        let pick = |idx: &[usize]| -> (Vec<String>, Vec<i64>) {
            idx.iter()
                .map(|&i| (processed[i].clone(), labels[i]))
                .unzip()
        };
        let (train_x, train_y) = pick(&train_idx);
        let (test_x, test_y) = pick(&test_idx);

        let state = fit_state(&train_x, &train_y)?;
        let correct = test_x
            .iter()
            .zip(&test_y)
            .filter(|(x, y)| {
                let row = state.vectorizer.transform(x);
                Prediction::from_probability(state.classifier.probability(&row))
                    .label
                    .as_i64()
                    == **y
            })
            .count();
        let accuracy = correct as f64 / test_x.len() as f64;
        info!(
            accuracy,
            train_size = train_x.len(),
            test_size = test_x.len(),
            "Classifier trained with holdout"
        );
        (
            state,
            TrainingReport::Full {
                accuracy: Some(accuracy),
                train_size: train_x.len(),
                test_size: test_x.len(),
            },
        )
    } else {
        let state = fit_state(&processed, labels)?;
        info!(train_size = processed.len(), "Classifier trained on all examples");
        (
            state,
            TrainingReport::Full {
                accuracy: None,
                train_size: processed.len(),
                test_size: 0,
            },
        )
    };

    if !state.classifier.is_finite() {
        return Err(ClassifierError::Corrupt(
            "training diverged to non-finite weights".to_string(),
        ));
    }

    let model = ClassifierModel {
        format_version: FORMAT_VERSION,
        trained_at: Some(Utc::now()),
        samples_seen: texts.len() as u64,
        state: Some(state),
    };
    Ok((model, report))
}

/// Keep only examples labeled 0 or 1, warning about the rest.
pub fn valid_examples(texts: &[String], labels: &[i64]) -> (Vec<String>, Vec<i64>, usize) {
    let mut kept_texts = Vec::with_capacity(texts.len());
    let mut kept_labels = Vec::with_capacity(labels.len());
    let mut dropped = 0;
    for (text, &label) in texts.iter().zip(labels) {
        if Label::from_i64(label).is_some() {
            kept_texts.push(text.clone());
            kept_labels.push(label);
        } else {
            warn!(label, "Dropping training example with label outside {{0, 1}}");
            dropped += 1;
        }
    }
    (kept_texts, kept_labels, dropped)
}

/// Update a copy of `base` with one pass over new examples.
///
/// An untrained base falls back to `fit_full`. If every label is invalid the
/// result is `Rejected` and no model is produced.
pub fn fit_incremental(
    base: &ClassifierModel,
    texts: &[String],
    labels: &[i64],
) -> Result<(Option<ClassifierModel>, TrainingReport), ClassifierError> {
    check_lengths(texts, labels)?;
    let (texts, labels, dropped) = valid_examples(texts, labels);

    if texts.is_empty() {
        warn!(dropped, "No valid examples for incremental training");
        return Ok((
            None,
            TrainingReport::Rejected {
                reason: "no valid examples".to_string(),
            },
        ));
    }

    let Some(state) = &base.state else {
        let (model, report) = fit_full(&texts, &labels)?;
        return Ok((Some(model), report));
    };

    let processed: Vec<String> = texts.iter().map(|t| preprocess(t)).collect();
    let rows = state.vectorizer.transform_all(&processed);
    let mut classifier = state.classifier.clone();
    classifier.partial_fit(&rows, &labels);

    if !classifier.is_finite() {
        return Err(ClassifierError::Corrupt(
            "incremental update diverged to non-finite weights".to_string(),
        ));
    }

    info!(new_samples = texts.len(), dropped, "Classifier updated incrementally");
    let model = ClassifierModel {
        format_version: FORMAT_VERSION,
        trained_at: Some(Utc::now()),
        samples_seen: base.samples_seen + texts.len() as u64,
        state: Some(TrainedState {
            vectorizer: state.vectorizer.clone(),
            classifier,
        }),
    };
    Ok((
        Some(model),
        TrainingReport::Incremental {
            new_samples: texts.len(),
            dropped,
        },
    ))
}
