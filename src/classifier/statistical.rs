// Shared handle to the learned classifier.
//
// One `ClassifierModel` lives behind a read-write lock. Predictions take the
// read side on a blocking worker so many can run at once without stalling the
// async runtime. Writers (train, incremental_train, load, save) first take the
// async writer gate, so only one runs at a time, then build the replacement
// model off-lock, persist it, and swap it in under a short write lock. Readers
// see either the old pair or the new pair, never a mix, and a failed writer
// leaves the old model in place.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::model::{fit_full, fit_incremental, ClassifierModel};
use super::store::ModelStore;
use super::traits::{ClassifierError, Prediction, TextClassifier, TrainingReport};

/// Result of `StatisticalClassifier::load`.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Loaded { samples_seen: u64 },
    /// No blob stored yet; the in-memory model is unchanged.
    NotFound,
}

/// Summary of the current model for status output.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub trained: bool,
    pub samples_seen: u64,
    pub trained_at: Option<DateTime<Utc>>,
    pub n_features: usize,
}

pub struct StatisticalClassifier {
    model: Arc<RwLock<ClassifierModel>>,
    writer: Mutex<()>,
    store: Arc<dyn ModelStore>,
}

fn poisoned<T>(_: T) -> ClassifierError {
    ClassifierError::Worker("model lock poisoned".to_string())
}

async fn run_blocking<T, F>(f: F) -> Result<T, ClassifierError>
where
    F: FnOnce() -> Result<T, ClassifierError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ClassifierError::Worker(format!("blocking task failed: {e}")))?
}

impl StatisticalClassifier {
    /// An untrained classifier backed by `store`. Call `load` to pick up a
    /// previously saved model.
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            model: Arc::new(RwLock::new(ClassifierModel::untrained())),
            writer: Mutex::new(()),
            store,
        }
    }

    /// `new` followed by `load`.
    pub async fn open(store: Arc<dyn ModelStore>) -> Result<Self, ClassifierError> {
        let classifier = Self::new(store);
        classifier.load().await?;
        Ok(classifier)
    }

    pub fn is_trained(&self) -> bool {
        self.model.read().map(|m| m.is_trained()).unwrap_or(false)
    }

    pub fn info(&self) -> Result<ModelInfo, ClassifierError> {
        let m = self.model.read().map_err(poisoned)?;
        Ok(ModelInfo {
            trained: m.is_trained(),
            samples_seen: m.samples_seen,
            trained_at: m.trained_at,
            n_features: m
                .state
                .as_ref()
                .map(|s| s.vectorizer.n_features())
                .unwrap_or(0),
        })
    }

    pub fn store_location(&self) -> String {
        self.store.location()
    }

    /// Classify one text. An untrained model answers benign with zero confidence.
    pub async fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        run_blocking(move || {
            let guard = model.read().map_err(poisoned)?;
            Ok(guard.predict(&text))
        })
        .await
    }

    /// Fit a new model from scratch, persist it, then make it current.
    pub async fn train(
        &self,
        texts: &[String],
        labels: &[i64],
    ) -> Result<TrainingReport, ClassifierError> {
        let _gate = self.writer.lock().await;
        let texts = texts.to_vec();
        let labels = labels.to_vec();

        let (model, report) = run_blocking(move || fit_full(&texts, &labels)).await?;
        self.commit(model).await?;
        Ok(report)
    }

    /// One incremental pass over new examples. Falls back to `train` when no
    /// model exists yet.
    pub async fn incremental_train(
        &self,
        texts: &[String],
        labels: &[i64],
    ) -> Result<TrainingReport, ClassifierError> {
        let _gate = self.writer.lock().await;
        let base = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let labels = labels.to_vec();

        // Readers may keep predicting against `base` while this runs; the gate
        // guarantees nobody else replaces it meanwhile.
        let (model, report) = run_blocking(move || {
            let guard = base.read().map_err(poisoned)?;
            fit_incremental(&guard, &texts, &labels)
        })
        .await?;

        if let Some(model) = model {
            self.commit(model).await?;
        }
        Ok(report)
    }

    /// Write the current model to the store.
    pub async fn save(&self) -> Result<(), ClassifierError> {
        let _gate = self.writer.lock().await;
        let bytes = {
            let model = self.model.read().map_err(poisoned)?;
            model.to_bytes()?
        };
        self.store
            .write(&bytes)
            .await
            .map_err(ClassifierError::Storage)?;
        info!(location = %self.store.location(), "Classifier model saved");
        Ok(())
    }

    /// Replace the in-memory model with the stored one, if any.
    ///
    /// Safe to call repeatedly; a missing blob is `NotFound`, not an error.
    pub async fn load(&self) -> Result<LoadStatus, ClassifierError> {
        let _gate = self.writer.lock().await;
        let Some(bytes) = self.store.read().await.map_err(ClassifierError::Storage)? else {
            debug!(location = %self.store.location(), "No stored classifier model");
            return Ok(LoadStatus::NotFound);
        };

        let model = run_blocking(move || ClassifierModel::from_bytes(&bytes)).await?;
        let samples_seen = model.samples_seen;
        self.swap(model)?;
        info!(
            location = %self.store.location(),
            samples_seen,
            "Classifier model loaded"
        );
        Ok(LoadStatus::Loaded { samples_seen })
    }

    /// Persist `model`, then make it current. Caller holds the writer gate.
    async fn commit(&self, model: ClassifierModel) -> Result<(), ClassifierError> {
        let bytes = model.to_bytes()?;
        self.store
            .write(&bytes)
            .await
            .map_err(ClassifierError::Storage)?;
        self.swap(model)
    }

    fn swap(&self, model: ClassifierModel) -> Result<(), ClassifierError> {
        *self.model.write().map_err(poisoned)? = model;
        Ok(())
    }
}

#[async_trait]
impl TextClassifier for StatisticalClassifier {
    async fn is_trained(&self) -> bool {
        StatisticalClassifier::is_trained(self)
    }

    async fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        StatisticalClassifier::predict(self, text).await
    }

    async fn incremental_train(
        &self,
        texts: &[String],
        labels: &[i64],
    ) -> Result<TrainingReport, ClassifierError> {
        StatisticalClassifier::incremental_train(self, texts, labels).await
    }
}
