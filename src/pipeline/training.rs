// Training feedback loop — turn moderator decisions into model updates.
//
// Fetch every unprocessed example, feed them to the classifier in one
// incremental pass, and only then mark exactly those examples processed.
// The mark is the last step and a single transaction, so a failed or
// cancelled run leaves every example unprocessed for the next attempt.
// Examples added while the run is in flight are not in the fetched set and
// stay unprocessed.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::{TextClassifier, TrainingReport};
use crate::db::Database;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrainingRun {
    /// No unprocessed examples.
    NothingToDo,
    /// The classifier ran; `processed` examples were marked.
    Trained {
        report: TrainingReport,
        processed: usize,
    },
}

/// Run one pass of the feedback loop.
///
/// Classifier failures come back as `Err` with nothing marked. A `Rejected`
/// report (every label invalid) still marks the batch, since retrying it
/// could never succeed.
pub async fn run(db: &dyn Database, classifier: &dyn TextClassifier) -> Result<TrainingRun> {
    let examples = db
        .get_unprocessed_training_examples()
        .await
        .context("Failed to fetch unprocessed training examples")?;

    if examples.is_empty() {
        info!("No unprocessed training examples");
        return Ok(TrainingRun::NothingToDo);
    }

    let ids: Vec<i64> = examples.iter().map(|e| e.id).collect();
    let (texts, labels): (Vec<String>, Vec<i64>) =
        examples.into_iter().map(|e| (e.text, e.label)).unzip();

    info!(count = ids.len(), "Training on unprocessed examples");
    let report = classifier
        .incremental_train(&texts, &labels)
        .await
        .context("Classifier training failed; examples left unprocessed")?;

    if let TrainingReport::Rejected { reason } = &report {
        warn!(%reason, "Training batch rejected");
    }

    db.mark_training_examples_processed(&ids)
        .await
        .context("Failed to mark training examples processed")?;

    info!(processed = ids.len(), "Training run complete");
    Ok(TrainingRun::Trained {
        report,
        processed: ids.len(),
    })
}
