// System status display — DB counts, training backlog, model state.

use anyhow::Result;
use std::sync::Arc;

use crate::classifier::StatisticalClassifier;
use crate::db::Database;

/// Display system status to the terminal. The database must already exist.
pub async fn show(
    db: &Arc<dyn Database>,
    db_display_path: &str,
    classifier: &StatisticalClassifier,
) -> Result<()> {
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let counts = db.get_suspect_counts().await?;
    println!(
        "Suspects: {} pending, {} skipped, {} banned, {} trusted",
        counts.pending, counts.skipped, counts.banned, counts.trusted
    );

    let stats = db.get_training_stats().await?;
    println!(
        "Training examples: {} total ({} benign, {} spam), {} unprocessed",
        stats.total, stats.good, stats.bad, stats.unprocessed
    );
    if stats.unprocessed > 0 {
        println!("  Run `warden train` to feed them to the classifier");
    }

    let info = classifier.info()?;
    if info.trained {
        let when = info
            .trained_at
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "Classifier: trained on {} examples, {} features (updated {})",
            info.samples_seen, info.n_features, when
        );
    } else {
        println!("Classifier: not trained");
        println!("  Run `warden bootstrap <examples.jsonl>` to train it");
    }
    println!("  Model file: {}", classifier.store_location());

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
