// Colored terminal output for verdicts, moderation outcomes and training runs.
//
// This module handles all terminal-specific formatting. The main.rs command
// handlers delegate here.

use colored::Colorize;

use crate::classifier::TrainingReport;
use crate::moderation::{ModerationOutcome, ModerationPrompt, Transition};
use crate::pipeline::intake::ScreenOutcome;
use crate::pipeline::training::TrainingRun;
use crate::scoring::{Verdict, VerdictSource, CONFIDENCE_THRESHOLD};

/// Display a single verdict with what decided it.
pub fn display_verdict(text: &str, verdict: &Verdict) {
    println!(
        "\n{}",
        format!("=== \"{}\" ===", super::truncate_chars(text, 60)).bold()
    );

    let headline = if verdict.suspicious {
        "SUSPICIOUS".red().bold()
    } else {
        "clean".green()
    };
    println!("  Verdict: {headline}");
    println!("  Decided by: {}", describe_source(verdict.source));
    if let Some(reason) = &verdict.reason {
        println!("  Rule: {}", reason.yellow());
    }
    match verdict.confidence {
        Some(c) => println!(
            "  Classifier confidence: {} (threshold {:.2})",
            colorize_confidence(c),
            CONFIDENCE_THRESHOLD
        ),
        None => println!("  Classifier confidence: {}", "n/a".dimmed()),
    }
}

/// Display the outcome of screening one message.
pub fn display_screen_outcome(outcome: &ScreenOutcome) {
    let label = match outcome {
        ScreenOutcome::Trusted => "author is trusted; not screened".green(),
        ScreenOutcome::Clean(_) => "clean".green(),
        ScreenOutcome::Queued(_) => "queued for moderation".red().bold(),
        ScreenOutcome::AlreadyQueued(_) => "already pending moderation".yellow(),
        ScreenOutcome::NotRecorded(_) => "suspicious, but the record was NOT stored".red(),
        ScreenOutcome::PromptFailed(_) => "recorded, but the prompt was not delivered".yellow(),
    };
    println!("  Screen: {label}");
}

/// Print the prompt a moderator would receive.
pub fn display_prompt(prompt: &ModerationPrompt) {
    println!("\n{}", "--- moderation prompt ---".dimmed());
    println!("{}", prompt.render());
    for (caption, data) in prompt.buttons() {
        println!("  [{caption}] {}", data.dimmed());
    }
    println!("{}", "-------------------------".dimmed());
}

/// Display what a moderator action did.
pub fn display_moderation_outcome(outcome: &ModerationOutcome) {
    let status = match outcome.transition {
        Transition::Applied(status) => format!("applied -> {status}").green(),
        Transition::AlreadyHandled(status) => format!("no-op (already {status})").yellow(),
        Transition::NotFound => "no record".red(),
    };
    println!(
        "\n{} {} on message {}: {status}",
        "Moderation:".bold(),
        outcome.action.kind,
        outcome.action.message_id
    );
    if let Some(id) = outcome.training_example_id {
        println!("  Training example #{id} recorded");
    }
    println!("\n{}", outcome.acknowledgment());
}

/// Display a training report from `bootstrap` or `train`.
pub fn display_training_report(report: &TrainingReport) {
    match report {
        TrainingReport::Full {
            accuracy,
            train_size,
            test_size,
        } => {
            println!(
                "{} trained on {train_size} examples ({test_size} held out)",
                "Full fit:".bold()
            );
            match accuracy {
                Some(a) => println!("  Holdout accuracy: {}", colorize_confidence(*a)),
                None => println!("  Holdout accuracy: {}", "n/a (fewer than 20 examples)".dimmed()),
            }
        }
        TrainingReport::Incremental {
            new_samples,
            dropped,
        } => {
            println!(
                "{} learned from {new_samples} new examples",
                "Incremental update:".bold()
            );
            if *dropped > 0 {
                println!("  {} {dropped} examples had invalid labels", "!".yellow());
            }
        }
        TrainingReport::Rejected { reason } => {
            println!("{} {reason}", "Training rejected:".yellow().bold());
        }
    }
}

pub fn display_training_run(run: &TrainingRun) {
    match run {
        TrainingRun::NothingToDo => println!("Nothing to do: no unprocessed training examples."),
        TrainingRun::Trained { report, processed } => {
            display_training_report(report);
            println!("  Marked {processed} examples processed");
        }
    }
}

fn describe_source(source: VerdictSource) -> &'static str {
    match source {
        VerdictSource::EmptyText => "empty text",
        VerdictSource::Exclusion => "exclusion pattern",
        VerdictSource::Rule => "rule engine",
        VerdictSource::Classifier => "classifier",
        VerdictSource::Default => "default (no rule, classifier unavailable)",
    }
}

/// Colorize a 0-1 probability.
fn colorize_confidence(value: f64) -> colored::ColoredString {
    let s = format!("{value:.3}");
    if value >= CONFIDENCE_THRESHOLD {
        s.red().bold()
    } else if value >= 0.5 {
        s.yellow()
    } else {
        s.green()
    }
}
