// Warden: hybrid spam triage for a monitored chat channel
//
// This is the library root. Each module corresponds to a major subsystem:
// detection (rules, classifier, scoring), moderation, and the pipelines
// that connect them to storage.

pub mod classifier;
pub mod config;
pub mod db;
pub mod message;
pub mod moderation;
pub mod output;
pub mod pipeline;
pub mod rules;
pub mod scoring;
pub mod status;
