// Verdicts — combining rule and classifier evidence.

pub mod verdict;

pub use verdict::{Detector, Verdict, VerdictSource, CONFIDENCE_THRESHOLD};
