// Statistical classifier — char n-gram TF-IDF feeding an online linear model.

pub mod model;
pub mod preprocess;
pub mod sgd;
pub mod statistical;
pub mod store;
pub mod traits;
pub mod vectorizer;

pub use statistical::{LoadStatus, ModelInfo, StatisticalClassifier};
pub use store::{FileModelStore, MemoryModelStore, ModelStore};
pub use traits::{
    coerce_label, ClassifierError, Label, NoopClassifier, Prediction, TextClassifier,
    TrainingReport,
};
