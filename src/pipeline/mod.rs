// Pipelines — message intake and the training feedback loop.

pub mod intake;
pub mod training;
