// Moderation — prompts, moderator actions, and the status state machine.

pub mod actions;
pub mod machine;
pub mod prompt;
pub mod transport;

pub use actions::{ActionKind, ModerationAction};
pub use machine::{ModerationMachine, ModerationOutcome, Transition};
pub use prompt::ModerationPrompt;
pub use transport::{DryRunTransport, Transport};
