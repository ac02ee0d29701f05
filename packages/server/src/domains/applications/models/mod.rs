pub mod application;
pub mod decision;
pub mod status;

pub use application::{Application, UpsertOutcome};
pub use decision::{Decision, DecisionAction, NewDecision};
pub use status::{ApplicationStatus, UnknownStatus};
