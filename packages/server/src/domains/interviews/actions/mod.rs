pub mod expiry;
pub mod webhook;

pub use expiry::expire_interviews;
pub use webhook::{on_interview_completed, InterviewCompletion};
