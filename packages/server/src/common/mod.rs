// Common types shared across the application

pub mod id;

pub use id::{ApplicationId, DecisionId, InterviewId, JobId};
