pub mod interview;

pub use interview::{Interview, InterviewStatus};
