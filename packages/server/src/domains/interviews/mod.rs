//! Interviews domain: invitations sent to advancing candidates, the
//! completion webhook, transcription and expiry.

pub mod actions;
pub mod jobs;
pub mod models;
