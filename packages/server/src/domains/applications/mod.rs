//! Applications domain: the screening pipeline state machine, its stage
//! handlers, human decisions and operator recovery.

pub mod actions;
pub mod error;
pub mod jobs;
pub mod machines;
pub mod models;

pub use error::{ApplicationError, ApplicationResult, InvalidStateError};
