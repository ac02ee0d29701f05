// HTTP routes
pub mod admin;
pub mod decisions;
pub mod health;
pub mod webhooks;

pub use admin::*;
pub use decisions::*;
pub use health::*;
pub use webhooks::*;
