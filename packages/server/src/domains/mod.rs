// Business domains
pub mod applications;
pub mod interviews;
