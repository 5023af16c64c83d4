pub mod config;
pub mod corpus;
pub mod errors;
pub mod generate;
pub mod langs;
pub mod metrics;
pub mod progress;
pub mod prompt;
pub mod report;
pub mod segment;
pub mod task;
pub mod topic;

pub use errors::{EvalError, Result};
