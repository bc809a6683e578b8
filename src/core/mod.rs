// Public modules
pub mod build;
pub mod config;
pub mod container;
pub mod error;
pub mod manifest;
pub mod output;
pub mod push;
pub mod template;
pub mod worker;

// Internal modules - not part of public API
pub(crate) mod paths;

// Public modules for CLI access
pub mod defaults;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use output::{BatchItem, BatchReport, BatchSummary, ItemOutcome, ItemStatus};
