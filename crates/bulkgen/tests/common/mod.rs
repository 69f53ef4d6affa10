//! Shared test utilities for bulkgen integration tests.
//!
//! - Scripted `ContentGenerator` doubles
//! - Builders for spreadsheets, pools and pipelines

pub mod builders;
pub mod generators;

pub use builders::*;
pub use generators::*;
