//! Job records and the per-row state machine.

pub mod error;
pub mod model;
pub mod store;

pub use error::StoreError;
pub use model::{BulkJob, JobSettings, JobStatus, JobSummary, RecordOutcome, RowOutcome};
pub use store::{BulkJobStore, INTERRUPTED_REASON};
