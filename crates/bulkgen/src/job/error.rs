use thiserror::Error;

use crate::db::DatabaseError;

use super::model::JobStatus;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown job '{0}'")]
    UnknownJob(String),

    #[error("Row {index} is out of range for job '{job_id}' ({total} rows)")]
    RowOutOfRange {
        job_id: String,
        index: usize,
        total: usize,
    },

    #[error("Job '{job_id}' is already {status}")]
    JobTerminal { job_id: String, status: JobStatus },

    #[error("Job '{job_id}' is still {status}")]
    NotTerminal { job_id: String, status: JobStatus },

    #[error("A job needs at least one row")]
    EmptyJob,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
