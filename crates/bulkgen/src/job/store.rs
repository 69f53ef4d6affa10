//! Bulk job store with optional persistent database storage.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::db::job_repo::{self, JobRow, ResultRow};
use crate::db::{Database, DatabaseError};
use crate::generator::EnrichedArticle;

use super::error::StoreError;
use super::model::{BulkJob, JobSettings, JobStatus, JobSummary, RecordOutcome, RowOutcome};

/// Fault recorded on jobs that were still running when the process stopped.
pub const INTERRUPTED_REASON: &str = "interrupted";

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn payload_error(table: &'static str, key: String, e: serde_json::Error) -> DatabaseError {
    DatabaseError::Payload {
        table,
        key,
        reason: e.to_string(),
    }
}

fn job_to_row(job: &BulkJob) -> Result<JobRow, DatabaseError> {
    let settings = serde_json::to_string(&job.settings)
        .map_err(|e| payload_error("bulk_jobs", job.id.clone(), e))?;
    Ok(JobRow {
        id: job.id.clone(),
        file_name: job.file_name.clone(),
        status: job.status.as_str().to_string(),
        total_articles: job.total_articles as i64,
        completed_articles: job.completed_articles as i64,
        failed_articles: job.failed_articles as i64,
        settings,
        fault: job.fault.clone(),
        created_at: format_timestamp(job.created_at),
        updated_at: format_timestamp(job.updated_at),
        finished_at: job.finished_at.map(format_timestamp),
    })
}

fn outcome_to_row(
    job_id: &str,
    index: usize,
    outcome: &RowOutcome,
    now: DateTime<Utc>,
) -> Result<ResultRow, DatabaseError> {
    let (kind, article, reason) = match outcome {
        RowOutcome::Success { article } => {
            let json = serde_json::to_string(article)
                .map_err(|e| payload_error("bulk_job_results", format!("{}#{}", job_id, index), e))?;
            ("success", Some(json), None)
        }
        RowOutcome::Failure { reason } => ("failure", None, Some(reason.clone())),
    };
    Ok(ResultRow {
        job_id: job_id.to_string(),
        row_index: index as i64,
        outcome: kind.to_string(),
        article,
        reason,
        recorded_at: format_timestamp(now),
    })
}

fn row_to_outcome(row: &ResultRow) -> Result<RowOutcome, DatabaseError> {
    let key = || format!("{}#{}", row.job_id, row.row_index);
    match row.outcome.as_str() {
        "success" => {
            let json = row.article.as_deref().unwrap_or("null");
            let article: EnrichedArticle = serde_json::from_str(json)
                .map_err(|e| payload_error("bulk_job_results", key(), e))?;
            Ok(RowOutcome::Success { article })
        }
        "failure" => Ok(RowOutcome::Failure {
            reason: row.reason.clone().unwrap_or_default(),
        }),
        other => Err(DatabaseError::Payload {
            table: "bulk_job_results",
            key: key(),
            reason: format!("unknown outcome '{}'", other),
        }),
    }
}

fn job_from_rows(row: &JobRow, results: &[ResultRow]) -> Result<BulkJob, DatabaseError> {
    let settings: JobSettings = serde_json::from_str(&row.settings)
        .map_err(|e| payload_error("bulk_jobs", row.id.clone(), e))?;
    let status = row.status.parse::<JobStatus>().unwrap_or_else(|e| {
        log::warn!("{} for job {}, treating as failed", e, row.id);
        JobStatus::Failed
    });

    let total = usize::try_from(row.total_articles).unwrap_or(0);
    let mut outcomes: Vec<Option<RowOutcome>> = vec![None; total];
    for result in results {
        match usize::try_from(result.row_index).ok().filter(|i| *i < total) {
            Some(index) => outcomes[index] = Some(row_to_outcome(result)?),
            None => log::warn!(
                "Ignoring result for out-of-range row {} of job {}",
                result.row_index,
                row.id
            ),
        }
    }

    let completed = outcomes.iter().flatten().filter(|o| o.is_success()).count();
    let failed = outcomes.iter().flatten().count() - completed;

    Ok(BulkJob {
        id: row.id.clone(),
        file_name: row.file_name.clone(),
        status,
        total_articles: total,
        completed_articles: completed,
        failed_articles: failed,
        settings,
        results: outcomes,
        fault: row.fault.clone(),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
        finished_at: row.finished_at.as_deref().map(parse_timestamp),
    })
}

/// Owns every job's state machine.
///
/// All mutations go through one mutex: the in-memory record is checked, the
/// database transaction runs, and only then is memory updated. Concurrent
/// workers therefore never double-count a row, and a failed write leaves
/// both copies unchanged.
pub struct BulkJobStore {
    jobs: Mutex<HashMap<String, BulkJob>>,
    db: Option<Database>,
}

impl Default for BulkJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkJobStore {
    /// Creates a store that keeps jobs in memory only.
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            db: None,
        }
    }

    /// Creates a store backed by `db`, loading every persisted job.
    ///
    /// Jobs left `pending` or `processing` by a previous process cannot resume
    /// and are faulted with reason `"interrupted"`.
    pub fn with_database(db: Database) -> Result<Self, StoreError> {
        let now = Utc::now();
        let jobs = db.with_tx(|tx| {
            let mut jobs = HashMap::new();
            for row in job_repo::list_jobs(tx)? {
                let results = job_repo::results_for(tx, &row.id)?;
                let mut job = job_from_rows(&row, &results)?;

                if !job.is_terminal() {
                    log::warn!(
                        "Job {} was {} when the store last closed, marking failed",
                        job.id,
                        job.status
                    );
                    job.status = JobStatus::Failed;
                    job.fault = Some(INTERRUPTED_REASON.to_string());
                    job.updated_at = now;
                    job.finished_at = Some(now);
                    job_repo::update_progress(tx, &job_to_row(&job)?)?;
                }
                jobs.insert(job.id.clone(), job);
            }
            Ok(jobs)
        })?;

        log::info!("Loaded {} bulk jobs from database", jobs.len());

        Ok(Self {
            jobs: Mutex::new(jobs),
            db: Some(db),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BulkJob>> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Creates a `pending` job with `total_articles` empty result slots.
    pub fn create_job(
        &self,
        file_name: &str,
        total_articles: usize,
        settings: JobSettings,
    ) -> Result<BulkJob, StoreError> {
        if total_articles == 0 {
            return Err(StoreError::EmptyJob);
        }

        let job = BulkJob::new(
            uuid::Uuid::new_v4().to_string(),
            file_name.to_string(),
            total_articles,
            settings,
        );

        let mut jobs = self.lock();
        if let Some(db) = &self.db {
            let row = job_to_row(&job)?;
            db.with_tx(|tx| job_repo::insert_job(tx, &row))?;
        }
        jobs.insert(job.id.clone(), job.clone());

        log::info!(
            "Created bulk job {} for '{}' with {} rows",
            job.id,
            job.file_name,
            total_articles
        );
        Ok(job)
    }

    /// Moves a job from `pending` to `processing`.
    ///
    /// Returns `false` if it was already processing.
    pub fn mark_processing(&self, job_id: &str) -> Result<bool, StoreError> {
        let mut jobs = self.lock();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| StoreError::UnknownJob(job_id.to_string()))?;

        match job.status {
            JobStatus::Processing => return Ok(false),
            status if status.is_terminal() => {
                return Err(StoreError::JobTerminal {
                    job_id: job_id.to_string(),
                    status,
                })
            }
            _ => {}
        }

        let mut next = job.clone();
        next.status = JobStatus::Processing;
        next.updated_at = Utc::now();
        self.commit(&mut jobs, next, None)?;
        Ok(true)
    }

    /// Records a successful row. Idempotent per `(job_id, index)`.
    pub fn record_success(
        &self,
        job_id: &str,
        index: usize,
        article: EnrichedArticle,
    ) -> Result<RecordOutcome, StoreError> {
        self.record(job_id, index, RowOutcome::Success { article })
    }

    /// Records a failed row. Idempotent per `(job_id, index)`.
    pub fn record_failure(
        &self,
        job_id: &str,
        index: usize,
        reason: impl Into<String>,
    ) -> Result<RecordOutcome, StoreError> {
        self.record(
            job_id,
            index,
            RowOutcome::Failure {
                reason: reason.into(),
            },
        )
    }

    fn record(
        &self,
        job_id: &str,
        index: usize,
        outcome: RowOutcome,
    ) -> Result<RecordOutcome, StoreError> {
        let mut jobs = self.lock();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| StoreError::UnknownJob(job_id.to_string()))?;

        if index >= job.total_articles {
            return Err(StoreError::RowOutOfRange {
                job_id: job_id.to_string(),
                index,
                total: job.total_articles,
            });
        }
        if job.results[index].is_some() {
            log::debug!("Row {} of job {} already recorded, ignoring", index, job_id);
            return Ok(RecordOutcome::AlreadyRecorded);
        }
        if job.is_terminal() {
            return Err(StoreError::JobTerminal {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        let now = Utc::now();
        let mut next = job.clone();
        if outcome.is_success() {
            next.completed_articles += 1;
        } else {
            next.failed_articles += 1;
        }
        if next.status == JobStatus::Pending {
            next.status = JobStatus::Processing;
        }
        let finished = next.resolved() == next.total_articles;
        if finished {
            next.status = JobStatus::Completed;
            next.finished_at = Some(now);
        }
        next.updated_at = now;

        let result_row = match &self.db {
            Some(_) => Some(outcome_to_row(job_id, index, &outcome, now)?),
            None => None,
        };
        next.results[index] = Some(outcome);
        self.commit(&mut jobs, next, result_row)?;

        if finished {
            log::info!("Bulk job {} completed", job_id);
        }
        Ok(RecordOutcome::Recorded { finished })
    }

    /// Aborts a job after a pipeline fault. Already-recorded rows are kept.
    pub fn fail_job(&self, job_id: &str, reason: &str) -> Result<(), StoreError> {
        let mut jobs = self.lock();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| StoreError::UnknownJob(job_id.to_string()))?;
        if job.is_terminal() {
            return Err(StoreError::JobTerminal {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        let now = Utc::now();
        let mut next = job.clone();
        next.status = JobStatus::Failed;
        next.fault = Some(reason.to_string());
        next.updated_at = now;
        next.finished_at = Some(now);
        self.commit(&mut jobs, next, None)?;

        log::error!("Bulk job {} failed: {}", job_id, reason);
        Ok(())
    }

    /// Persists `next` (and an optional new result row) in one transaction,
    /// then replaces the in-memory record.
    fn commit(
        &self,
        jobs: &mut HashMap<String, BulkJob>,
        next: BulkJob,
        result: Option<ResultRow>,
    ) -> Result<(), StoreError> {
        if let Some(db) = &self.db {
            let row = job_to_row(&next)?;
            db.with_tx(|tx| {
                if let Some(result) = &result {
                    job_repo::insert_result(tx, result)?;
                }
                job_repo::update_progress(tx, &row)
            })?;
        }
        jobs.insert(next.id.clone(), next);
        Ok(())
    }

    pub fn summary(&self, job_id: &str) -> Result<JobSummary, StoreError> {
        self.lock()
            .get(job_id)
            .map(BulkJob::summary)
            .ok_or_else(|| StoreError::UnknownJob(job_id.to_string()))
    }

    /// Index-aligned row results. Only available once the job is terminal.
    ///
    /// Every slot is filled for a completed job; a failed job keeps `None`
    /// for rows it never resolved.
    pub fn results(&self, job_id: &str) -> Result<Vec<Option<RowOutcome>>, StoreError> {
        let jobs = self.lock();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| StoreError::UnknownJob(job_id.to_string()))?;
        if !job.is_terminal() {
            return Err(StoreError::NotTerminal {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }
        Ok(job.results.clone())
    }

    /// Full snapshot of a job.
    pub fn get(&self, job_id: &str) -> Option<BulkJob> {
        self.lock().get(job_id).cloned()
    }

    /// Summaries of all jobs, newest first.
    pub fn list(&self) -> Vec<JobSummary> {
        let jobs = self.lock();
        let mut all: Vec<&BulkJob> = jobs.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        all.into_iter().map(BulkJob::summary).collect()
    }

    /// Removes a terminal job and its results. Returns whether it existed.
    pub fn delete_job(&self, job_id: &str) -> Result<bool, StoreError> {
        let mut jobs = self.lock();
        let Some(job) = jobs.get(job_id) else {
            return Ok(false);
        };
        if !job.is_terminal() {
            return Err(StoreError::NotTerminal {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        if let Some(db) = &self.db {
            db.with_tx(|tx| job_repo::delete_job(tx, job_id))?;
        }
        jobs.remove(job_id);
        log::info!("Deleted bulk job {}", job_id);
        Ok(true)
    }
}
