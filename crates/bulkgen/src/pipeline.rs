//! Submission facade: parse, create the job, run it in the background.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, LimitsConfig};
use crate::db::{default_database_path, Database};
use crate::error::{BulkgenError, Result, ValidationError};
use crate::generator::ContentGenerator;
use crate::images::ImagePool;
use crate::job::{BulkJob, BulkJobStore, JobSettings, JobSummary, RowOutcome};
use crate::progress::{JobEvent, ProgressBroadcaster};
use crate::scheduler::{BulkJobScheduler, SchedulerConfig};
use crate::spreadsheet::SpreadsheetParser;

type CancelMap = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// Opens the job store `config.database` names, reloading persisted jobs.
///
/// Read-only commands use this directly; no generator or API key is needed.
pub fn open_job_store(config: &Config) -> Result<BulkJobStore> {
    if config.database.in_memory {
        return Ok(BulkJobStore::new());
    }
    match config.database.path.clone().or_else(default_database_path) {
        Some(path) => Ok(BulkJobStore::with_database(Database::open(&path)?)?),
        None => {
            warn!("No home directory found, keeping jobs in memory only");
            Ok(BulkJobStore::new())
        }
    }
}

/// A running job.
pub struct JobHandle {
    job_id: String,
    cancel: CancellationToken,
    task: JoinHandle<Result<JobSummary>>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Requests cooperative cancellation. Rows already dispatched still finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the job to reach a terminal state.
    pub async fn wait(self) -> Result<JobSummary> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(BulkgenError::PipelineFault {
                job_id: self.job_id,
                reason: format!("scheduler task stopped unexpectedly: {}", e),
            }),
        }
    }
}

pub struct BulkPipeline {
    store: Arc<BulkJobStore>,
    generator: Arc<dyn ContentGenerator>,
    scheduler: SchedulerConfig,
    limits: LimitsConfig,
    progress: ProgressBroadcaster,
    running: CancelMap,
}

impl BulkPipeline {
    pub fn new(
        store: Arc<BulkJobStore>,
        generator: Arc<dyn ContentGenerator>,
        scheduler: SchedulerConfig,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            store,
            generator,
            scheduler,
            limits,
            progress: ProgressBroadcaster::default(),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Builds a pipeline from config, opening the job database it names.
    pub fn from_config(config: &Config, generator: Arc<dyn ContentGenerator>) -> Result<Self> {
        Ok(Self::new(
            Arc::new(open_job_store(config)?),
            generator,
            SchedulerConfig::from_config(config),
            config.limits.clone(),
        ))
    }

    pub fn store(&self) -> &Arc<BulkJobStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.progress.subscribe()
    }

    /// Parses `bytes`, creates a `pending` job and starts it in the background.
    ///
    /// Parse and validation errors are returned before any job exists. Must be
    /// called from within a Tokio runtime.
    pub fn submit(
        &self,
        file_name: &str,
        bytes: &[u8],
        pool: Option<ImagePool>,
        settings: JobSettings,
    ) -> Result<JobHandle> {
        let size = bytes.len() as u64;
        if size > self.limits.max_spreadsheet_bytes {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.limits.max_spreadsheet_bytes,
            }
            .into());
        }
        if let Some(pool) = &pool {
            if pool.len() > self.limits.max_images {
                return Err(ValidationError::TooManyImages {
                    count: pool.len(),
                    max: self.limits.max_images,
                }
                .into());
            }
        }

        let parser = SpreadsheetParser::with_defaults(settings.tone, settings.language);
        let rows = parser.parse(file_name, bytes)?;
        let job = self.store.create_job(file_name, rows.len(), settings)?;
        info!(
            "Submitted '{}' as job {} ({} rows, {} images)",
            file_name,
            job.id,
            rows.len(),
            pool.as_ref().map_or(0, ImagePool::len)
        );

        let cancel = CancellationToken::new();
        self.lock_running().insert(job.id.clone(), cancel.clone());

        let scheduler = BulkJobScheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.generator),
            self.scheduler,
        )
        .with_progress(self.progress.clone());
        let running = Arc::clone(&self.running);
        let job_id = job.id.clone();
        let token = cancel.clone();
        let pool = pool.map(Arc::new);

        let task = tokio::spawn(async move {
            let result = scheduler.run(&job_id, rows, pool, token).await;
            match running.lock() {
                Ok(mut map) => map.remove(&job_id),
                Err(poisoned) => poisoned.into_inner().remove(&job_id),
            };
            result
        });

        Ok(JobHandle {
            job_id: job.id,
            cancel,
            task,
        })
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
        match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cancels a running job by id. Returns `false` if it is not running.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.lock_running().get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn status(&self, job_id: &str) -> Result<JobSummary> {
        Ok(self.store.summary(job_id)?)
    }

    /// Row results, once the job is terminal.
    pub fn results(&self, job_id: &str) -> Result<Vec<Option<RowOutcome>>> {
        Ok(self.store.results(job_id)?)
    }

    pub fn job(&self, job_id: &str) -> Option<BulkJob> {
        self.store.get(job_id)
    }

    pub fn list(&self) -> Vec<JobSummary> {
        self.store.list()
    }

    pub fn delete(&self, job_id: &str) -> Result<bool> {
        Ok(self.store.delete_job(job_id)?)
    }
}
