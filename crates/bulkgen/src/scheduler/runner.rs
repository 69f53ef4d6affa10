use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::BulkgenError;
use crate::generator::{ContentGenerator, EnrichedArticle, GeneratedArticle, GenerationError};
use crate::images::ImagePool;
use crate::job::{BulkJobStore, JobSettings, JobSummary, RecordOutcome, StoreError};
use crate::matcher::ImageMatcher;
use crate::progress::{JobEvent, JobEventKind, ProgressBroadcaster};
use crate::spreadsheet::{ParsedRow, RowSpec, RowValidity};

use super::config::SchedulerConfig;
use super::retry::RetryPolicy;

/// Failure reason recorded for rows that were never dispatched.
pub const CANCELLED_REASON: &str = "cancelled";

type RowQueue = Arc<Mutex<VecDeque<ParsedRow>>>;

fn pop_row(queue: &RowQueue) -> Option<ParsedRow> {
    match queue.lock() {
        Ok(mut q) => q.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

fn drain_rows(queue: &RowQueue) -> Vec<ParsedRow> {
    match queue.lock() {
        Ok(mut q) => q.drain(..).collect(),
        Err(poisoned) => poisoned.into_inner().drain(..).collect(),
    }
}

/// First fault wins; later ones are only logged.
#[derive(Clone, Default)]
struct FaultSlot(Arc<Mutex<Option<String>>>);

impl FaultSlot {
    fn set(&self, reason: String) {
        let mut slot = match self.0.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_none() {
            *slot = Some(reason);
        } else {
            warn!("Additional pipeline fault ignored: {}", reason);
        }
    }

    fn take(&self) -> Option<String> {
        match self.0.lock() {
            Ok(mut g) => g.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Everything a worker task needs, cheap to clone.
#[derive(Clone)]
struct WorkerContext {
    job_id: Arc<str>,
    store: Arc<BulkJobStore>,
    generator: Arc<dyn ContentGenerator>,
    progress: Option<ProgressBroadcaster>,
    settings: JobSettings,
    pool: Option<Arc<ImagePool>>,
    matcher: ImageMatcher,
    retry: RetryPolicy,
}

impl WorkerContext {
    fn emit(&self, event: JobEvent) {
        if let Some(progress) = &self.progress {
            progress.send(event);
        }
    }

    fn emit_with_summary(&self, event: JobEvent) {
        let event = match self.store.summary(&self.job_id) {
            Ok(summary) => event.with_summary(summary),
            Err(_) => event,
        };
        self.emit(event);
    }
}

/// Drives every row of a job through generation, matching and recording.
pub struct BulkJobScheduler {
    store: Arc<BulkJobStore>,
    generator: Arc<dyn ContentGenerator>,
    config: SchedulerConfig,
    progress: Option<ProgressBroadcaster>,
}

impl BulkJobScheduler {
    pub fn new(
        store: Arc<BulkJobStore>,
        generator: Arc<dyn ContentGenerator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBroadcaster) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs `rows` for an existing `pending` job until every row is resolved.
    ///
    /// Rows are taken from a FIFO queue by at most `worker_count` concurrent
    /// workers. Cancelling `cancel` stops further dequeues; rows already in
    /// flight finish and the rest are recorded as `"cancelled"`. A store
    /// failure is a pipeline fault: the job is marked `failed` and
    /// [`BulkgenError::PipelineFault`] is returned.
    pub async fn run(
        &self,
        job_id: &str,
        rows: Vec<ParsedRow>,
        pool: Option<Arc<ImagePool>>,
        cancel: CancellationToken,
    ) -> Result<JobSummary, BulkgenError> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| StoreError::UnknownJob(job_id.to_string()))?;

        let span = info_span!("bulk_job", job_id = %job.id, file_name = %job.file_name);
        self.run_job(job.id.clone(), job.settings, job.total_articles, rows, pool, cancel)
            .instrument(span)
            .await
    }

    async fn run_job(
        &self,
        job_id: String,
        settings: JobSettings,
        total: usize,
        rows: Vec<ParsedRow>,
        pool: Option<Arc<ImagePool>>,
        cancel: CancellationToken,
    ) -> Result<JobSummary, BulkgenError> {
        if rows.len() != total {
            return Err(self.fault(
                &job_id,
                format!("job expects {} rows but {} were supplied", total, rows.len()),
            ));
        }
        if let Err(e) = self.store.mark_processing(&job_id) {
            return Err(self.fault(&job_id, e.to_string()));
        }

        let ctx = WorkerContext {
            job_id: Arc::from(job_id.as_str()),
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            progress: self.progress.clone(),
            settings,
            pool,
            matcher: ImageMatcher::new(self.config.min_similarity),
            retry: self.config.retry,
        };
        let worker_count = self.config.worker_count.clamp(1, total.max(1));
        info!(rows = total, workers = worker_count, "Starting bulk job");
        ctx.emit(JobEvent::new(
            &job_id,
            JobEventKind::JobStarted,
            format!("Generating {} articles", total),
        ));

        let queue: RowQueue = Arc::new(Mutex::new(rows.into_iter().collect()));
        // Stops dequeuing on user cancellation or on a fault.
        let stop = cancel.child_token();
        let fault = FaultSlot::default();

        let workers: Vec<JoinHandle<()>> = (0..worker_count)
            .map(|worker_id| {
                let ctx = ctx.clone();
                let queue = Arc::clone(&queue);
                let stop = stop.clone();
                let fault = fault.clone();
                tokio::spawn(
                    run_worker(worker_id, ctx, queue, stop, fault)
                        .instrument(info_span!("worker", id = worker_id)),
                )
            })
            .collect();

        for (i, joined) in join_all(workers).await.into_iter().enumerate() {
            if let Err(e) = joined {
                error!("Worker {} panicked: {}", i, e);
                fault.set(format!("worker {} stopped unexpectedly: {}", i, e));
            }
        }

        if let Some(reason) = fault.take() {
            return Err(self.fault(&job_id, reason));
        }

        let undispatched = drain_rows(&queue);
        if !undispatched.is_empty() {
            info!(rows = undispatched.len(), "Job cancelled, recording undispatched rows");
        }
        for row in undispatched {
            if let Err(e) = ctx.store.record_failure(&job_id, row.index, CANCELLED_REASON) {
                return Err(self.fault(&job_id, e.to_string()));
            }
            ctx.emit(JobEvent::new(&job_id, JobEventKind::RowFailed, CANCELLED_REASON).for_row(row.index));
        }

        let summary = self.store.summary(&job_id)?;
        if !summary.status.is_terminal() {
            return Err(self.fault(
                &job_id,
                format!(
                    "{} of {} rows left unresolved",
                    summary.total_articles - summary.completed_articles - summary.failed_articles,
                    summary.total_articles
                ),
            ));
        }

        info!(
            completed = summary.completed_articles,
            failed = summary.failed_articles,
            "Bulk job finished"
        );
        ctx.emit(
            JobEvent::new(&job_id, JobEventKind::JobFinished, "All rows resolved")
                .with_summary(summary.clone()),
        );
        Ok(summary)
    }

    /// Marks the job failed and builds the error to return.
    fn fault(&self, job_id: &str, reason: String) -> BulkgenError {
        error!(%reason, "Pipeline fault");
        if let Err(e) = self.store.fail_job(job_id, &reason) {
            warn!("Could not mark job {} failed: {}", job_id, e);
        }
        if let Some(progress) = &self.progress {
            progress.send(JobEvent::new(job_id, JobEventKind::JobFaulted, reason.clone()));
        }
        BulkgenError::PipelineFault {
            job_id: job_id.to_string(),
            reason,
        }
    }
}

async fn run_worker(
    worker_id: usize,
    ctx: WorkerContext,
    queue: RowQueue,
    stop: CancellationToken,
    fault: FaultSlot,
) {
    debug!("Worker {} started", worker_id);
    loop {
        // Cancellation is only observed here, between rows.
        if stop.is_cancelled() {
            debug!("Worker {} observed cancellation", worker_id);
            break;
        }
        let Some(row) = pop_row(&queue) else {
            break;
        };

        let index = row.index;
        if let Err(e) = process_row(&ctx, row)
            .instrument(info_span!("row", index))
            .await
        {
            fault.set(format!("failed to record row {}: {}", index, e));
            stop.cancel();
            break;
        }
    }
    debug!("Worker {} stopped", worker_id);
}

async fn process_row(ctx: &WorkerContext, row: ParsedRow) -> Result<(), StoreError> {
    if let RowValidity::Malformed(reason) = &row.validity {
        warn!(line = row.line, %reason, "Skipping malformed row");
        let outcome = ctx.store.record_failure(&ctx.job_id, row.index, reason.clone())?;
        report(ctx, row.index, outcome, JobEventKind::RowFailed, reason);
        return Ok(());
    }

    ctx.emit(
        JobEvent::new(&ctx.job_id, JobEventKind::RowStarted, row.spec.title.clone())
            .for_row(row.index),
    );

    match generate_with_retry(ctx, &row).await {
        Ok(article) => {
            let article = match &ctx.pool {
                Some(pool) if ctx.settings.include_images && !pool.is_empty() => {
                    ctx.matcher.enrich(article, pool)
                }
                _ => EnrichedArticle::from(article),
            };
            debug!(images = article.image_count(), "Row generated");
            let outcome = ctx.store.record_success(&ctx.job_id, row.index, article)?;
            report(ctx, row.index, outcome, JobEventKind::RowSucceeded, "Article generated");
        }
        Err((e, retries)) => {
            let reason = if e.is_transient() && retries > 0 {
                format!("{} (gave up after {} retries)", e, retries)
            } else {
                e.to_string()
            };
            warn!(%reason, "Row failed");
            let outcome = ctx.store.record_failure(&ctx.job_id, row.index, reason.clone())?;
            report(ctx, row.index, outcome, JobEventKind::RowFailed, &reason);
        }
    }
    Ok(())
}

fn report(ctx: &WorkerContext, index: usize, outcome: RecordOutcome, kind: JobEventKind, message: &str) {
    match outcome {
        RecordOutcome::Recorded { .. } => {
            ctx.emit_with_summary(JobEvent::new(&ctx.job_id, kind, message).for_row(index));
        }
        RecordOutcome::AlreadyRecorded => {
            debug!(index, "Row already had a result");
        }
    }
}

/// One generator call. A panic inside the generator fails only this row.
async fn call_generator(
    ctx: &WorkerContext,
    spec: &RowSpec,
) -> Result<GeneratedArticle, GenerationError> {
    match AssertUnwindSafe(ctx.generator.generate(spec)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%detail, "Generator panicked");
            Err(GenerationError::InvalidResponse(format!("generator panicked: {}", detail)))
        }
    }
}

/// Calls the generator, retrying transient failures per the policy.
/// On failure returns the last error and how many retries were made.
async fn generate_with_retry(
    ctx: &WorkerContext,
    row: &ParsedRow,
) -> Result<GeneratedArticle, (GenerationError, u32)> {
    let mut retries = 0;
    loop {
        match call_generator(ctx, &row.spec).await {
            Ok(article) => return Ok(article),
            Err(e) if ctx.retry.should_retry(&e, retries) => {
                retries += 1;
                let delay = ctx.retry.delay_for(retries, e.retry_after());
                warn!(
                    error = %e,
                    "Transient failure, retrying ({}/{}) in {:?}",
                    retries,
                    ctx.retry.max_retries,
                    delay
                );
                ctx.emit(
                    JobEvent::new(
                        &ctx.job_id,
                        JobEventKind::RowRetrying,
                        format!("{}; retry {} in {:?}", e, retries, delay),
                    )
                    .for_row(row.index),
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err((e, retries)),
        }
    }
}
