//! `ContentGenerator` doubles that never touch the network.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use bulkgen::db::Database;
use bulkgen::generator::{ArticleSection, ContentGenerator, GeneratedArticle, GenerationError};
use bulkgen::RowSpec;

/// Article with one section per requested sub-heading.
pub fn echo_article(spec: &RowSpec) -> GeneratedArticle {
    let sections = spec
        .sub_headings
        .iter()
        .map(|h| ArticleSection::new(h.clone(), format!("About {}.", h)))
        .collect();
    GeneratedArticle::new(spec.title.clone(), sections)
}

/// Replies per title from a script of failures, then echoes.
#[derive(Default)]
pub struct ScriptedGenerator {
    failures: Mutex<HashMap<String, VecDeque<GenerationError>>>,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues errors returned for `title` before it starts succeeding.
    pub fn fail(self, title: &str, errors: impl IntoIterator<Item = GenerationError>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_default()
            .extend(errors);
        self
    }

    pub fn delay(mut self, title: &str, delay: Duration) -> Self {
        self.delays.insert(title.to_string(), delay);
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn calls(&self, title: &str) -> usize {
        self.calls.lock().unwrap().get(title).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, spec: &RowSpec) -> Result<GeneratedArticle, GenerationError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(spec.title.clone())
            .or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(&spec.title).copied().or(self.default_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&spec.title)
            .and_then(VecDeque::pop_front);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match failure {
            Some(e) => Err(e),
            None => Ok(echo_article(spec)),
        }
    }
}

/// Blocks the first call until released, so a test can act mid-job.
#[derive(Default)]
pub struct GatedGenerator {
    pub started: Notify,
    pub release: Notify,
    calls: AtomicUsize,
}

impl GatedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for GatedGenerator {
    async fn generate(&self, spec: &RowSpec) -> Result<GeneratedArticle, GenerationError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            self.release.notified().await;
        }
        Ok(echo_article(spec))
    }
}

/// Drops the results table when asked to generate `trigger`, so the store
/// cannot record that row.
pub struct SabotageGenerator {
    pub db: Database,
    pub trigger: String,
}

#[async_trait]
impl ContentGenerator for SabotageGenerator {
    async fn generate(&self, spec: &RowSpec) -> Result<GeneratedArticle, GenerationError> {
        if spec.title == self.trigger {
            self.db
                .with_conn(|conn| {
                    conn.execute_batch("DROP TABLE bulk_job_results;")?;
                    Ok(())
                })
                .unwrap();
        }
        Ok(echo_article(spec))
    }
}

/// Panics when asked to generate `trigger`, echoes everything else.
pub struct PanickingGenerator {
    pub trigger: String,
}

#[async_trait]
impl ContentGenerator for PanickingGenerator {
    async fn generate(&self, spec: &RowSpec) -> Result<GeneratedArticle, GenerationError> {
        if spec.title == self.trigger {
            panic!("model client exploded on {}", spec.title);
        }
        Ok(echo_article(spec))
    }
}
