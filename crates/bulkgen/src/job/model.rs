use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generator::EnrichedArticle;
use crate::spreadsheet::{Language, Tone};

/// Lifecycle state of a bulk job.
///
/// `Completed` means every row has a result, whether or not it succeeded.
/// `Failed` is reserved for pipeline faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Generation settings fixed when a job is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSettings {
    /// Applied to rows that do not name a tone.
    pub tone: Tone,
    /// Applied to rows that do not name a language.
    pub language: Language,
    pub include_images: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            tone: Tone::default(),
            language: Language::default(),
            include_images: true,
        }
    }
}

/// Final result of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RowOutcome {
    Success { article: EnrichedArticle },
    Failure { reason: String },
}

impl RowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            RowOutcome::Failure { reason } => Some(reason),
            RowOutcome::Success { .. } => None,
        }
    }
}

/// A bulk job and everything recorded for it so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJob {
    pub id: String,
    pub file_name: String,
    pub status: JobStatus,
    pub total_articles: usize,
    pub completed_articles: usize,
    pub failed_articles: usize,
    pub settings: JobSettings,
    /// Index-aligned with the spreadsheet rows; `None` until recorded.
    pub results: Vec<Option<RowOutcome>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl BulkJob {
    pub fn new(id: String, file_name: String, total_articles: usize, settings: JobSettings) -> Self {
        let now = Utc::now();
        Self {
            id,
            file_name,
            status: JobStatus::Pending,
            total_articles,
            completed_articles: 0,
            failed_articles: 0,
            settings,
            results: vec![None; total_articles],
            fault: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn resolved(&self) -> usize {
        self.completed_articles + self.failed_articles
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            file_name: self.file_name.clone(),
            status: self.status,
            total_articles: self.total_articles,
            completed_articles: self.completed_articles,
            failed_articles: self.failed_articles,
            fault: self.fault.clone(),
        }
    }
}

/// The status read model exposed while a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub file_name: String,
    pub status: JobStatus,
    pub total_articles: usize,
    pub completed_articles: usize,
    pub failed_articles: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

/// What a record call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The result was stored. `finished` is set when it resolved the last row.
    Recorded { finished: bool },
    /// A result already existed for the row; nothing changed.
    AlreadyRecorded,
}
