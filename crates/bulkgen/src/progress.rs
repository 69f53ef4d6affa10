//! Real-time progress events for running bulk jobs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::JobSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    JobStarted,
    RowStarted,
    RowRetrying,
    RowSucceeded,
    RowFailed,
    JobFinished,
    JobFaulted,
}

impl std::fmt::Display for JobEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobEventKind::JobStarted => write!(f, "Job started"),
            JobEventKind::RowStarted => write!(f, "Row started"),
            JobEventKind::RowRetrying => write!(f, "Row retrying"),
            JobEventKind::RowSucceeded => write!(f, "Row succeeded"),
            JobEventKind::RowFailed => write!(f, "Row failed"),
            JobEventKind::JobFinished => write!(f, "Job finished"),
            JobEventKind::JobFaulted => write!(f, "Job faulted"),
        }
    }
}

/// One progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    pub kind: JobEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    pub message: String,
    /// Counters after the event, when it changed them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<JobSummary>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job_id: &str, kind: JobEventKind, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind,
            row_index: None,
            message: message.into(),
            summary: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_row(mut self, index: usize) -> Self {
        self.row_index = Some(index);
        self
    }

    pub fn with_summary(mut self, summary: JobSummary) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// Fans job events out to any number of subscribers.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobEvent) {
        // No active receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = ProgressBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        broadcaster.send(JobEvent::new("j1", JobEventKind::RowFailed, "cancelled").for_row(2));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id, "j1");
        assert_eq!(event.kind, JobEventKind::RowFailed);
        assert_eq!(event.row_index, Some(2));
    }

    #[test]
    fn test_send_without_subscribers_is_ok() {
        let broadcaster = ProgressBroadcaster::default();
        broadcaster.send(JobEvent::new("j1", JobEventKind::JobStarted, "start"));
    }

    #[test]
    fn test_event_serializes_snake_case_kind() {
        let event = JobEvent::new("j1", JobEventKind::JobFinished, "done");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "job_finished");
        assert_eq!(json["jobId"], "j1");
        assert!(json.get("rowIndex").is_none());
    }
}
