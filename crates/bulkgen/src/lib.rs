pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod images;
pub mod job;
pub mod matcher;
pub mod pipeline;
pub mod progress;
pub mod sanitize;
pub mod scheduler;
pub mod secrets;
pub mod spreadsheet;
pub mod telemetry;

pub use config::{load_config, Config};
pub use error::{BulkgenError, ConfigError, ParseError, Result, ValidationError};
pub use generator::{
    ContentGenerator, EnrichedArticle, GeneratedArticle, GenerationError, HttpGenerator,
};
pub use images::{load_image_dir, ImagePool, PoolImage};
pub use job::{BulkJob, BulkJobStore, JobSettings, JobStatus, JobSummary, RowOutcome};
pub use matcher::ImageMatcher;
pub use pipeline::{open_job_store, BulkPipeline, JobHandle};
pub use progress::{JobEvent, JobEventKind, ProgressBroadcaster};
pub use scheduler::{BulkJobScheduler, RetryPolicy, SchedulerConfig};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use spreadsheet::{Language, ParsedRow, RowSpec, SpreadsheetParser, Tone};
