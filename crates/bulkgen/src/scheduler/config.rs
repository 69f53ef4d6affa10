use std::time::Duration;

use crate::config::Config;
use crate::matcher::DEFAULT_MIN_SIMILARITY;

use super::retry::RetryPolicy;

/// Runtime settings for [`BulkJobScheduler`](super::BulkJobScheduler).
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    pub retry: RetryPolicy,
    pub min_similarity: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            retry: RetryPolicy::default(),
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_count: config.scheduler.worker_count,
            retry: RetryPolicy {
                max_retries: config.scheduler.max_retries,
                base_delay: Duration::from_millis(config.scheduler.retry_base_delay_ms),
                max_delay: Duration::from_millis(config.scheduler.retry_max_delay_ms),
            },
            min_similarity: config.matching.min_similarity,
        }
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_maps_sections() {
        let mut config = Config::default();
        config.scheduler.worker_count = 5;
        config.scheduler.max_retries = 4;
        config.scheduler.retry_base_delay_ms = 100;
        config.matching.min_similarity = 0.35;

        let scheduler = SchedulerConfig::from_config(&config);
        assert_eq!(scheduler.worker_count, 5);
        assert_eq!(scheduler.retry.max_retries, 4);
        assert_eq!(scheduler.retry.base_delay, Duration::from_millis(100));
        assert_eq!(scheduler.min_similarity, 0.35);
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let from_config = SchedulerConfig::from_config(&Config::default());
        let default = SchedulerConfig::default();
        assert_eq!(from_config.worker_count, default.worker_count);
        assert_eq!(from_config.retry, default.retry);
    }
}
