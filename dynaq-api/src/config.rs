use dynaq_core::builder::{MAX_BATCH_GET, MAX_BATCH_WRITE};
use dynaq_core::{Error, Result, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Executor configuration for retries, batching and fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Backoff for throttled calls and unprocessed batch entries
    pub retry: RetryPolicy,

    /// Keys per BatchGetItem call (at most 100)
    pub batch_get_size: usize,

    /// Requests per BatchWriteItem call (at most 25)
    pub batch_write_size: usize,

    /// Writes in flight at once for `write_all`
    pub write_concurrency: usize,

    /// Page size for queries and scans that set no limit (None = store default)
    pub default_page_size: Option<u32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            batch_get_size: MAX_BATCH_GET,
            batch_write_size: MAX_BATCH_WRITE,
            write_concurrency: 8,
            default_page_size: None,
        }
    }
}

impl ExecutorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ExecutorConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("invalid executor config: {}", e)))?;
        config.validate().map_err(Error::InvalidArgument)?;
        Ok(config)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_get_size(mut self, size: usize) -> Self {
        self.batch_get_size = size;
        self
    }

    pub fn with_batch_write_size(mut self, size: usize) -> Self {
        self.batch_write_size = size;
        self
    }

    pub fn with_write_concurrency(mut self, concurrency: usize) -> Self {
        self.write_concurrency = concurrency;
        self
    }

    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = Some(size);
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.retry.validate()?;

        if self.batch_get_size == 0 || self.batch_get_size > MAX_BATCH_GET {
            return Err(format!("batch_get_size must be between 1 and {}", MAX_BATCH_GET));
        }

        if self.batch_write_size == 0 || self.batch_write_size > MAX_BATCH_WRITE {
            return Err(format!("batch_write_size must be between 1 and {}", MAX_BATCH_WRITE));
        }

        if self.write_concurrency == 0 {
            return Err("write_concurrency must be greater than 0".to_string());
        }

        if self.default_page_size == Some(0) {
            return Err("default_page_size must be greater than 0 when set".to_string());
        }

        Ok(())
    }
}
