//! Execution settings.

use std::time::Duration;

use crate::variables::DEFAULT_MAX_ATTEMPTS;

/// Settings shared by every execution a controller runs.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Timeout for a whole query/mutation exchange.
    pub request_timeout: Duration,
    /// Timeout for establishing a connection (both kinds).
    pub connect_timeout: Duration,
    /// Capacity of the event channel between the driver and the consumer.
    pub event_buffer: usize,
    /// Prompts per variable before the operation is abandoned.
    pub max_prompt_attempts: u32,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            event_buffer: 64,
            max_prompt_attempts: DEFAULT_MAX_ATTEMPTS,
            user_agent: format!("gqlnb/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ExecutionConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_prompt_attempts(mut self, attempts: u32) -> Self {
        self.max_prompt_attempts = attempts;
        self
    }
}
