//! Retry-on-status policy for search requests

use reqwest::StatusCode;

/// Retry a request only when its response status is in `statuses`, at most
/// `max_retries` times. Transport errors and other statuses are final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            max_retries,
            statuses: statuses.into_iter().collect(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_retryable(&self, status: StatusCode) -> bool {
        self.statuses.contains(&status.as_u16())
    }

    /// `retries_done` counts retries already made, not attempts.
    pub fn should_retry(&self, status: StatusCode, retries_done: u32) -> bool {
        retries_done < self.max_retries && self.is_retryable(status)
    }
}
