//! Utility modules shared by the sources and the binary.
//!
//! - [`HttpClient`]: shared `reqwest` client with timeouts, status mapping and retries
//! - [`RetryConfig`] / [`with_retry`]: exponential backoff for transient HTTP failures
//! - [`write_atomic`]: replace a file without leaving it half-written

mod fs;
mod http;
mod retry;

pub use fs::write_atomic;
pub use http::{check_status, HttpClient, DEFAULT_TIMEOUT};
pub use retry::{source_retry_config, with_retry, RetryConfig, TransientError};
