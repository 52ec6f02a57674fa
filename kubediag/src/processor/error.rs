//! Error types for external processor calls.

use std::time::Duration;

use thiserror::Error;

/// Reasons a processor call produced no usable result.
///
/// Every variant means the same thing to the engine: this processor is not
/// viable for this abnormal, try the next one.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The descriptor does not form a valid URL.
    #[error("invalid processor endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Connection or transfer failure.
    #[error("HTTP request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// No response within the processor's timeout.
    #[error("HTTP request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The processor answered with a non-2xx status.
    #[error("processor at {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body is not an abnormal.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}
