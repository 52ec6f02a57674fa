//! HTTP exchange with one external processor.
//!
//! The request body is the full abnormal as JSON; a 2xx response body is the
//! candidate result, decoded as an abnormal. All processors share one
//! underlying connection pool configured for short-lived peers:
//!
//! - TLS certificates are not verified (processors serve self-signed certs)
//! - idle connections are never kept (no keep-alive reuse across calls)
//! - proxies from the environment are ignored
//!
//! The per-call timeout comes from the processor's own descriptor.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::error::ProcessorError;
use crate::api::{Abnormal, Processor, Scheme};

/// Timeout used when a processor declares none.
pub const DEFAULT_PROCESSOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Lower bound on a processor's declared timeout.
pub const MIN_PROCESSOR_TIMEOUT: Duration = Duration::from_secs(1);

/// Sends an abnormal to an external processor and returns its answer.
pub trait ProcessorTransport: Send + Sync + 'static {
    fn dispatch(
        &self,
        processor: &Processor,
        abnormal: &Abnormal,
    ) -> impl Future<Output = Result<Abnormal, ProcessorError>> + Send;
}

/// Builds the endpoint URL of a processor.
///
/// IPv6 hosts are bracketed and a path without a leading slash gets one.
pub fn format_url(scheme: Scheme, host: &str, port: u16, path: &str) -> String {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    let separator = if path.is_empty() || path.starts_with('/') {
        ""
    } else {
        "/"
    };
    format!("{}://{}:{}{}{}", scheme, host, port, separator, path)
}

/// Resolves a declared timeout: unset or zero means the default, anything
/// else is clamped to at least one second.
pub fn effective_timeout(timeout_seconds: Option<i32>) -> Duration {
    match timeout_seconds {
        None | Some(0) => DEFAULT_PROCESSOR_TIMEOUT,
        Some(secs) if secs < 1 => MIN_PROCESSOR_TIMEOUT,
        Some(secs) => Duration::from_secs(secs as u64),
    }
}

/// Processor transport over `reqwest`.
#[derive(Clone)]
pub struct ProcessorClient {
    http: reqwest::Client,
}

impl ProcessorClient {
    /// Creates a client with the shared processor transport settings.
    pub fn new() -> Result<Self, ProcessorError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .map_err(|e| ProcessorError::Client(e.to_string()))?;

        Ok(Self { http })
    }

    /// Endpoint URL of a processor, validated.
    pub fn endpoint(processor: &Processor) -> Result<reqwest::Url, ProcessorError> {
        let spec = &processor.spec;
        let url = format_url(spec.scheme, &spec.ip, spec.port, &spec.path);
        reqwest::Url::parse(&url).map_err(|e| ProcessorError::InvalidEndpoint {
            url,
            reason: e.to_string(),
        })
    }
}

impl ProcessorTransport for ProcessorClient {
    async fn dispatch(
        &self,
        processor: &Processor,
        abnormal: &Abnormal,
    ) -> Result<Abnormal, ProcessorError> {
        let url = Self::endpoint(processor)?;
        let timeout = effective_timeout(processor.spec.timeout_seconds);
        let url_text = url.to_string();

        debug!(
            processor = %processor.key(),
            abnormal = %abnormal.key(),
            url = %url_text,
            timeout_secs = timeout.as_secs(),
            "Dispatching abnormal to processor"
        );

        let response = self
            .http
            .post(url)
            .timeout(timeout)
            .json(abnormal)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProcessorError::Timeout {
                        url: url_text.clone(),
                        timeout,
                    }
                } else {
                    ProcessorError::Request {
                        url: url_text.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProcessorError::Status {
                url: url_text,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| ProcessorError::Request {
            url: url_text.clone(),
            message: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|e| ProcessorError::Decode {
            url: url_text,
            message: e.to_string(),
        })
    }
}
