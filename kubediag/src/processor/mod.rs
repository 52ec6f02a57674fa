//! External processors reached over HTTP.

mod client;
mod error;

pub use client::{
    effective_timeout, format_url, ProcessorClient, ProcessorTransport,
    DEFAULT_PROCESSOR_TIMEOUT, MIN_PROCESSOR_TIMEOUT,
};
pub use error::ProcessorError;
