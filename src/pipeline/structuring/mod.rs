pub mod client;
pub mod parser;
pub mod prompt;
pub mod retry;
pub mod types;

pub use client::*;
pub use parser::*;
pub use prompt::*;
pub use retry::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Extraction service is not reachable at {0}")]
    ServiceUnreachable(String),

    #[error("Extraction service returned error (status {status}): {body}")]
    ServiceStatus { status: u16, body: String },

    #[error("Extraction service timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Extraction service failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("No API key configured for the extraction service")]
    NotConfigured,

    #[error("Malformed service response: {0}")]
    MalformedResponse(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

impl StructuringError {
    /// Transient failures worth another attempt: connection, timeout,
    /// throttling and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ServiceUnreachable(_) | Self::Timeout(_) | Self::HttpClient(_) => true,
            Self::ServiceStatus { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
