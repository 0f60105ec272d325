pub mod aggregate;
pub mod orchestrator;
pub mod rubric;

pub use aggregate::*;
pub use orchestrator::*;
pub use rubric::*;

use thiserror::Error;

use crate::pipeline::import::ImportError;

/// Document-level failure. Carries the document name so batch output can
/// point at the file.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to import {document}: {source}")]
    Import {
        document: String,
        #[source]
        source: ImportError,
    },

    #[error("Failed to segment {document}: {reason}")]
    Segmentation { document: String, reason: String },

    #[error("Validation task for {document} failed: {reason}")]
    TaskFailed { document: String, reason: String },
}

impl DocumentError {
    pub fn document(&self) -> &str {
        match self {
            Self::Import { document, .. }
            | Self::Segmentation { document, .. }
            | Self::TaskFailed { document, .. } => document,
        }
    }
}
