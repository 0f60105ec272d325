pub mod store;

pub use store::*;

use thiserror::Error;

use crate::models::{DocumentSegment, Requirement};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Memoized extract+evaluate outcome per segment.
///
/// Implementations must tolerate concurrent reads and concurrent writes to
/// distinct keys; writes replace whole entries.
pub trait SegmentCache: Send + Sync {
    fn get(&self, segment: &DocumentSegment) -> Result<Option<Vec<Requirement>>, CacheError>;
    fn put(&self, segment: &DocumentSegment, requirements: &[Requirement]) -> Result<(), CacheError>;
}
