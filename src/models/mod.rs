pub mod enums;
pub mod requirement;
pub mod validation;

pub use enums::RequirementType;
pub use requirement::{DocumentSegment, Requirement};
pub use validation::{BatchRow, BatchSummary, DocumentFailure, Spread, ValidationResult};
