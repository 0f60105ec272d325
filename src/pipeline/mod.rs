pub mod import;
pub mod segmentation;
pub mod structuring;
pub mod cache;
pub mod validation;
pub mod report;
