pub mod cleaner;
pub mod segmenter;

pub use cleaner::*;
pub use segmenter::*;
