pub mod assembler;
pub mod labels;
pub mod polygon;
pub mod validate;

pub use assembler::{DEFAULT_CONFIDENCE_THRESHOLD, PredictionAssembler};
pub use labels::ClassLabelTable;
pub use validate::{ValidationError, validate_response};
