pub mod types;
pub mod settings;
pub mod errors;
pub mod error;


// Re-export error types for convenience
pub use error::{AppError, AppResult};
pub use errors::{ConversionError, ConversionResult};
