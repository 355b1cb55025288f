use serde::Serialize;
use thiserror::Error;

use super::errors::ConversionError;

#[derive(Error, Debug, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Conversion Error: {0}")]
    Conversion(ConversionError),

    #[error("Session Error: {0}")]
    Session(String),

    #[error("Settings Error: {0}")]
    Settings(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("Serialization error: {}", err))
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        AppError::Conversion(err)
    }
}

// Helper for command results
pub type AppResult<T> = Result<T, AppError>;
