//! # Application Error Types
//!
//! This module defines the error types used throughout the captcha solving
//! pipeline. Each variant corresponds to one failure mode of a solving
//! attempt; an unsolvable expression is deliberately *not* an error (see
//! [`crate::solver::Solution`]) since the caller is expected to fall back
//! to manual entry rather than treat it as a fault.

use std::fmt;

/// Errors produced by the captcha solving pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Malformed image bytes; fatal to the attempt, never retried by the core
    Decode(String),
    /// OCR engine fault; retry policy belongs to the caller
    Recognition(String),
    /// Correction store read/write failure
    Persistence(String),
    /// Configuration validation errors
    Config(String),
    /// Remote service/session errors
    Session(String),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Decode(msg) => write!(f, "[DECODE] {}", msg),
            SolverError::Recognition(msg) => write!(f, "[RECOGNITION] {}", msg),
            SolverError::Persistence(msg) => write!(f, "[PERSISTENCE] {}", msg),
            SolverError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            SolverError::Session(msg) => write!(f, "[SESSION] {}", msg),
        }
    }
}

impl std::error::Error for SolverError {}

impl From<anyhow::Error> for SolverError {
    fn from(err: anyhow::Error) -> Self {
        SolverError::Recognition(err.to_string())
    }
}

impl From<serde_json::Error> for SolverError {
    fn from(err: serde_json::Error) -> Self {
        SolverError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for SolverError {
    fn from(err: std::io::Error) -> Self {
        SolverError::Persistence(err.to_string())
    }
}

/// Result type alias for convenience
pub type SolverResult<T> = Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_tag() {
        let err = SolverError::Decode("truncated JPEG".to_string());
        assert_eq!(err.to_string(), "[DECODE] truncated JPEG");

        let err = SolverError::Recognition("engine fault".to_string());
        assert!(err.to_string().starts_with("[RECOGNITION]"));
    }

    #[test]
    fn test_from_anyhow_maps_to_recognition() {
        let err: SolverError = anyhow::anyhow!("tesseract crashed").into();
        assert!(matches!(err, SolverError::Recognition(_)));
    }
}
