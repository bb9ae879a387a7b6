//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the trace header name is a legal HTTP header name
//! - Check segment names fit the tracing backend's limits
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MiddlewareConfig → Result<(), Vec<ValidationError>>

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::MiddlewareConfig;

/// Longest segment name the tracing backend accepts.
pub const MAX_SEGMENT_NAME_LEN: usize = 200;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid trace header name {0:?}")]
    InvalidHeaderName(String),

    #[error("segment name must not be empty")]
    EmptySegmentName,

    #[error("segment name {0:?} exceeds 200 characters")]
    SegmentNameTooLong(String),

    #[error("timestamp format must not be empty")]
    EmptyTimestampFormat,

    #[error("dynamic naming pattern must not be empty")]
    EmptyNamingPattern,
}

/// Validate a loaded configuration.
pub fn validate_config(config: &MiddlewareConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if HeaderName::from_bytes(config.tracing.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName(
            config.tracing.header_name.clone(),
        ));
    }

    check_segment_name(&config.tracing.default_segment_name, &mut errors);

    if let Some(dynamic) = &config.tracing.dynamic_naming {
        check_segment_name(&dynamic.fallback, &mut errors);
        if dynamic.pattern.is_empty() {
            errors.push(ValidationError::EmptyNamingPattern);
        }
    }

    if config.logging.timestamp_format.is_empty() {
        errors.push(ValidationError::EmptyTimestampFormat);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_segment_name(name: &str, errors: &mut Vec<ValidationError>) {
    if name.is_empty() {
        errors.push(ValidationError::EmptySegmentName);
    } else if name.chars().count() > MAX_SEGMENT_NAME_LEN {
        errors.push(ValidationError::SegmentNameTooLong(name.to_string()));
    }
}
