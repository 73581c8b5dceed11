//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and invalid container state transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Media URL is not an absolute http(s) URL
    #[error("Invalid media URL: {0}")]
    InvalidMediaUrl(String),

    /// Caption exceeds the remote length limit
    #[error("Caption too long: {0} characters (max 2200)")]
    CaptionTooLong(usize),

    /// Carousel item count outside the accepted range
    #[error("Carousel must contain between 2 and 10 items, got {0}")]
    InvalidCarouselSize(usize),

    /// Unknown insights period
    #[error("Invalid period: {0} (expected day, week or month)")]
    InvalidPeriod(String),

    /// Unknown container status code reported by the remote
    #[error("Unknown container status: {0}")]
    UnknownStatus(String),
}
