//! Domain entities and business logic
//!
//! This module contains the core domain types for Instagraph:
//! - Credentials and pending OAuth challenges
//! - Media containers, their status state machine and published media
//! - Insights metric sets, periods and the top-posts ranking
//! - Domain-specific error types

pub mod credential;
pub mod errors;
pub mod insights;
pub mod media;

// Re-export commonly used types
pub use credential::{Credential, CredentialSummary, PendingAuthChallenge};
pub use errors::DomainError;
pub use insights::{
    engagement_score, rank_top_posts, MetricSet, Period, TopPostItem, ACCOUNT_METRICS,
    MEDIA_METRICS,
};
pub use media::{
    CarouselItem, CarouselMediaKind, ContainerKind, ContainerStatus, MediaContainer,
    PublishedMedia,
};
