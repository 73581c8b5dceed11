//! Media provider port (driven/secondary port)
//!
//! This module defines the interface the excluded CLI layer talks to. The
//! primary implementation targets the Instagram Graph API, but callers only
//! see this trait and the [`Outcome`] envelope.
//!
//! ## Design Notes
//!
//! - Every method returns an [`Outcome`] instead of `Result`: expected
//!   failures are data, not control flow, at this boundary.
//! - Request and response structs here are port-level DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    CarouselItem, ContainerStatus, CredentialSummary, MetricSet, Period, PublishedMedia,
    TopPostItem,
};
use crate::outcome::Outcome;
use crate::ports::credential_store::ProviderContext;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishPhotoRequest {
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishVideoRequest {
    pub video_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Whether the reel also appears in the main feed
    #[serde(default)]
    pub share_to_feed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishCarouselRequest {
    pub items: Vec<CarouselItem>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Token supplied directly instead of through the OAuth flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTokenRequest {
    pub access_token: String,
    pub ig_user_id: String,
    #[serde(default)]
    pub scope: Vec<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Authorization URL issued by `auth.start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStart {
    pub login_url: String,
    pub state: String,
    pub redirect_uri: String,
}

/// One media object as listed by the remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub id: String,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub like_count: Option<i64>,
    #[serde(default)]
    pub comments_count: Option<i64>,
}

/// One page of media
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPage {
    pub items: Vec<MediaSummary>,
    /// Opaque cursor for the following page
    pub after: Option<String>,
    /// Next-page URL with token-bearing parameters redacted
    pub next: Option<String>,
}

impl MediaPage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            after: None,
            next: None,
        }
    }
}

/// Current processing status of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatusReport {
    pub creation_id: String,
    pub status: ContainerStatus,
    /// Raw remote `status_code`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
}

// ============================================================================
// IMediaProvider trait
// ============================================================================

/// Port trait for media publishing and analytics
#[async_trait::async_trait]
pub trait IMediaProvider: Send + Sync {
    /// Issues a PKCE authorization URL and records the pending challenge
    async fn auth_start(
        &self,
        ctx: &ProviderContext,
        redirect_uri: Option<&str>,
    ) -> Outcome<AuthStart>;

    /// Completes the OAuth callback and stores the resulting credential
    async fn auth_finish(
        &self,
        ctx: &ProviderContext,
        code: &str,
        state: &str,
    ) -> Outcome<CredentialSummary>;

    /// Stores a caller-supplied token as the account credential
    async fn auth_set_token(
        &self,
        ctx: &ProviderContext,
        request: SetTokenRequest,
    ) -> Outcome<CredentialSummary>;

    /// Reports the stored credential without exposing the token
    async fn auth_status(&self, ctx: &ProviderContext) -> Outcome<CredentialSummary>;

    /// Fetches the account profile
    async fn account_profile(&self, ctx: &ProviderContext) -> Outcome<Value>;

    /// Lists recent media, one page at a time
    async fn list_media(
        &self,
        ctx: &ProviderContext,
        limit: u32,
        after: Option<&str>,
    ) -> Outcome<MediaPage>;

    async fn publish_photo(
        &self,
        ctx: &ProviderContext,
        request: PublishPhotoRequest,
    ) -> Outcome<PublishedMedia>;

    async fn publish_video(
        &self,
        ctx: &ProviderContext,
        request: PublishVideoRequest,
    ) -> Outcome<PublishedMedia>;

    async fn publish_carousel(
        &self,
        ctx: &ProviderContext,
        request: PublishCarouselRequest,
    ) -> Outcome<PublishedMedia>;

    /// One-shot status check of a container
    async fn container_status(
        &self,
        ctx: &ProviderContext,
        creation_id: &str,
    ) -> Outcome<ContainerStatusReport>;

    async fn media_insights(&self, ctx: &ProviderContext, media_id: &str) -> Outcome<MetricSet>;

    async fn account_insights(&self, ctx: &ProviderContext, period: Period) -> Outcome<MetricSet>;

    /// Ranks media newer than `days` by engagement score
    async fn top_posts(
        &self,
        ctx: &ProviderContext,
        days: u32,
        limit: usize,
    ) -> Outcome<Vec<TopPostItem>>;
}
