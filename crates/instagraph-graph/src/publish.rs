//! Media publish engine
//!
//! Publishing is a two-step protocol: create a container on the remote, then
//! publish it by `creation_id`. Videos and carousels need the container to
//! finish server-side processing first, so the engine polls its status in
//! between.
//!
//! ## Retry policy
//!
//! Only the final publish call is retried, and only for `media_not_ready`
//! and `rate_limited` failures, following a fixed backoff schedule
//! (15 s, 45 s, 120 s by default). An action block returns immediately.
//! Container creation and status polls are never retried.
//!
//! All waits go through a [`Sleeper`] so tests can record delays instead of
//! sleeping.

use std::time::Duration;

use async_trait::async_trait;
use instagraph_core::config::PublishConfig;
use instagraph_core::domain::media::{validate_caption, validate_carousel, validate_media_url};
use instagraph_core::domain::{
    CarouselItem, CarouselMediaKind, ContainerKind, ContainerStatus, MediaContainer,
    PublishedMedia,
};
use instagraph_core::ports::ContainerStatusReport;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classify::FailureKind;
use crate::client::{GraphClient, JsonObject};
use crate::GraphError;

// ============================================================================
// Sleeper
// ============================================================================

/// Cooperative wait used between polls and retries
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// Policies
// ============================================================================

/// How long to wait for a container to finish processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 24,
            interval: Duration::from_millis(5_000),
        }
    }
}

impl From<&PublishConfig> for PollPolicy {
    fn from(config: &PublishConfig) -> Self {
        Self {
            max_attempts: config.poll_max_attempts,
            interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Backoff schedule for the publish call; one retry per entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Vec<Duration>,
}

impl RetryPolicy {
    /// Total publish attempts, the first one included
    pub fn max_attempts(&self) -> usize {
        self.backoff.len() + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: [15_000, 45_000, 120_000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

impl From<&PublishConfig> for RetryPolicy {
    fn from(config: &PublishConfig) -> Self {
        Self {
            backoff: config
                .retry_backoff_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

// ============================================================================
// PublishEngine
// ============================================================================

/// Drives container creation, readiness polling and publishing for one
/// Instagram account
pub struct PublishEngine<'a> {
    client: &'a GraphClient,
    access_token: &'a str,
    ig_user_id: &'a str,
    poll: PollPolicy,
    retry: RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> PublishEngine<'a> {
    pub fn new(
        client: &'a GraphClient,
        access_token: &'a str,
        ig_user_id: &'a str,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            client,
            access_token,
            ig_user_id,
            poll: PollPolicy::default(),
            retry: RetryPolicy::default(),
            sleeper,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // ------------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------------

    /// Creates a container with the given parameters
    pub async fn create_container(
        &self,
        kind: ContainerKind,
        params: &[(&str, String)],
    ) -> Result<MediaContainer, GraphError> {
        let path = format!("/{}/media", self.ig_user_id);
        let body = self
            .client
            .post(&path, params, Some(self.access_token))
            .await
            .map_err(|failure| {
                if failure.kind == FailureKind::ActionBlocked {
                    warn!(ig_user_id = self.ig_user_id, "Container creation blocked by remote");
                }
                failure
            })?;

        let creation_id = id_field(&body, "container creation")?;
        debug!(creation_id, ?kind, "Created media container");
        Ok(MediaContainer::new(creation_id, kind))
    }

    /// Reads the current status of a container once
    pub async fn fetch_status(&self, creation_id: &str) -> Result<ContainerStatusReport, GraphError> {
        let body = self.status_body(creation_id).await?;
        let status_code = body
            .get("status_code")
            .and_then(Value::as_str)
            .map(str::to_string);
        let status = status_code
            .as_deref()
            .map(ContainerStatus::from_status_code)
            .unwrap_or(ContainerStatus::Processing);

        Ok(ContainerStatusReport {
            creation_id: creation_id.to_string(),
            status,
            status_code,
        })
    }

    async fn status_body(&self, creation_id: &str) -> Result<JsonObject, GraphError> {
        Ok(self
            .client
            .get(
                &format!("/{creation_id}"),
                &[("fields", "status_code,status".to_string())],
                Some(self.access_token),
            )
            .await?)
    }

    /// Polls until the container is `finished`, failed, or attempts run out
    ///
    /// Sleeps only between polls. A transport failure during a poll aborts
    /// the wait.
    pub async fn wait_for_ready(
        &self,
        mut container: MediaContainer,
    ) -> Result<MediaContainer, GraphError> {
        let max_attempts = self.poll.max_attempts;

        for attempt in 1..=max_attempts {
            let body = self.status_body(container.creation_id()).await?;
            let status_code = body
                .get("status_code")
                .and_then(Value::as_str)
                .unwrap_or("IN_PROGRESS");

            match container.observe(status_code)? {
                ContainerStatus::Finished => {
                    debug!(creation_id = container.creation_id(), attempt, "Container ready");
                    return Ok(container);
                }
                ContainerStatus::Error => {
                    warn!(
                        creation_id = container.creation_id(),
                        status_code, "Container processing failed"
                    );
                    return Err(GraphError::ContainerFailed {
                        creation_id: container.creation_id().to_string(),
                        status_code: status_code.to_string(),
                        status: body.get("status").and_then(Value::as_str).map(str::to_string),
                    });
                }
                _ => {
                    debug!(
                        creation_id = container.creation_id(),
                        attempt, max_attempts, status_code, "Container still processing"
                    );
                }
            }

            if attempt < max_attempts {
                self.sleeper.sleep(self.poll.interval).await;
            }
        }

        container.time_out()?;
        warn!(
            creation_id = container.creation_id(),
            attempts = max_attempts,
            "Container not ready before polling gave up"
        );
        Err(GraphError::ContainerTimedOut {
            creation_id: container.creation_id().to_string(),
            attempts: max_attempts,
        })
    }

    /// Publishes a container, retrying on `media_not_ready`/`rate_limited`
    pub async fn publish(&self, creation_id: &str) -> Result<PublishedMedia, GraphError> {
        let path = format!("/{}/media_publish", self.ig_user_id);
        let params = [("creation_id", creation_id.to_string())];
        let mut delays = self.retry.backoff.iter();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let failure = match self.client.post(&path, &params, Some(self.access_token)).await {
                Ok(body) => {
                    let media_id = id_field(&body, "media_publish")?;
                    info!(creation_id, media_id, attempt, "Media published");
                    return Ok(PublishedMedia::new(media_id));
                }
                Err(failure) => failure,
            };

            if failure.kind == FailureKind::ActionBlocked {
                warn!(creation_id, "Publish blocked by remote; not retrying");
                return Err(failure.into());
            }

            if !failure.is_retryable() {
                return Err(failure.into());
            }

            let Some(delay) = delays.next() else {
                warn!(creation_id, attempts = attempt, kind = %failure.kind, "Publish retries exhausted");
                return Err(failure.into());
            };

            info!(
                creation_id,
                attempt,
                kind = %failure.kind,
                delay_ms = delay.as_millis() as u64,
                "Publish not accepted yet, backing off"
            );
            self.sleeper.sleep(*delay).await;
        }
    }

    // ------------------------------------------------------------------------
    // Flows
    // ------------------------------------------------------------------------

    /// Single image: create, then publish without waiting
    pub async fn publish_photo(
        &self,
        image_url: &str,
        caption: Option<&str>,
    ) -> Result<PublishedMedia, GraphError> {
        validate_media_url(image_url)?;
        validate_caption(caption)?;

        let mut params = vec![("image_url", image_url.to_string())];
        push_caption(&mut params, caption);

        let container = self.create_container(ContainerKind::Image, &params).await?;
        self.publish(container.creation_id()).await
    }

    /// Video as a reel: create, wait for processing, then publish
    pub async fn publish_video(
        &self,
        video_url: &str,
        caption: Option<&str>,
        cover_url: Option<&str>,
        share_to_feed: Option<bool>,
    ) -> Result<PublishedMedia, GraphError> {
        validate_media_url(video_url)?;
        validate_caption(caption)?;
        if let Some(cover) = cover_url {
            validate_media_url(cover)?;
        }

        let mut params = vec![
            ("media_type", "REELS".to_string()),
            ("video_url", video_url.to_string()),
        ];
        push_caption(&mut params, caption);
        if let Some(cover) = cover_url {
            params.push(("cover_url", cover.to_string()));
        }
        if let Some(share) = share_to_feed {
            params.push(("share_to_feed", share.to_string()));
        }

        let container = self.create_container(ContainerKind::Video, &params).await?;
        let container = self.wait_for_ready(container).await?;
        self.publish(container.creation_id()).await
    }

    /// Carousel: children one at a time, each waited on, then the parent
    ///
    /// The first child failure aborts; later children and the parent are
    /// never created.
    pub async fn publish_carousel(
        &self,
        items: &[CarouselItem],
        caption: Option<&str>,
    ) -> Result<PublishedMedia, GraphError> {
        validate_carousel(items)?;
        validate_caption(caption)?;

        let mut children = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let mut params = vec![("is_carousel_item", "true".to_string())];
            match item.kind {
                CarouselMediaKind::Image => params.push(("image_url", item.url.clone())),
                CarouselMediaKind::Video => {
                    params.push(("media_type", "VIDEO".to_string()));
                    params.push(("video_url", item.url.clone()));
                }
            }

            let child = self
                .create_container(ContainerKind::CarouselChild, &params)
                .await?;
            let child = self.wait_for_ready(child).await?;
            debug!(index, creation_id = child.creation_id(), "Carousel child ready");
            children.push(child.creation_id().to_string());
        }

        let mut params = vec![
            ("media_type", "CAROUSEL".to_string()),
            ("children", children.join(",")),
        ];
        push_caption(&mut params, caption);

        let parent = self
            .create_container(ContainerKind::CarouselParent, &params)
            .await?;
        let parent = self.wait_for_ready(parent).await?;
        self.publish(parent.creation_id()).await
    }
}

fn push_caption(params: &mut Vec<(&str, String)>, caption: Option<&str>) {
    if let Some(caption) = caption.filter(|c| !c.is_empty()) {
        params.push(("caption", caption.to_string()));
    }
}

/// Reads the `id` of a creation/publish response
fn id_field(body: &JsonObject, context: &str) -> Result<String, GraphError> {
    match body.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(GraphError::InvalidResponse(format!(
            "{context} response has no id"
        ))),
    }
}
