//! Media containers and published media
//!
//! A container is the server-side staging object for not-yet-published
//! media. Its status only advances through polling:
//!
//! ```text
//! created ──► processing ──► finished   (publishable)
//!    │             │
//!    └─────────────┴───────► error | timed_out
//! ```
//!
//! `finished`, `error` and `timed_out` are terminal.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Maximum caption length accepted by the remote
pub const MAX_CAPTION_CHARS: usize = 2200;

/// Accepted carousel size range
pub const CAROUSEL_MIN_ITEMS: usize = 2;
pub const CAROUSEL_MAX_ITEMS: usize = 10;

/// What a container stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Image,
    Video,
    CarouselChild,
    CarouselParent,
}

/// Processing status of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    #[default]
    Created,
    Processing,
    Finished,
    Error,
    TimedOut,
}

impl ContainerStatus {
    /// Maps a remote `status_code` to a status.
    ///
    /// Only `FINISHED` is publishable. `ERROR` and `EXPIRED` never recover.
    /// Anything else (`IN_PROGRESS`, `PUBLISHED`, unknown codes) keeps the
    /// container in processing so the poller continues.
    pub fn from_status_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "FINISHED" => ContainerStatus::Finished,
            "ERROR" | "EXPIRED" => ContainerStatus::Error,
            _ => ContainerStatus::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContainerStatus::Finished | ContainerStatus::Error | ContainerStatus::TimedOut
        )
    }

    pub fn is_publishable(&self) -> bool {
        matches!(self, ContainerStatus::Finished)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Processing => "processing",
            ContainerStatus::Finished => "finished",
            ContainerStatus::Error => "error",
            ContainerStatus::TimedOut => "timed_out",
        }
    }
}

impl Display for ContainerStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A container created on the remote and tracked through polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaContainer {
    creation_id: String,
    kind: ContainerKind,
    status: ContainerStatus,
}

impl MediaContainer {
    pub fn new(creation_id: impl Into<String>, kind: ContainerKind) -> Self {
        Self {
            creation_id: creation_id.into(),
            kind,
            status: ContainerStatus::Created,
        }
    }

    pub fn creation_id(&self) -> &str {
        &self.creation_id
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn status(&self) -> ContainerStatus {
        self.status
    }

    /// Checks if a transition to `target` is allowed
    pub fn can_transition_to(&self, target: ContainerStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        match (self.status, target) {
            (_, ContainerStatus::Created) => false,
            (ContainerStatus::Created, _) => true,
            (ContainerStatus::Processing, _) => true,
            _ => false,
        }
    }

    /// Applies an observed status
    pub fn transition_to(&mut self, target: ContainerStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.status.name().to_string(),
                to: target.name().to_string(),
            });
        }
        self.status = target;
        Ok(())
    }

    /// Applies a remote `status_code` observation
    pub fn observe(&mut self, status_code: &str) -> Result<ContainerStatus, DomainError> {
        let next = ContainerStatus::from_status_code(status_code);
        self.transition_to(next)?;
        Ok(next)
    }

    /// Marks the container as timed out after polling was exhausted
    pub fn time_out(&mut self) -> Result<(), DomainError> {
        self.transition_to(ContainerStatus::TimedOut)
    }
}

/// Terminal artifact of a successful publish call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedMedia {
    pub media_id: String,
    pub status: String,
}

impl PublishedMedia {
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            status: "published".to_string(),
        }
    }
}

/// Kind of media inside a carousel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarouselMediaKind {
    Image,
    Video,
}

/// One carousel entry: a publicly reachable media URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselItem {
    pub url: String,
    pub kind: CarouselMediaKind,
}

impl CarouselItem {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: CarouselMediaKind::Image,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: CarouselMediaKind::Video,
        }
    }
}

// ============================================================================
// Input validation
// ============================================================================

/// Rejects anything that is not an absolute http(s) URL
pub fn validate_media_url(url: &str) -> Result<(), DomainError> {
    let trimmed = url.trim();
    let has_scheme = trimmed.starts_with("https://") || trimmed.starts_with("http://");
    let host = trimmed.split("://").nth(1).unwrap_or_default();
    if !has_scheme || host.is_empty() || host.starts_with('/') {
        return Err(DomainError::InvalidMediaUrl(url.to_string()));
    }
    Ok(())
}

pub fn validate_caption(caption: Option<&str>) -> Result<(), DomainError> {
    if let Some(text) = caption {
        let len = text.chars().count();
        if len > MAX_CAPTION_CHARS {
            return Err(DomainError::CaptionTooLong(len));
        }
    }
    Ok(())
}

pub fn validate_carousel(items: &[CarouselItem]) -> Result<(), DomainError> {
    if !(CAROUSEL_MIN_ITEMS..=CAROUSEL_MAX_ITEMS).contains(&items.len()) {
        return Err(DomainError::InvalidCarouselSize(items.len()));
    }
    for item in items {
        validate_media_url(&item.url)?;
    }
    Ok(())
}
