//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates or in
//! the caller.
//!
//! ## Ports Overview
//!
//! - [`ICredentialStore`] - Account-scoped credential and OAuth challenge storage
//! - [`IMediaProvider`] - Publishing and analytics operations returning [`Outcome`]s
//!
//! [`Outcome`]: crate::outcome::Outcome

pub mod credential_store;
pub mod media_provider;

pub use credential_store::{ICredentialStore, MemoryCredentialStore, ProviderContext};
pub use media_provider::{
    AuthStart, ContainerStatusReport, IMediaProvider, MediaPage, MediaSummary,
    PublishCarouselRequest, PublishPhotoRequest, PublishVideoRequest, SetTokenRequest,
};
