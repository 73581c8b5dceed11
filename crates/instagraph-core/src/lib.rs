//! Instagraph Core - Domain logic and boundary contracts
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Credential`, `PendingAuthChallenge`, `MediaContainer`,
//!   `PublishedMedia`, `MetricSet`, `TopPostItem`
//! - **Result envelope** - `Outcome`, `ApiError`, `ErrorCode`
//! - **Port definitions** - Traits for adapters: `ICredentialStore`, `IMediaProvider`
//! - **Configuration** - YAML file, environment overrides, validation
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement or that
//! callers inject.

pub mod config;
pub mod domain;
pub mod outcome;
pub mod ports;

pub use outcome::{ApiError, ErrorCode, Outcome};
