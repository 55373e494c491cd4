//! Firestore REST API client.
//!
//! This crate provides:
//! - A REST client with token caching, retry and metrics
//! - A generic [`Collection`] over serde entities with paged queries
//! - Typed repositories for raw media, shows and episodes, poster projects
//!   and prompts, plans and paywalls

pub mod client;
pub mod content_repo;
pub mod error;
pub mod media_repo;
pub mod metrics;
pub mod monetization_repo;
pub mod poster_repo;
pub mod repository;
pub mod retry;
pub mod token_cache;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use content_repo::{EpisodeRepository, ShowRepository};
pub use error::{FirestoreError, FirestoreResult};
pub use media_repo::RawMediaRepository;
pub use monetization_repo::{PaywallRepository, PlanRepository};
pub use poster_repo::{PosterProjectRepository, PromptRepository};
pub use repository::Collection;
pub use retry::RetryConfig;
pub use token_cache::TokenCache;
pub use types::{Document, ToFirestoreValue, Value};
