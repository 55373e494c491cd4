//! Axum HTTP API server for the OTT CMS.
//!
//! This crate provides:
//! - Multipart upload, Drive import and transcoding dispatch endpoints
//! - Shows, episodes, plans, paywalls and poster projects
//! - Admin bearer-token auth and the frame-extraction webhook
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, Clients};
