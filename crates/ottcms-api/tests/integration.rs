//! Integration tests against live services.
//!
//! Run with: `cargo test -p ottcms-api --test integration -- --ignored`

#[path = "integration/mod.rs"]
mod integration;
