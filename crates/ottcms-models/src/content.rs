//! Catalog entities that transcoded renditions are attached to.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{EpisodeId, MediaId, ShowId};
use crate::transcoding::TranscodingTask;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Show {
    pub id: ShowId,
    pub title: String,
    pub slug: String,
    /// Renditions of trailers and other show-level media.
    #[serde(default)]
    pub peripheral_tasks: Vec<TranscodingTask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Show {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            id: ShowId::new(),
            slug: slugify(&title),
            title,
            peripheral_tasks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Episode {
    pub id: EpisodeId,
    pub show_id: ShowId,
    pub title: String,
    pub number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_media_id: Option<MediaId>,
    #[serde(default)]
    pub transcoding_tasks: Vec<TranscodingTask>,
    #[serde(default)]
    pub teaser_tasks: Vec<TranscodingTask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Episode {
    pub fn new(show_id: ShowId, title: impl Into<String>, number: u32) -> Self {
        let now = Utc::now();
        Self {
            id: EpisodeId::new(),
            show_id,
            title: title.into(),
            number,
            raw_media_id: None,
            transcoding_tasks: Vec::new(),
            teaser_tasks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lowercase, dash-separated slug.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
