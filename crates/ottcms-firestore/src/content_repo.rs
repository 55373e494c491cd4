//! Shows and their episodes.

use tracing::info;

use ottcms_models::{Episode, EpisodeId, PageParams, Paginated, Show, ShowId};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::repository::Collection;

pub const SHOWS_COLLECTION: &str = "shows";

#[derive(Clone)]
pub struct ShowRepository {
    shows: Collection<Show>,
}

impl ShowRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            shows: Collection::new(client, SHOWS_COLLECTION),
        }
    }

    pub async fn get(&self, id: &ShowId) -> FirestoreResult<Option<Show>> {
        self.shows.get(id.as_str()).await
    }

    pub async fn create(&self, show: &Show) -> FirestoreResult<()> {
        self.shows.create(show.id.as_str(), show).await?;
        info!(show_id = %show.id, slug = %show.slug, "Created show");
        Ok(())
    }

    pub async fn save(&self, show: &Show) -> FirestoreResult<()> {
        self.shows.save(show.id.as_str(), show).await
    }

    pub async fn list(&self, params: &PageParams) -> FirestoreResult<Paginated<Show>> {
        self.shows.page(Vec::new(), params).await
    }
}

/// Episodes live under `shows/{showId}/episodes`.
#[derive(Clone)]
pub struct EpisodeRepository {
    episodes: Collection<Episode>,
}

impl EpisodeRepository {
    pub fn new(client: FirestoreClient, show_id: &ShowId) -> Self {
        Self {
            episodes: Collection::new(client, format!("{}/{}/episodes", SHOWS_COLLECTION, show_id)),
        }
    }

    pub async fn get(&self, id: &EpisodeId) -> FirestoreResult<Option<Episode>> {
        self.episodes.get(id.as_str()).await
    }

    pub async fn create(&self, episode: &Episode) -> FirestoreResult<()> {
        self.episodes.create(episode.id.as_str(), episode).await?;
        info!(show_id = %episode.show_id, episode_id = %episode.id, "Created episode");
        Ok(())
    }

    pub async fn save(&self, episode: &Episode) -> FirestoreResult<()> {
        self.episodes.save(episode.id.as_str(), episode).await
    }

    pub async fn list(&self, params: &PageParams) -> FirestoreResult<Paginated<Episode>> {
        self.episodes.page(Vec::new(), params).await
    }
}
