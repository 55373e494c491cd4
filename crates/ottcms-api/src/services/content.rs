//! Shows and episodes.

use serde::Deserialize;
use validator::Validate;

use ottcms_firestore::{EpisodeRepository, FirestoreClient, ShowRepository};
use ottcms_models::{DomainError, Episode, EpisodeId, MediaId, PageParams, Paginated, Show, ShowId};

use crate::error::ApiResult;
use crate::security::sanitize_title;
use crate::services::found;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateShowRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEpisodeRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[validate(range(min = 1))]
    pub number: u32,
    #[serde(default)]
    pub raw_media_id: Option<MediaId>,
}

fn check<T: Validate>(request: &T) -> ApiResult<()> {
    request
        .validate()
        .map_err(|e| DomainError::invalid_state(e.to_string()).into())
}

#[derive(Clone)]
pub struct ContentService {
    firestore: FirestoreClient,
    shows: ShowRepository,
}

impl ContentService {
    pub fn new(firestore: FirestoreClient) -> Self {
        Self {
            shows: ShowRepository::new(firestore.clone()),
            firestore,
        }
    }

    pub async fn create_show(&self, request: CreateShowRequest) -> ApiResult<Show> {
        check(&request)?;
        let show = Show::new(sanitize_title(&request.title));
        self.shows.create(&show).await?;
        Ok(show)
    }

    pub async fn get_show(&self, show_id: &ShowId) -> ApiResult<Show> {
        found(self.shows.get(show_id).await?, "show", show_id)
    }

    pub async fn list_shows(&self, params: &PageParams) -> ApiResult<Paginated<Show>> {
        Ok(self.shows.list(params).await?)
    }

    pub async fn create_episode(&self, show_id: &ShowId, request: CreateEpisodeRequest) -> ApiResult<Episode> {
        check(&request)?;
        self.get_show(show_id).await?;
        let mut episode = Episode::new(show_id.clone(), sanitize_title(&request.title), request.number);
        episode.raw_media_id = request.raw_media_id;
        self.episodes(show_id).create(&episode).await?;
        Ok(episode)
    }

    pub async fn get_episode(&self, show_id: &ShowId, episode_id: &EpisodeId) -> ApiResult<Episode> {
        found(self.episodes(show_id).get(episode_id).await?, "episode", episode_id)
    }

    pub async fn list_episodes(&self, show_id: &ShowId, params: &PageParams) -> ApiResult<Paginated<Episode>> {
        self.get_show(show_id).await?;
        Ok(self.episodes(show_id).list(params).await?)
    }

    fn episodes(&self, show_id: &ShowId) -> EpisodeRepository {
        EpisodeRepository::new(self.firestore.clone(), show_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_numbers_start_at_one() {
        let request = CreateEpisodeRequest {
            title: "Pilot".into(),
            number: 0,
            raw_media_id: None,
        };
        assert!(check(&request).is_err());
        let request = CreateEpisodeRequest { number: 1, ..request };
        assert!(check(&request).is_ok());
        assert!(check(&CreateShowRequest { title: String::new() }).is_err());
    }
}
