//! Poster projects and their prompt history.

use tracing::{debug, info};

use ottcms_models::{PageParams, Paginated, PosterProject, PosterProjectId, Prompt, PromptId};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::repository::Collection;
use crate::types::Direction;

pub const POSTER_PROJECTS_COLLECTION: &str = "poster_projects";

/// Firestore caps a batch write at 500 documents.
const DELETE_CHUNK: usize = 500;

#[derive(Clone)]
pub struct PosterProjectRepository {
    client: FirestoreClient,
    projects: Collection<PosterProject>,
}

impl PosterProjectRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            projects: Collection::new(client.clone(), POSTER_PROJECTS_COLLECTION),
            client,
        }
    }

    pub fn prompts(&self, project_id: &PosterProjectId) -> PromptRepository {
        PromptRepository::new(self.client.clone(), project_id)
    }

    pub async fn get(&self, id: &PosterProjectId) -> FirestoreResult<Option<PosterProject>> {
        self.projects.get(id.as_str()).await
    }

    pub async fn create(&self, project: &PosterProject) -> FirestoreResult<()> {
        self.projects.create(project.id.as_str(), project).await?;
        info!(project_id = %project.id, content_id = %project.content_id, "Created poster project");
        Ok(())
    }

    pub async fn save(&self, project: &PosterProject) -> FirestoreResult<()> {
        self.projects.save(project.id.as_str(), project).await
    }

    pub async fn list(&self, params: &PageParams) -> FirestoreResult<Paginated<PosterProject>> {
        self.projects.page(Vec::new(), params).await
    }

    /// Delete a project together with its prompts.
    pub async fn delete(&self, id: &PosterProjectId) -> FirestoreResult<()> {
        let prompts = self.prompts(id);
        let writes: Vec<_> = prompts
            .list()
            .await?
            .iter()
            .map(|p| prompts.prompts.delete_write(p.id.as_str()))
            .collect();
        let prompt_count = writes.len();

        let mut writes = writes.into_iter().peekable();
        while writes.peek().is_some() {
            let chunk: Vec<_> = writes.by_ref().take(DELETE_CHUNK).collect();
            self.client.batch_write(chunk).await?;
        }
        debug!(project_id = %id, prompt_count, "Deleted poster prompts");

        self.projects.delete(id.as_str()).await?;
        info!(project_id = %id, "Deleted poster project");
        Ok(())
    }
}

/// Prompts live under `poster_projects/{projectId}/prompts`.
#[derive(Clone)]
pub struct PromptRepository {
    prompts: Collection<Prompt>,
}

impl PromptRepository {
    pub fn new(client: FirestoreClient, project_id: &PosterProjectId) -> Self {
        Self {
            prompts: Collection::new(
                client,
                format!("{}/{}/prompts", POSTER_PROJECTS_COLLECTION, project_id),
            ),
        }
    }

    pub async fn get(&self, id: &PromptId) -> FirestoreResult<Option<Prompt>> {
        self.prompts.get(id.as_str()).await
    }

    pub async fn create(&self, prompt: &Prompt) -> FirestoreResult<()> {
        self.prompts.create(prompt.id.as_str(), prompt).await
    }

    pub async fn save(&self, prompt: &Prompt) -> FirestoreResult<()> {
        self.prompts.save(prompt.id.as_str(), prompt).await
    }

    /// Highest version stored for the project.
    pub async fn latest_version(&self) -> FirestoreResult<Option<u32>> {
        let query = self
            .prompts
            .query()
            .order_by("version", Direction::Descending)
            .limit(1);
        Ok(self.prompts.run(query).await?.first().map(|p| p.version))
    }

    /// All prompts, oldest version first.
    pub async fn list(&self) -> FirestoreResult<Vec<Prompt>> {
        let query = self.prompts.query().order_by("version", Direction::Ascending);
        self.prompts.run(query).await
    }
}
