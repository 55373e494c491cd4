//! Generic typed access to one collection.
//!
//! Entities are stored as their serde representation. Typed repositories
//! wrap a [`Collection`] and add the queries their callers need.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use ottcms_models::{PageParams, Paginated};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::types::{from_document, to_fields, Direction, StructuredQuery, Value, Write};

/// Top-level fields stored as native timestamps in every collection.
pub const TIMESTAMP_FIELDS: &[&str] = &["created_at", "updated_at", "published_at"];

pub struct Collection<T> {
    client: FirestoreClient,
    /// Collection path, e.g. `plans` or `poster_projects/ID/prompts`.
    path: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            path: self.path.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(client: FirestoreClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            _entity: PhantomData,
        }
    }

    pub fn client(&self) -> &FirestoreClient {
        &self.client
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parent document path and collection id for queries.
    fn query_parts(&self) -> (&str, &str) {
        match self.path.rsplit_once('/') {
            Some((parent, id)) => (parent, id),
            None => ("", self.path.as_str()),
        }
    }

    pub fn query(&self) -> StructuredQuery {
        StructuredQuery::collection(self.query_parts().1)
    }

    pub async fn get(&self, id: &str) -> FirestoreResult<Option<T>> {
        match self.client.get_document(&self.path, id).await? {
            Some(doc) => Ok(Some(from_document(&doc)?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, id: &str, entity: &T) -> FirestoreResult<()> {
        let fields = to_fields(entity, TIMESTAMP_FIELDS)?;
        self.client.create_document(&self.path, id, fields).await?;
        Ok(())
    }

    /// Replace the whole document.
    pub async fn save(&self, id: &str, entity: &T) -> FirestoreResult<()> {
        let fields = to_fields(entity, TIMESTAMP_FIELDS)?;
        self.client.update_document(&self.path, id, fields, None).await?;
        Ok(())
    }

    /// Write only the listed fields of an existing document.
    pub async fn update_fields(&self, id: &str, fields: HashMap<String, Value>) -> FirestoreResult<()> {
        let mask = fields.keys().cloned().collect();
        self.client.update_document(&self.path, id, fields, Some(mask)).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> FirestoreResult<()> {
        self.client.delete_document(&self.path, id).await
    }

    /// Upsert write for use in an atomic commit.
    pub fn upsert_write(&self, id: &str, entity: &T) -> FirestoreResult<Write> {
        let fields = to_fields(entity, TIMESTAMP_FIELDS)?;
        Ok(Write::upsert(self.client.full_document_name(&self.path, id), fields))
    }

    pub fn delete_write(&self, id: &str) -> Write {
        Write::delete(self.client.full_document_name(&self.path, id))
    }

    /// Run a query, skipping documents that fail to decode.
    pub async fn run(&self, query: StructuredQuery) -> FirestoreResult<Vec<T>> {
        let (parent, _) = self.query_parts();
        let docs = self.client.run_query(parent, query).await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            match from_document(&doc) {
                Ok(entity) => out.push(entity),
                Err(e) => warn!(collection = %self.path, error = %e, "Skipping undecodable document"),
            }
        }
        Ok(out)
    }

    /// One page ordered by `created_at` descending, with optional equality filters.
    pub async fn page(&self, filters: Vec<(&str, Value)>, params: &PageParams) -> FirestoreResult<Paginated<T>> {
        let mut query = self.query();
        for (field, value) in filters {
            query = query.where_eq(field, value);
        }
        let query = query
            .order_by("created_at", Direction::Descending)
            .offset(params.offset())
            .limit(params.fetch_limit());
        let rows = self.run(query).await?;
        Ok(Paginated::from_overfetch(rows, params))
    }
}
