//! Dependency-injected entry point.
//!
//! A [`Client`] bundles the entity store, the blob store and the pagination
//! settings, and hands out each component borrowing them:
//!
//! ```ignore
//! let client = Client::new(RedisStore::connect(url, "vidshare").await?, LocalBlobStore::new("blobs").await?);
//! let page = client.views().list_videos(&query, Some(&viewer)).await?;
//! let liked = client.toggles().toggle_video_like(video_id, &viewer).await?;
//! ```

use std::sync::Arc;

use crate::{
    blob::BlobStore,
    content::ContentService,
    integrity::IntegrityOrchestrator,
    repository::Repo,
    search::PaginationSettings,
    stats::StatsAggregator,
    store::EntityStore,
    toggle::ToggleEngine,
    types::Entity,
    views::ViewComposer,
};

pub struct Client<S, B> {
    store: Arc<S>,
    blobs: Arc<B>,
    pagination: PaginationSettings,
}

impl<S, B> Clone for Client<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            blobs: Arc::clone(&self.blobs),
            pagination: self.pagination,
        }
    }
}

impl<S, B> Client<S, B>
where
    S: EntityStore,
    B: BlobStore,
{
    pub fn new(store: S, blobs: B) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(blobs))
    }

    /// Builds a client over handles that are shared with other owners.
    pub fn from_shared(store: Arc<S>, blobs: Arc<B>) -> Self {
        Self {
            store,
            blobs,
            pagination: PaginationSettings::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationSettings) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn pagination(&self) -> PaginationSettings {
        self.pagination
    }

    /// Typed access to a single collection.
    pub fn collection<T: Entity>(&self) -> Repo<'_, S, T> {
        Repo::new(&*self.store)
    }

    pub fn views(&self) -> ViewComposer<'_, S> {
        ViewComposer::new(&*self.store, self.pagination)
    }

    pub fn toggles(&self) -> ToggleEngine<'_, S> {
        ToggleEngine::new(&*self.store)
    }

    pub fn integrity(&self) -> IntegrityOrchestrator<'_, S, B> {
        IntegrityOrchestrator::new(&*self.store, &*self.blobs)
    }

    pub fn stats(&self) -> StatsAggregator<'_, S> {
        StatsAggregator::new(&*self.store)
    }

    pub fn content(&self) -> ContentService<'_, S, B> {
        ContentService::new(&*self.store, &*self.blobs)
    }
}
