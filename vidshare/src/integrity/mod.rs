//! Delete cascades and ownership-gated playlist membership.
//!
//! There is no cross-collection transaction: the primary record is deleted
//! first, then dependents are cleaned best-effort and every step is recorded
//! in a [`CascadeReport`]. Re-running a cascade on a deleted id is a
//! `NotFound` with no writes.

mod saga;

pub use saga::{CascadeReport, CascadeStep, StepOutcome, StepStatus};

use futures::future::join_all;
use log::info;
use serde_json::Value;

use crate::{
    blob::BlobStore,
    errors::{CoreError, StoreError},
    filters::Filter,
    id::EntityId,
    repository::{Repo, ensure_owned_by},
    store::{ArrayUpdate, EntityStore, document_id},
    types::{Collection, Comment, Entity, ID_FIELD, Owned, Playlist, TargetKind, Tweet, Video},
};

const PLAYLIST_VIDEOS: &str = "videos";

pub struct IntegrityOrchestrator<'c, S: ?Sized, B: ?Sized> {
    store: &'c S,
    blobs: &'c B,
}

impl<'c, S, B> IntegrityOrchestrator<'c, S, B>
where
    S: EntityStore + ?Sized,
    B: BlobStore + ?Sized,
{
    pub fn new(store: &'c S, blobs: &'c B) -> Self {
        Self { store, blobs }
    }

    /// Loads an owned entity and checks `actor` owns it.
    async fn load_owned<T>(&self, field: &'static str, raw_id: &str, actor: &EntityId) -> Result<T, CoreError>
    where
        T: Entity + Owned,
    {
        let id = EntityId::param(field, raw_id)?;
        let entity = Repo::<S, T>::new(self.store).get_or_not_found(&id).await?;
        ensure_owned_by(&entity, actor)?;
        Ok(entity)
    }

    /// Deletes the primary record. A concurrent delete that won the race is
    /// reported as `NotFound`.
    async fn delete_primary(&self, collection: Collection, id: &EntityId) -> Result<CascadeReport, CoreError> {
        if !self.store.delete_by_id(collection, id).await? {
            return Err(CoreError::not_found(collection.entity_name(), id));
        }
        let mut report = CascadeReport::new(collection, id.clone());
        report.record_done(CascadeStep::DeletePrimary, None, 1);
        Ok(report)
    }

    /// Deletes a video owned by `actor`, then its blobs, comments (and the
    /// likes on them), likes, and playlist references.
    pub async fn delete_video(&self, video_id: &str, actor: &EntityId) -> Result<CascadeReport, CoreError> {
        let video: Video = self.load_owned("videoId", video_id, actor).await?;
        let id = video.id.clone();
        let mut report = self.delete_primary(Collection::Videos, &id).await?;
        info!("deleted video {id}; cleaning dependents");

        for url in [&video.video_file, &video.thumbnail] {
            let result = self.blobs.delete_by_url(url).await.map(|()| 1);
            report.record(CascadeStep::DeleteBlob, Some(url.clone()), result);
        }

        self.delete_comments_of(&id, &mut report).await;

        let likes = self
            .store
            .delete_many(Collection::Likes, &Filter::id_eq(TargetKind::Video.field(), &id))
            .await;
        report.record(CascadeStep::DeleteLikes, None, likes);

        self.detach_from_playlists(&id, &mut report).await;

        info!(
            "video {id} cascade finished: {} comments, {} likes, {} playlists, {} failed steps",
            report.affected(CascadeStep::DeleteComments),
            report.affected(CascadeStep::DeleteLikes) + report.affected(CascadeStep::DeleteCommentLikes),
            report.affected(CascadeStep::DetachFromPlaylist),
            report.failures().count()
        );
        Ok(report.into_result()?)
    }

    /// Re-runs the dependent cleanup of a video whose record is already gone.
    /// Fails `AlreadyExists` while the video still exists.
    pub async fn repair_video_dependents(&self, video_id: &str) -> Result<CascadeReport, CoreError> {
        let id = EntityId::param("videoId", video_id)?;
        if Repo::<S, Video>::new(self.store).exists(&id).await? {
            return Err(CoreError::already_exists("video still exists; delete it instead"));
        }
        let mut report = CascadeReport::new(Collection::Videos, id.clone());
        self.delete_comments_of(&id, &mut report).await;
        let likes = self
            .store
            .delete_many(Collection::Likes, &Filter::id_eq(TargetKind::Video.field(), &id))
            .await;
        report.record(CascadeStep::DeleteLikes, None, likes);
        self.detach_from_playlists(&id, &mut report).await;
        info!(
            "repaired dependents of video {id}: {} comments, {} playlists",
            report.affected(CascadeStep::DeleteComments),
            report.affected(CascadeStep::DetachFromPlaylist)
        );
        Ok(report.into_result()?)
    }

    async fn delete_comments_of(&self, video: &EntityId, report: &mut CascadeReport) {
        let on_video = Filter::id_eq("video", video);
        let comment_ids: Vec<Value> = match self.store.find(Collection::Comments, &on_video).await {
            Ok(comments) => comments
                .iter()
                .filter_map(|comment| comment.get(ID_FIELD).cloned())
                .collect(),
            Err(err) => {
                report.record_failure(CascadeStep::DeleteComments, None, &err);
                return;
            }
        };

        let deleted = self.store.delete_many(Collection::Comments, &on_video).await;
        report.record(CascadeStep::DeleteComments, None, deleted);

        if !comment_ids.is_empty() {
            let likes = self
                .store
                .delete_many(
                    Collection::Likes,
                    &Filter::In {
                        field: TargetKind::Comment.field().to_string(),
                        values: comment_ids,
                    },
                )
                .await;
            report.record(CascadeStep::DeleteCommentLikes, None, likes);
        }
    }

    /// Pulls `video` from every playlist holding it; pulls run concurrently.
    async fn detach_from_playlists(&self, video: &EntityId, report: &mut CascadeReport) {
        let holders = match self
            .store
            .find(Collection::Playlists, &Filter::array_contains(PLAYLIST_VIDEOS, video))
            .await
        {
            Ok(holders) => holders,
            Err(err) => {
                report.record_failure(CascadeStep::DetachFromPlaylist, None, &err);
                return;
            }
        };

        let store = self.store;
        let value = Value::from(video);
        let pulls = holders.iter().filter_map(|playlist| document_id(playlist).ok()).map(|playlist| {
            let value = value.clone();
            async move {
                let result = store
                    .pull(Collection::Playlists, &playlist, PLAYLIST_VIDEOS, value)
                    .await
                    .map(|update| u64::from(matches!(update, ArrayUpdate::Applied(_))));
                (playlist, result)
            }
        });

        for (playlist, result) in join_all(pulls).await {
            report.record(CascadeStep::DetachFromPlaylist, Some(playlist.to_string()), result);
        }
    }

    async fn delete_likes_on(&self, kind: TargetKind, id: &EntityId, report: &mut CascadeReport) {
        let likes = self
            .store
            .delete_many(Collection::Likes, &Filter::id_eq(kind.field(), id))
            .await;
        report.record(CascadeStep::DeleteLikes, None, likes);
    }

    /// Deletes a comment owned by `actor` and the likes on it.
    pub async fn delete_comment(&self, comment_id: &str, actor: &EntityId) -> Result<CascadeReport, CoreError> {
        let comment: Comment = self.load_owned("commentId", comment_id, actor).await?;
        let mut report = self.delete_primary(Collection::Comments, &comment.id).await?;
        self.delete_likes_on(TargetKind::Comment, &comment.id, &mut report).await;
        Ok(report.into_result()?)
    }

    /// Deletes a tweet owned by `actor` and the likes on it.
    pub async fn delete_tweet(&self, tweet_id: &str, actor: &EntityId) -> Result<CascadeReport, CoreError> {
        let tweet: Tweet = self.load_owned("tweetId", tweet_id, actor).await?;
        let mut report = self.delete_primary(Collection::Tweets, &tweet.id).await?;
        self.delete_likes_on(TargetKind::Tweet, &tweet.id, &mut report).await;
        Ok(report.into_result()?)
    }

    pub async fn delete_playlist(&self, playlist_id: &str, actor: &EntityId) -> Result<CascadeReport, CoreError> {
        let playlist: Playlist = self.load_owned("playlistId", playlist_id, actor).await?;
        self.delete_primary(Collection::Playlists, &playlist.id).await
    }

    /// Appends a video to a playlist owned by `actor`; returns the new sequence.
    pub async fn add_video_to_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
        actor: &EntityId,
    ) -> Result<Vec<EntityId>, CoreError> {
        let video = EntityId::param("videoId", video_id)?;
        let playlist: Playlist = self.load_owned("playlistId", playlist_id, actor).await?;
        Repo::<S, Video>::new(self.store).ensure_exists(&video).await?;
        if playlist.videos.contains(&video) {
            return Err(CoreError::already_exists("video is already in this playlist"));
        }

        let update = self
            .store
            .add_to_set(Collection::Playlists, &playlist.id, PLAYLIST_VIDEOS, Value::from(&video))
            .await?;
        match update {
            ArrayUpdate::Applied(values) => decode_ids(values),
            ArrayUpdate::Unchanged(_) => Err(CoreError::already_exists("video is already in this playlist")),
            ArrayUpdate::Missing => Err(CoreError::not_found("playlist", &playlist.id)),
        }
    }

    /// Removes a video from a playlist owned by `actor`; returns the new sequence.
    pub async fn remove_video_from_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
        actor: &EntityId,
    ) -> Result<Vec<EntityId>, CoreError> {
        let video = EntityId::param("videoId", video_id)?;
        let playlist: Playlist = self.load_owned("playlistId", playlist_id, actor).await?;
        if !playlist.videos.contains(&video) {
            return Err(CoreError::not_found("playlist video", &video));
        }

        let update = self
            .store
            .pull(Collection::Playlists, &playlist.id, PLAYLIST_VIDEOS, Value::from(&video))
            .await?;
        match update {
            ArrayUpdate::Applied(values) => decode_ids(values),
            ArrayUpdate::Unchanged(_) => Err(CoreError::not_found("playlist video", &video)),
            ArrayUpdate::Missing => Err(CoreError::not_found("playlist", &playlist.id)),
        }
    }
}

fn decode_ids(values: Vec<Value>) -> Result<Vec<EntityId>, CoreError> {
    serde_json::from_value(Value::Array(values))
        .map_err(StoreError::from)
        .map_err(CoreError::from)
}
