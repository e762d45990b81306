//! Owner-gated create and update operations.

use std::path::PathBuf;

use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    blob::{BlobStore, UploadedBlob},
    errors::{CoreError, ValidationError},
    filters::{Filter, normalize_username},
    id::EntityId,
    repository::{Repo, ensure_owned_by},
    store::EntityStore,
    types::{Comment, Document, Entity, Owned, Playlist, Tweet, User, Video},
    validators::IssueCollector,
};

pub const MAX_USERNAME_LEN: usize = 32;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5_000;
pub const MAX_CONTENT_LEN: usize = 2_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

/// A video upload: both files are local temporaries consumed by the blob store.
#[derive(Debug, Clone, Default)]
pub struct NewVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_file: Option<PathBuf>,
    pub thumbnail: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Builds an update patch that always refreshes `updatedAt`.
fn patch() -> Document {
    let mut document = Document::new();
    document.insert("updatedAt".into(), Value::String(Utc::now().to_rfc3339()));
    document
}

fn required(field: &str, value: Option<&str>, max_len: usize) -> Result<String, ValidationError> {
    let mut issues = IssueCollector::new();
    let text = issues.text(field, value, max_len).map(str::to_string);
    issues.finish()?;
    Ok(text.unwrap_or_default())
}

pub struct ContentService<'c, S: ?Sized, B: ?Sized> {
    store: &'c S,
    blobs: &'c B,
}

impl<'c, S, B> ContentService<'c, S, B>
where
    S: EntityStore + ?Sized,
    B: BlobStore + ?Sized,
{
    pub fn new(store: &'c S, blobs: &'c B) -> Self {
        Self { store, blobs }
    }

    fn repo<T: Entity>(&self) -> Repo<'c, S, T> {
        Repo::new(self.store)
    }

    async fn load_owned<T>(&self, field: &'static str, raw_id: &str, actor: &EntityId) -> Result<T, CoreError>
    where
        T: Entity + Owned,
    {
        let id = EntityId::param(field, raw_id)?;
        let entity = self.repo::<T>().get_or_not_found(&id).await?;
        ensure_owned_by(&entity, actor)?;
        Ok(entity)
    }

    async fn apply<T: Entity>(&self, id: &EntityId, patch: Document) -> Result<T, CoreError> {
        self.repo::<T>()
            .update(id, patch)
            .await?
            .ok_or_else(|| CoreError::not_found(T::COLLECTION.entity_name(), id))
    }

    /// Creates a user profile. Usernames are stored lowercased; username and
    /// email must be unique.
    pub async fn register_user(&self, input: NewUser) -> Result<User, CoreError> {
        let mut issues = IssueCollector::new();
        let username = issues
            .text("username", input.username.as_deref(), MAX_USERNAME_LEN)
            .map(normalize_username);
        let full_name = issues
            .text("fullName", input.full_name.as_deref(), MAX_NAME_LEN)
            .map(str::to_string);
        let email = issues.email("email", input.email.as_deref()).map(str::to_lowercase);
        if let Some(avatar) = input.avatar.as_deref() {
            issues.url("avatar", Some(avatar));
        }
        if let Some(cover) = input.cover_image.as_deref() {
            issues.url("coverImage", Some(cover));
        }
        issues.finish()?;
        let (Some(username), Some(full_name), Some(email)) = (username, full_name, email) else {
            return Err(ValidationError::single("user", "validation.required", "incomplete user").into());
        };

        let users = self.repo::<User>();
        let taken = Filter::or([
            Filter::eq("username", username.as_str()),
            Filter::eq("email", email.as_str()),
        ]);
        if users.count(&taken).await? > 0 {
            return Err(CoreError::already_exists("user with this username or email already exists"));
        }

        let now = Utc::now();
        let user = User {
            id: EntityId::generate(),
            username,
            full_name,
            email,
            avatar: input.avatar,
            cover_image: input.cover_image,
            created_at: now,
            updated_at: now,
        };
        users.create(&user).await?;
        info!("registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Uploads the media files and creates a published video owned by `actor`.
    pub async fn publish_video(&self, actor: &EntityId, input: NewVideo) -> Result<Video, CoreError> {
        let mut issues = IssueCollector::new();
        let title = issues
            .text("title", input.title.as_deref(), MAX_TITLE_LEN)
            .map(str::to_string);
        let description = issues
            .text("description", input.description.as_deref(), MAX_DESCRIPTION_LEN)
            .map(str::to_string);
        if input.video_file.is_none() {
            issues.push("videoFile", "validation.required", "video file is required");
        }
        if input.thumbnail.is_none() {
            issues.push("thumbnail", "validation.required", "thumbnail is required");
        }
        issues.finish()?;
        let (Some(title), Some(description), Some(video_path), Some(thumbnail_path)) =
            (title, description, input.video_file, input.thumbnail)
        else {
            return Err(ValidationError::single("video", "validation.required", "incomplete video").into());
        };

        let video_blob = self.blobs.upload(&video_path).await?;
        let thumbnail_blob = match self.blobs.upload(&thumbnail_path).await {
            Ok(blob) => blob,
            Err(err) => {
                self.discard(&video_blob).await;
                return Err(err.into());
            }
        };

        let now = Utc::now();
        let video = Video {
            id: EntityId::generate(),
            video_file: video_blob.url.clone(),
            thumbnail: thumbnail_blob.url.clone(),
            title,
            description,
            duration: video_blob.duration.unwrap_or_default(),
            views: 0,
            is_published: true,
            owner: actor.clone(),
            created_at: now,
            updated_at: now,
        };
        if let Err(err) = self.repo::<Video>().create(&video).await {
            self.discard(&video_blob).await;
            self.discard(&thumbnail_blob).await;
            return Err(err);
        }
        info!("published video {} by {actor}", video.id);
        Ok(video)
    }

    async fn discard(&self, blob: &UploadedBlob) {
        if let Err(err) = self.blobs.delete_by_url(&blob.url).await {
            warn!("failed to discard blob {}: {err}", blob.url);
        }
    }

    /// Updates title, description and optionally replaces the thumbnail.
    pub async fn update_video(&self, video_id: &str, actor: &EntityId, update: VideoUpdate) -> Result<Video, CoreError> {
        let mut issues = IssueCollector::new();
        if update.title.is_some() {
            issues.text("title", update.title.as_deref(), MAX_TITLE_LEN);
        }
        if update.description.is_some() {
            issues.text("description", update.description.as_deref(), MAX_DESCRIPTION_LEN);
        }
        if update.title.is_none() && update.description.is_none() && update.thumbnail.is_none() {
            issues.push("video", "validation.required", "nothing to update");
        }
        issues.finish()?;

        let video: Video = self.load_owned("videoId", video_id, actor).await?;
        let mut changes = patch();
        if let Some(title) = update.title.as_deref() {
            changes.insert("title".into(), Value::from(title.trim()));
        }
        if let Some(description) = update.description.as_deref() {
            changes.insert("description".into(), Value::from(description.trim()));
        }
        let replaced = match update.thumbnail {
            Some(path) => {
                let blob = self.blobs.upload(&path).await?;
                changes.insert("thumbnail".into(), Value::from(blob.url.as_str()));
                Some(blob)
            }
            None => None,
        };

        let updated: Video = match self.apply(&video.id, changes).await {
            Ok(updated) => updated,
            Err(err) => {
                if let Some(blob) = &replaced {
                    self.discard(blob).await;
                }
                return Err(err);
            }
        };
        if replaced.is_some()
            && let Err(err) = self.blobs.delete_by_url(&video.thumbnail).await
        {
            warn!("failed to delete replaced thumbnail {}: {err}", video.thumbnail);
        }
        Ok(updated)
    }

    pub async fn toggle_publish_status(&self, video_id: &str, actor: &EntityId) -> Result<Video, CoreError> {
        let video: Video = self.load_owned("videoId", video_id, actor).await?;
        let mut changes = patch();
        changes.insert("isPublished".into(), Value::Bool(!video.is_published));
        self.apply(&video.id, changes).await
    }

    pub async fn add_comment(&self, video_id: &str, actor: &EntityId, content: Option<&str>) -> Result<Comment, CoreError> {
        let video = EntityId::param("videoId", video_id)?;
        let content = required("content", content, MAX_CONTENT_LEN)?;
        self.repo::<Video>().ensure_exists(&video).await?;

        let now = Utc::now();
        let comment = Comment {
            id: EntityId::generate(),
            content,
            video,
            owner: actor.clone(),
            created_at: now,
            updated_at: now,
        };
        self.repo::<Comment>().create(&comment).await?;
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        comment_id: &str,
        actor: &EntityId,
        content: Option<&str>,
    ) -> Result<Comment, CoreError> {
        let content = required("content", content, MAX_CONTENT_LEN)?;
        let comment: Comment = self.load_owned("commentId", comment_id, actor).await?;
        let mut changes = patch();
        changes.insert("content".into(), Value::String(content));
        self.apply(&comment.id, changes).await
    }

    pub async fn create_tweet(&self, actor: &EntityId, content: Option<&str>) -> Result<Tweet, CoreError> {
        let content = required("content", content, MAX_CONTENT_LEN)?;
        let now = Utc::now();
        let tweet = Tweet {
            id: EntityId::generate(),
            content,
            owner: actor.clone(),
            created_at: now,
            updated_at: now,
        };
        self.repo::<Tweet>().create(&tweet).await?;
        Ok(tweet)
    }

    pub async fn update_tweet(&self, tweet_id: &str, actor: &EntityId, content: Option<&str>) -> Result<Tweet, CoreError> {
        let content = required("content", content, MAX_CONTENT_LEN)?;
        let tweet: Tweet = self.load_owned("tweetId", tweet_id, actor).await?;
        let mut changes = patch();
        changes.insert("content".into(), Value::String(content));
        self.apply(&tweet.id, changes).await
    }

    pub async fn create_playlist(
        &self,
        actor: &EntityId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Playlist, CoreError> {
        let mut issues = IssueCollector::new();
        let name = issues.text("name", name, MAX_NAME_LEN).map(str::to_string);
        let description = issues
            .text("description", description, MAX_DESCRIPTION_LEN)
            .map(str::to_string);
        issues.finish()?;

        let now = Utc::now();
        let playlist = Playlist {
            id: EntityId::generate(),
            name: name.unwrap_or_default(),
            description: description.unwrap_or_default(),
            videos: Vec::new(),
            owner: actor.clone(),
            created_at: now,
            updated_at: now,
        };
        self.repo::<Playlist>().create(&playlist).await?;
        Ok(playlist)
    }

    pub async fn update_playlist(
        &self,
        playlist_id: &str,
        actor: &EntityId,
        update: PlaylistUpdate,
    ) -> Result<Playlist, CoreError> {
        let mut issues = IssueCollector::new();
        let name = update
            .name
            .as_deref()
            .and_then(|name| issues.text("name", Some(name), MAX_NAME_LEN));
        let description = update
            .description
            .as_deref()
            .and_then(|description| issues.text("description", Some(description), MAX_DESCRIPTION_LEN));
        if update.name.is_none() && update.description.is_none() {
            issues.push("playlist", "validation.required", "name or description is required");
        }
        issues.finish()?;

        let playlist: Playlist = self.load_owned("playlistId", playlist_id, actor).await?;
        let mut changes = patch();
        if let Some(name) = name {
            changes.insert("name".into(), Value::from(name));
        }
        if let Some(description) = description {
            changes.insert("description".into(), Value::from(description));
        }
        self.apply(&playlist.id, changes).await
    }
}
