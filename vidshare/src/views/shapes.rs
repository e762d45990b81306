//! Response shapes produced by the view composer.
//!
//! Every shape deserializes straight from a pipeline output row, so field
//! names follow the stored camelCase documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{id::EntityId, search::Page};

/// Public fields of a user, as attached to owned rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub username: String,
    pub full_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Fields projected from a user for owner enrichment.
pub(crate) const PROFILE_FIELDS: [&str; 3] = ["username", "fullName", "avatar"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCard {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub views: u64,
    pub is_published: bool,
    /// `None` when the owner no longer resolves.
    pub owner: Option<PublicProfile>,
    #[serde(default)]
    pub likes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    #[serde(flatten)]
    pub video: VideoCard,
    #[serde(default)]
    pub is_liked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub content: String,
    pub video: EntityId,
    pub owner: Option<PublicProfile>,
    #[serde(default)]
    pub likes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetView {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub content: String,
    #[serde(default)]
    pub likes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTweets {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub tweets: Page<TweetView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    #[serde(default)]
    pub duration: f64,
}

pub(crate) const VIDEO_SUMMARY_FIELDS: [&str; 5] = ["title", "description", "videoFile", "thumbnail", "duration"];

/// One like of the actor, with the liked video resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedVideo {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub video: VideoSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberEntry {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub subscriber: PublicProfile,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelEntry {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub channel: PublicProfile,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub username: String,
    pub full_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub subscribers_count: u64,
    pub channels_subscribed_to_count: u64,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistVideo {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub views: u64,
    pub owner: Option<PublicProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistView {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub owner: EntityId,
    /// Resolved videos in playlist order; ids that no longer resolve are omitted.
    pub videos: Vec<PlaylistVideo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
