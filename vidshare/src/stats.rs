use futures::try_join;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::CoreError,
    filters::Filter,
    id::EntityId,
    repository::Repo,
    store::EntityStore,
    types::{Collection, ID_FIELD, TargetKind, User, Video},
    views::PublicProfile,
};

/// Channel dashboard summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    #[serde(flatten)]
    pub profile: PublicProfile,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub total_videos: u64,
    pub total_views: u64,
    pub total_subscribers: u64,
    /// Likes on the channel's videos, comments and tweets.
    pub total_likes: u64,
}

/// Computes channel statistics from the underlying collections on every call.
pub struct StatsAggregator<'c, S: ?Sized> {
    store: &'c S,
}

impl<'c, S> StatsAggregator<'c, S>
where
    S: EntityStore + ?Sized,
{
    pub fn new(store: &'c S) -> Self {
        Self { store }
    }

    pub async fn channel_stats(&self, channel: &EntityId) -> Result<ChannelStats, CoreError> {
        let user: User = Repo::<S, User>::new(self.store)
            .get(channel)
            .await?
            .ok_or_else(|| CoreError::not_found("channel", channel))?;

        let videos: Vec<Video> = Repo::<S, Video>::new(self.store)
            .find(&Filter::id_eq("owner", channel))
            .await?;
        let total_subscribers = self
            .store
            .count(Collection::Subscriptions, &Filter::id_eq("channel", channel))
            .await?;

        let video_ids: Vec<Value> = videos.iter().map(|video| Value::from(&video.id)).collect();
        let (video_likes, comment_likes, tweet_likes) = try_join!(
            self.likes_on(TargetKind::Video, video_ids),
            self.likes_on_owned(TargetKind::Comment, channel),
            self.likes_on_owned(TargetKind::Tweet, channel),
        )?;

        Ok(ChannelStats {
            profile: PublicProfile {
                id: user.id,
                username: user.username,
                full_name: user.full_name,
                avatar: user.avatar,
            },
            cover_image: user.cover_image,
            total_videos: videos.len() as u64,
            total_views: videos.iter().map(|video| video.views).sum(),
            total_subscribers,
            total_likes: video_likes + comment_likes + tweet_likes,
        })
    }

    /// Likes of `kind` whose target row is owned by `channel`.
    async fn likes_on_owned(&self, kind: TargetKind, channel: &EntityId) -> Result<u64, CoreError> {
        let owned = self
            .store
            .find(kind.collection(), &Filter::id_eq("owner", channel))
            .await?;
        let ids: Vec<Value> = owned.into_iter().filter_map(|mut row| row.remove(ID_FIELD)).collect();
        self.likes_on(kind, ids).await
    }

    /// Likes targeting any of `ids`.
    async fn likes_on(&self, kind: TargetKind, ids: Vec<Value>) -> Result<u64, CoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let targets = Filter::In {
            field: kind.field().to_string(),
            values: ids,
        };
        Ok(self.store.count(Collection::Likes, &targets).await?)
    }
}
