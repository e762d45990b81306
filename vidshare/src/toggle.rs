use log::debug;
use serde::Serialize;

use crate::{
    errors::{CoreError, ValidationError},
    id::EntityId,
    repository::to_document,
    store::{EntityStore, ToggleOutcome, ToggleState},
    types::{Entity, Like, LikeTarget, RelationKey, Subscription, TargetKind, User},
};

/// State of a relation after a toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub state: ToggleState,
    /// Id of the like or subscription row that was created or removed.
    pub relation_id: EntityId,
}

impl ToggleResult {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == ToggleState::Added
    }

    pub fn message(&self, added: &'static str, removed: &'static str) -> &'static str {
        match self.state {
            ToggleState::Added => added,
            ToggleState::Removed => removed,
        }
    }
}

impl From<ToggleOutcome> for ToggleResult {
    fn from(outcome: ToggleOutcome) -> Self {
        Self {
            state: outcome.state,
            relation_id: outcome.id,
        }
    }
}

/// Flips likes and subscriptions between absent and present.
pub struct ToggleEngine<'c, S: ?Sized> {
    store: &'c S,
}

impl<'c, S> ToggleEngine<'c, S>
where
    S: EntityStore + ?Sized,
{
    pub fn new(store: &'c S) -> Self {
        Self { store }
    }

    pub async fn toggle_video_like(&self, video_id: &str, actor: &EntityId) -> Result<ToggleResult, CoreError> {
        let id = EntityId::param("videoId", video_id)?;
        self.toggle_like(LikeTarget::Video(id), actor).await
    }

    pub async fn toggle_comment_like(&self, comment_id: &str, actor: &EntityId) -> Result<ToggleResult, CoreError> {
        let id = EntityId::param("commentId", comment_id)?;
        self.toggle_like(LikeTarget::Comment(id), actor).await
    }

    pub async fn toggle_tweet_like(&self, tweet_id: &str, actor: &EntityId) -> Result<ToggleResult, CoreError> {
        let id = EntityId::param("tweetId", tweet_id)?;
        self.toggle_like(LikeTarget::Tweet(id), actor).await
    }

    /// Likes `target` if `actor` has not, otherwise removes the like.
    pub async fn toggle_like(&self, target: LikeTarget, actor: &EntityId) -> Result<ToggleResult, CoreError> {
        let kind = target.kind();
        self.ensure_target(kind, target.id()).await?;

        let like = Like::new(target.clone(), actor.clone());
        let key = RelationKey::like(target, actor.clone());
        let outcome = self.store.toggle_relation(&key, to_document(&like)?).await?;
        debug!(
            "{} like on {} {} by {actor}",
            state_verb(outcome.state),
            kind.field(),
            key_target(&key)
        );
        Ok(outcome.into())
    }

    /// Subscribes `actor` to `channel_id`, or unsubscribes if already subscribed.
    pub async fn toggle_subscription(&self, channel_id: &str, actor: &EntityId) -> Result<ToggleResult, CoreError> {
        let channel = EntityId::param("channelId", channel_id)?;
        if &channel == actor {
            return Err(ValidationError::single(
                "channelId",
                "validation.self_subscription",
                "cannot subscribe to your own channel",
            )
            .into());
        }
        if self.store.find_by_id(User::COLLECTION, &channel).await?.is_none() {
            return Err(CoreError::not_found("channel", &channel));
        }

        let subscription = Subscription::new(actor.clone(), channel.clone());
        let key = RelationKey::subscription(actor.clone(), channel.clone());
        let outcome = self
            .store
            .toggle_relation(&key, to_document(&subscription)?)
            .await?;
        debug!("{} subscription {actor} -> {channel}", state_verb(outcome.state));
        Ok(outcome.into())
    }

    async fn ensure_target(&self, kind: TargetKind, id: &EntityId) -> Result<(), CoreError> {
        let collection = kind.collection();
        match self.store.find_by_id(collection, id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::not_found(collection.entity_name(), id)),
        }
    }
}

fn state_verb(state: ToggleState) -> &'static str {
    match state {
        ToggleState::Added => "added",
        ToggleState::Removed => "removed",
    }
}

fn key_target(key: &RelationKey) -> &EntityId {
    match key {
        RelationKey::Like { target, .. } => target.id(),
        RelationKey::Subscription { channel, .. } => channel,
    }
}
