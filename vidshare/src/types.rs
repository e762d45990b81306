use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::id::EntityId;

/// A stored document: a JSON object whose id lives under `_id`.
pub type Document = Map<String, Value>;

/// Field holding the document identifier.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Videos,
    Comments,
    Likes,
    Subscriptions,
    Tweets,
    Playlists,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Users,
        Collection::Videos,
        Collection::Comments,
        Collection::Likes,
        Collection::Subscriptions,
        Collection::Tweets,
        Collection::Playlists,
    ];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Videos => "videos",
            Collection::Comments => "comments",
            Collection::Likes => "likes",
            Collection::Subscriptions => "subscriptions",
            Collection::Tweets => "tweets",
            Collection::Playlists => "playlists",
        }
    }

    /// Singular name used in error messages.
    #[inline]
    pub const fn entity_name(self) -> &'static str {
        match self {
            Collection::Users => "user",
            Collection::Videos => "video",
            Collection::Comments => "comment",
            Collection::Likes => "like",
            Collection::Subscriptions => "subscription",
            Collection::Tweets => "tweet",
            Collection::Playlists => "playlist",
        }
    }
}

/// Implemented by every persisted entity.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> &EntityId;
}

/// Entities that belong to a single user.
pub trait Owned {
    fn owner(&self) -> &EntityId;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    /// Duration in seconds, as reported by the blob store.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub views: u64,
    pub is_published: bool,
    pub owner: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub content: String,
    pub video: EntityId,
    pub owner: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub content: String,
    pub owner: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    /// Ordered, duplicate-free video ids.
    #[serde(default)]
    pub videos: Vec<EntityId>,
    pub owner: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub subscriber: EntityId,
    pub channel: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(subscriber: EntityId, channel: EntityId) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::generate(),
            subscriber,
            channel,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of entity a like can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Video,
    Comment,
    Tweet,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [TargetKind::Video, TargetKind::Comment, TargetKind::Tweet];

    /// Document field on a like that holds this kind of target.
    #[inline]
    pub const fn field(self) -> &'static str {
        match self {
            TargetKind::Video => "video",
            TargetKind::Comment => "comment",
            TargetKind::Tweet => "tweet",
        }
    }

    #[inline]
    pub const fn collection(self) -> Collection {
        match self {
            TargetKind::Video => Collection::Videos,
            TargetKind::Comment => Collection::Comments,
            TargetKind::Tweet => Collection::Tweets,
        }
    }
}

/// The single entity a like points at.
///
/// Serialized flattened into the like document as exactly one of the keys
/// `video`, `comment` or `tweet`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Video(EntityId),
    Comment(EntityId),
    Tweet(EntityId),
}

impl LikeTarget {
    pub fn new(kind: TargetKind, id: EntityId) -> Self {
        match kind {
            TargetKind::Video => LikeTarget::Video(id),
            TargetKind::Comment => LikeTarget::Comment(id),
            TargetKind::Tweet => LikeTarget::Tweet(id),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            LikeTarget::Video(_) => TargetKind::Video,
            LikeTarget::Comment(_) => TargetKind::Comment,
            LikeTarget::Tweet(_) => TargetKind::Tweet,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            LikeTarget::Video(id) | LikeTarget::Comment(id) | LikeTarget::Tweet(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(rename = "_id")]
    pub id: EntityId,
    #[serde(flatten)]
    pub target: LikeTarget,
    pub liked_by: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Like {
    pub fn new(target: LikeTarget, liked_by: EntityId) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::generate(),
            target,
            liked_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Uniqueness key of a toggled relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKey {
    Like { target: LikeTarget, actor: EntityId },
    Subscription { subscriber: EntityId, channel: EntityId },
}

impl RelationKey {
    pub fn like(target: LikeTarget, actor: EntityId) -> Self {
        Self::Like { target, actor }
    }

    pub fn subscription(subscriber: EntityId, channel: EntityId) -> Self {
        Self::Subscription { subscriber, channel }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Self::Like { .. } => Collection::Likes,
            Self::Subscription { .. } => Collection::Subscriptions,
        }
    }

    /// Stable textual form, unique per relation.
    pub fn canonical(&self) -> String {
        match self {
            Self::Like { target, actor } => {
                format!("{}:{}:{}", target.kind().field(), target.id(), actor)
            }
            Self::Subscription { subscriber, channel } => format!("{channel}:{subscriber}"),
        }
    }

    /// Whether `document` is the stored row for this relation.
    pub fn matches(&self, document: &Document) -> bool {
        let field_is = |field: &str, id: &EntityId| {
            document.get(field).and_then(Value::as_str) == Some(id.as_str())
        };
        match self {
            Self::Like { target, actor } => field_is(target.kind().field(), target.id()) && field_is("likedBy", actor),
            Self::Subscription { subscriber, channel } => {
                field_is("subscriber", subscriber) && field_is("channel", channel)
            }
        }
    }

    /// Recovers the relation key of a stored like or subscription document.
    pub fn from_document(collection: Collection, document: &Document) -> Option<Self> {
        let value = Value::Object(document.clone());
        match collection {
            Collection::Likes => {
                let like: Like = serde_json::from_value(value).ok()?;
                Some(Self::like(like.target, like.liked_by))
            }
            Collection::Subscriptions => {
                let subscription: Subscription = serde_json::from_value(value).ok()?;
                Some(Self::subscription(subscription.subscriber, subscription.channel))
            }
            _ => None,
        }
    }
}

macro_rules! impl_entity {
    ($ty:ty, $collection:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &EntityId {
                &self.id
            }
        }
    };
    ($ty:ty, $collection:expr, owned) => {
        impl_entity!($ty, $collection);

        impl Owned for $ty {
            fn owner(&self) -> &EntityId {
                &self.owner
            }
        }
    };
}

impl_entity!(User, Collection::Users);
impl_entity!(Video, Collection::Videos, owned);
impl_entity!(Comment, Collection::Comments, owned);
impl_entity!(Tweet, Collection::Tweets, owned);
impl_entity!(Playlist, Collection::Playlists, owned);
impl_entity!(Like, Collection::Likes);
impl_entity!(Subscription, Collection::Subscriptions);
