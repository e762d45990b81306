//! Read-only denormalized views.
//!
//! Each view is a [`Pipeline`] built from typed arguments and evaluated by
//! the store; nothing here mutates state.

mod shapes;

pub use shapes::*;

use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    errors::{CoreError, StoreError, ValidationError},
    filters::{Filter, normalize_username, text_search_filter},
    id::EntityId,
    pipeline::Pipeline,
    repository::from_document,
    search::{
        CommentSort, Page, PageRequest, PaginateOptions, PaginatedDocs, PaginationSettings, PlaylistSort, SortKey,
        SortOrder, SortSpec, TweetSort, ValueKind, VideoSort, paginate, parse_sort,
    },
    store::EntityStore,
    types::{Collection, Document, ID_FIELD, TargetKind, Video},
};

const NEWEST_FIRST: SortSpec = SortSpec {
    path: "createdAt",
    order: SortOrder::Desc,
    kind: ValueKind::Timestamp,
};

/// Fields searched by the video text filter.
const VIDEO_SEARCH_FIELDS: [&str; 2] = ["title", "description"];

/// Query accepted by [`ViewComposer::list_videos`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<String>,
}

/// Replaces `owner` with the owner's public profile, or null.
pub(crate) fn with_owner(pipeline: Pipeline) -> Pipeline {
    pipeline
        .lookup_with(
            Collection::Users,
            "owner",
            ID_FIELD,
            "owner",
            Pipeline::new().project(shapes::PROFILE_FIELDS),
        )
        .first("owner")
}

/// Adds an integer `likes` field counting likes on each row.
pub(crate) fn with_like_count(pipeline: Pipeline, kind: TargetKind) -> Pipeline {
    pipeline
        .lookup(Collection::Likes, ID_FIELD, kind.field(), "likes")
        .size("likes", "likes")
}

/// Replaces `field` (a user id) with that user's public profile and drops
/// rows whose user no longer resolves.
fn with_profile(pipeline: Pipeline, field: &str) -> Pipeline {
    pipeline
        .lookup_with(
            Collection::Users,
            field,
            ID_FIELD,
            field,
            Pipeline::new().project(shapes::PROFILE_FIELDS),
        )
        .first(field)
        .matching(Filter::exists(field))
}

fn playlist_videos(pipeline: Pipeline) -> Pipeline {
    pipeline.lookup_with(Collection::Videos, "videos", ID_FIELD, "videos", with_owner(Pipeline::new()))
}

fn decode<T: DeserializeOwned>(document: Document) -> Result<T, CoreError> {
    Ok(from_document(document)?)
}

#[derive(Deserialize)]
struct FacetRow<T> {
    items: Vec<T>,
    total: u64,
}

/// Composes read views over an [`EntityStore`].
pub struct ViewComposer<'c, S: ?Sized> {
    store: &'c S,
    settings: PaginationSettings,
}

impl<'c, S> ViewComposer<'c, S>
where
    S: EntityStore + ?Sized,
{
    pub fn new(store: &'c S, settings: PaginationSettings) -> Self {
        Self { store, settings }
    }

    fn page_request(&self, page: u64, limit: u64) -> Result<PageRequest, ValidationError> {
        PageRequest::new(page, limit, &self.settings)
    }

    /// Offset pagination evaluated in one pass: `base → sort → facet(items)`.
    async fn offset_page<T: DeserializeOwned>(
        &self,
        collection: Collection,
        base: Pipeline,
        sort: SortSpec,
        request: PageRequest,
        items: Pipeline,
    ) -> Result<Page<T>, CoreError> {
        let pipeline = base.sort(sort).facet(request, items);
        let row = self.store.query(collection, &pipeline).await?.into_iter().next();
        let FacetRow { items, total } = match row {
            Some(row) => decode::<FacetRow<T>>(row)?,
            None => FacetRow {
                items: Vec::new(),
                total: 0,
            },
        };
        Ok(Page {
            items,
            total,
            page: request.page,
            limit: request.limit,
        })
    }

    async fn single<T: DeserializeOwned>(
        &self,
        collection: Collection,
        pipeline: Pipeline,
        id: &EntityId,
    ) -> Result<T, CoreError> {
        let row = self.store.query(collection, &pipeline).await?.into_iter().next();
        match row {
            Some(row) => decode(row),
            None => Err(CoreError::not_found(collection.entity_name(), id)),
        }
    }

    /// Published videos (plus the viewer's own unpublished ones when listing
    /// their channel), searched, sorted and library-paginated.
    pub async fn list_videos(
        &self,
        query: &VideoListQuery,
        viewer: Option<&EntityId>,
    ) -> Result<PaginatedDocs<VideoCard>, CoreError> {
        let owner = query
            .user_id
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| EntityId::param("userId", raw))
            .transpose()?;
        let sort = parse_sort::<VideoSort>(query.sort_by.as_deref(), query.sort_type.as_deref())?;
        let search = text_search_filter(query.query.as_deref(), &VIDEO_SEARCH_FIELDS)?;

        let mut conditions = Vec::new();
        match &owner {
            Some(owner) => {
                conditions.push(Filter::id_eq("owner", owner));
                if viewer != Some(owner) {
                    conditions.push(Filter::eq("isPublished", true));
                }
            }
            None => conditions.push(Filter::eq("isPublished", true)),
        }
        conditions.extend(search);

        let enrich = with_like_count(with_owner(Pipeline::new()), TargetKind::Video);
        paginate(
            self.store,
            Collection::Videos,
            Filter::and(conditions),
            Some(sort),
            enrich,
            PaginateOptions {
                page: query.page,
                limit: query.limit,
            },
            &self.settings,
        )
        .await
    }

    /// A single video with owner, like count and whether `viewer` liked it.
    /// Unpublished videos are only visible to their owner.
    pub async fn video_detail(&self, video_id: &str, viewer: Option<&EntityId>) -> Result<VideoDetail, CoreError> {
        let id = EntityId::param("videoId", video_id)?;
        let mut pipeline = with_like_count(
            with_owner(Pipeline::new().matching(Filter::id_eq(ID_FIELD, &id))),
            TargetKind::Video,
        );
        if let Some(viewer) = viewer {
            pipeline = pipeline.lookup_with(
                Collection::Likes,
                ID_FIELD,
                TargetKind::Video.field(),
                "viewerLikes",
                Pipeline::new().matching(Filter::id_eq("likedBy", viewer)),
            );
        }
        let pipeline = pipeline.any("viewerLikes", "isLiked").unset(["viewerLikes"]);

        let detail: VideoDetail = self.single(Collection::Videos, pipeline, &id).await?;
        let own = match (&detail.video.owner, viewer) {
            (Some(owner), Some(viewer)) => &owner.id == viewer,
            _ => false,
        };
        if !detail.video.is_published && !own {
            return Err(CoreError::not_found("video", &id));
        }
        Ok(detail)
    }

    /// Comments on a video with owner and like count, library-paginated.
    pub async fn video_comments(
        &self,
        video_id: &str,
        options: PaginateOptions,
        sort_by: Option<&str>,
        sort_type: Option<&str>,
    ) -> Result<PaginatedDocs<CommentView>, CoreError> {
        let id = EntityId::param("videoId", video_id)?;
        let sort = parse_sort::<CommentSort>(sort_by, sort_type)?;
        let enrich = with_like_count(with_owner(Pipeline::new()), TargetKind::Comment);
        paginate(
            self.store,
            Collection::Comments,
            Filter::id_eq("video", &id),
            Some(sort),
            enrich,
            options,
            &self.settings,
        )
        .await
    }

    /// A user's public profile plus one page of their tweets with like counts.
    pub async fn user_tweets(&self, user_id: &str, page: u64, limit: u64) -> Result<UserTweets, CoreError> {
        let id = EntityId::param("userId", user_id)?;
        let request = self.page_request(page, limit)?;
        let profile: PublicProfile = self
            .single(
                Collection::Users,
                Pipeline::new()
                    .matching(Filter::id_eq(ID_FIELD, &id))
                    .project(shapes::PROFILE_FIELDS),
                &id,
            )
            .await?;
        let tweets = self
            .offset_page(
                Collection::Tweets,
                Pipeline::new().matching(Filter::id_eq("owner", &id)),
                TweetSort::DEFAULT.spec(None),
                request,
                with_like_count(Pipeline::new(), TargetKind::Tweet),
            )
            .await?;
        Ok(UserTweets { profile, tweets })
    }

    /// Videos the actor liked, newest like first. Likes on videos that no
    /// longer resolve are skipped.
    pub async fn liked_videos(&self, actor: &EntityId, page: u64, limit: u64) -> Result<Page<LikedVideo>, CoreError> {
        let request = self.page_request(page, limit)?;
        let base = Pipeline::new()
            .matching(Filter::id_eq("likedBy", actor))
            .matching(Filter::exists(TargetKind::Video.field()))
            .lookup_with(
                Collection::Videos,
                "video",
                ID_FIELD,
                "video",
                Pipeline::new().project(shapes::VIDEO_SUMMARY_FIELDS),
            )
            .first("video")
            .matching(Filter::exists("video"));
        self.offset_page(Collection::Likes, base, NEWEST_FIRST, request, Pipeline::new())
            .await
    }

    /// Subscribers of a channel with their public profiles.
    pub async fn channel_subscribers(
        &self,
        channel_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<Page<SubscriberEntry>, CoreError> {
        let channel = EntityId::param("channelId", channel_id)?;
        let request = self.page_request(page, limit)?;
        let base = with_profile(Pipeline::new().matching(Filter::id_eq("channel", &channel)), "subscriber");
        self.offset_page(Collection::Subscriptions, base, NEWEST_FIRST, request, Pipeline::new())
            .await
    }

    /// Channels a user subscribes to, with their public profiles.
    pub async fn subscribed_channels(
        &self,
        subscriber_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<Page<ChannelEntry>, CoreError> {
        let subscriber = EntityId::param("subscriberId", subscriber_id)?;
        let request = self.page_request(page, limit)?;
        let base = with_profile(
            Pipeline::new().matching(Filter::id_eq("subscriber", &subscriber)),
            "channel",
        );
        self.offset_page(Collection::Subscriptions, base, NEWEST_FIRST, request, Pipeline::new())
            .await
    }

    /// Channel page header: profile, subscriber counts and whether `viewer`
    /// subscribes.
    pub async fn channel_profile(&self, username: &str, viewer: Option<&EntityId>) -> Result<ChannelProfile, CoreError> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(ValidationError::single("username", "validation.required", "username is required").into());
        }
        let mut pipeline = Pipeline::new()
            .matching(Filter::eq("username", username.as_str()))
            .lookup(Collection::Subscriptions, ID_FIELD, "channel", "subscribers")
            .size("subscribers", "subscribersCount")
            .lookup(Collection::Subscriptions, ID_FIELD, "subscriber", "subscribedTo")
            .size("subscribedTo", "channelsSubscribedToCount");
        if let Some(viewer) = viewer {
            pipeline = pipeline.lookup_with(
                Collection::Subscriptions,
                ID_FIELD,
                "channel",
                "viewerSubscriptions",
                Pipeline::new().matching(Filter::id_eq("subscriber", viewer)),
            );
        }
        let pipeline = pipeline
            .any("viewerSubscriptions", "isSubscribed")
            .unset(["subscribers", "subscribedTo", "viewerSubscriptions"]);

        let row = self.store.query(Collection::Users, &pipeline).await?.into_iter().next();
        match row {
            Some(row) => decode(row),
            None => Err(CoreError::NotFound {
                entity: "channel",
                id: Some(username),
            }),
        }
    }

    /// A user's playlists with resolved, owner-enriched videos.
    pub async fn user_playlists(
        &self,
        user_id: &str,
        page: u64,
        limit: u64,
        sort_by: Option<&str>,
        sort_type: Option<&str>,
    ) -> Result<Page<PlaylistView>, CoreError> {
        let owner = EntityId::param("userId", user_id)?;
        let request = self.page_request(page, limit)?;
        let sort = parse_sort::<PlaylistSort>(sort_by, sort_type)?;
        self.offset_page(
            Collection::Playlists,
            Pipeline::new().matching(Filter::id_eq("owner", &owner)),
            sort,
            request,
            playlist_videos(Pipeline::new()),
        )
        .await
    }

    pub async fn playlist_detail(&self, playlist_id: &str) -> Result<PlaylistView, CoreError> {
        let id = EntityId::param("playlistId", playlist_id)?;
        let pipeline = playlist_videos(Pipeline::new().matching(Filter::id_eq(ID_FIELD, &id)));
        self.single(Collection::Playlists, pipeline, &id).await
    }

    /// Every video of the actor's channel, published or not.
    pub async fn channel_videos(&self, actor: &EntityId) -> Result<Vec<Video>, CoreError> {
        let videos = self
            .store
            .find(Collection::Videos, &Filter::id_eq("owner", actor))
            .await?
            .into_iter()
            .map(|document| from_document::<Video>(document))
            .collect::<Result<Vec<_>, StoreError>>()?;
        if videos.is_empty() {
            return Err(CoreError::NotFound {
                entity: "video",
                id: None,
            });
        }
        Ok(videos)
    }
}
