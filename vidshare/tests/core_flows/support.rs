pub(crate) use chrono::{Duration, Utc};
pub(crate) use serde_json::Value;
pub(crate) use vidshare::{
    Client, CoreError, EntityId, MemoryBlobStore, MemoryStore, PaginateOptions, ToggleState, VideoListQuery,
    content::{NewUser, NewVideo},
    integrity::CascadeStep,
    store::EntityStore,
    types::{Collection, Comment, Document, Playlist, User, Video},
};

pub(crate) type TestClient = Client<MemoryStore, MemoryBlobStore>;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn client() -> TestClient {
    init_logging();
    Client::new(MemoryStore::new(), MemoryBlobStore::new())
}

/// A current-thread runtime for tests that drive the client from several OS threads.
pub(crate) fn current_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

pub(crate) async fn user(client: &TestClient, username: &str) -> User {
    client
        .content()
        .register_user(NewUser {
            username: Some(username.into()),
            full_name: Some(format!("{username} full")),
            email: Some(format!("{username}@example.com")),
            ..NewUser::default()
        })
        .await
        .expect("register user")
}

pub(crate) async fn video(client: &TestClient, owner: &EntityId, title: &str) -> Video {
    client
        .content()
        .publish_video(
            owner,
            NewVideo {
                title: Some(title.into()),
                description: Some(format!("about {title}")),
                video_file: Some(format!("{title}.mp4").into()),
                thumbnail: Some(format!("{title}.png").into()),
            },
        )
        .await
        .expect("publish video")
}

pub(crate) async fn comment(client: &TestClient, video: &Video, author: &EntityId, text: &str) -> Comment {
    client
        .content()
        .add_comment(video.id.as_str(), author, Some(text))
        .await
        .expect("add comment")
}

pub(crate) async fn playlist_with(client: &TestClient, owner: &EntityId, name: &str, videos: &[&Video]) -> Playlist {
    let playlist = client
        .content()
        .create_playlist(owner, Some(name), Some("test playlist"))
        .await
        .expect("create playlist");
    for video in videos {
        client
            .integrity()
            .add_video_to_playlist(playlist.id.as_str(), video.id.as_str(), owner)
            .await
            .expect("add to playlist");
    }
    playlist
}

pub(crate) async fn count(client: &TestClient, collection: Collection, field: &str, id: &EntityId) -> u64 {
    client
        .store()
        .count(collection, &vidshare::filters::Filter::id_eq(field, id))
        .await
        .expect("count")
}

pub(crate) async fn stored_playlist(client: &TestClient, id: &EntityId) -> Playlist {
    client
        .collection::<Playlist>()
        .get_or_not_found(id)
        .await
        .expect("playlist")
}

/// Inserts a video row directly with a fixed creation time.
pub(crate) async fn raw_video(client: &TestClient, owner: &EntityId, title: &str, created_at: chrono::DateTime<Utc>) -> Video {
    let video = Video {
        id: EntityId::generate(),
        video_file: format!("memory://blobs/{title}"),
        thumbnail: format!("memory://blobs/{title}-thumb"),
        title: title.into(),
        description: String::new(),
        duration: 1.0,
        views: 0,
        is_published: true,
        owner: owner.clone(),
        created_at,
        updated_at: created_at,
    };
    client.collection::<Video>().create(&video).await.expect("insert video");
    video
}

pub(crate) fn listing(user: Option<&EntityId>) -> VideoListQuery {
    VideoListQuery {
        user_id: user.map(ToString::to_string),
        ..VideoListQuery::default()
    }
}

pub(crate) fn patch(field: &str, value: Value) -> Document {
    let mut document = Document::new();
    document.insert(field.into(), value);
    document
}
