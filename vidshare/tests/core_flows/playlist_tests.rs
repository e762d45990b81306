use crate::support::*;

#[tokio::test]
async fn membership_changes_return_the_sequence() {
    let client = client();
    let owner = user(&client, "owner").await;
    let first = video(&client, &owner.id, "first").await;
    let second = video(&client, &owner.id, "second").await;
    let playlist = playlist_with(&client, &owner.id, "mix", &[&first]).await;

    let videos = client
        .integrity()
        .add_video_to_playlist(playlist.id.as_str(), second.id.as_str(), &owner.id)
        .await
        .expect("add");
    assert_eq!(videos, vec![first.id.clone(), second.id.clone()]);

    let videos = client
        .integrity()
        .remove_video_from_playlist(playlist.id.as_str(), first.id.as_str(), &owner.id)
        .await
        .expect("remove");
    assert_eq!(videos, vec![second.id.clone()]);
}

#[tokio::test]
async fn duplicate_add_is_already_exists() {
    let client = client();
    let owner = user(&client, "owner").await;
    let clip = video(&client, &owner.id, "clip").await;
    let playlist = playlist_with(&client, &owner.id, "mix", &[&clip]).await;

    let err = client
        .integrity()
        .add_video_to_playlist(playlist.id.as_str(), clip.id.as_str(), &owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyExists { .. }));
    assert_eq!(stored_playlist(&client, &playlist.id).await.videos.len(), 1);
}

#[tokio::test]
async fn removing_an_absent_video_is_not_found() {
    let client = client();
    let owner = user(&client, "owner").await;
    let clip = video(&client, &owner.id, "clip").await;
    let playlist = playlist_with(&client, &owner.id, "empty", &[]).await;

    let err = client
        .integrity()
        .remove_video_from_playlist(playlist.id.as_str(), clip.id.as_str(), &owner.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn adding_a_missing_video_is_not_found() {
    let client = client();
    let owner = user(&client, "owner").await;
    let playlist = playlist_with(&client, &owner.id, "empty", &[]).await;

    let err = client
        .integrity()
        .add_video_to_playlist(playlist.id.as_str(), EntityId::generate().as_str(), &owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "video", .. }));
}

#[tokio::test]
async fn non_owners_are_forbidden() {
    let client = client();
    let owner = user(&client, "owner").await;
    let intruder = user(&client, "intruder").await;
    let clip = video(&client, &owner.id, "clip").await;
    let playlist = playlist_with(&client, &owner.id, "mix", &[&clip]).await;
    let integrity = client.integrity();

    let add = integrity
        .add_video_to_playlist(playlist.id.as_str(), clip.id.as_str(), &intruder.id)
        .await
        .unwrap_err();
    let remove = integrity
        .remove_video_from_playlist(playlist.id.as_str(), clip.id.as_str(), &intruder.id)
        .await
        .unwrap_err();
    let delete = integrity
        .delete_playlist(playlist.id.as_str(), &intruder.id)
        .await
        .unwrap_err();
    for err in [add, remove, delete] {
        assert!(matches!(err, CoreError::Forbidden { entity: "playlist" }), "{err:?}");
    }
    assert_eq!(stored_playlist(&client, &playlist.id).await.videos, vec![clip.id.clone()]);

    integrity
        .delete_playlist(playlist.id.as_str(), &owner.id)
        .await
        .expect("owner delete");
    assert!(!client.collection::<Playlist>().exists(&playlist.id).await.expect("exists"));
}

#[tokio::test]
async fn detail_drops_unresolvable_videos_but_keeps_the_sequence() {
    let client = client();
    let owner = user(&client, "owner").await;
    let kept = video(&client, &owner.id, "kept").await;
    let gone = video(&client, &owner.id, "gone").await;
    let playlist = playlist_with(&client, &owner.id, "mix", &[&gone, &kept]).await;

    assert!(
        client
            .store()
            .delete_by_id(Collection::Videos, &gone.id)
            .await
            .expect("raw delete")
    );

    let view = client
        .views()
        .playlist_detail(playlist.id.as_str())
        .await
        .expect("detail");
    let ids: Vec<_> = view.videos.iter().map(|video| video.id.clone()).collect();
    assert_eq!(ids, vec![kept.id.clone()]);
    assert_eq!(
        view.videos[0].owner.as_ref().map(|owner| owner.username.as_str()),
        Some("owner")
    );
    assert_eq!(stored_playlist(&client, &playlist.id).await.videos, vec![gone.id.clone(), kept.id.clone()]);
}

#[tokio::test]
async fn user_playlists_sort_by_name() {
    let client = client();
    let owner = user(&client, "owner").await;
    for name in ["beta", "alpha", "gamma"] {
        playlist_with(&client, &owner.id, name, &[]).await;
    }

    let page = client
        .views()
        .user_playlists(owner.id.as_str(), 1, 10, Some("name"), Some("asc"))
        .await
        .expect("playlists");
    let names: Vec<_> = page.items.iter().map(|playlist| playlist.name.as_str()).collect();
    assert_eq!(names, ["alpha", "beta", "gamma"]);
    assert_eq!(page.total, 3);

    let err = client
        .views()
        .user_playlists(owner.id.as_str(), 1, 10, Some("views"), None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}
