use crate::support::*;

struct Fixture {
    client: TestClient,
    owner: User,
    fan: User,
    target: Video,
    other: Video,
    playlists: Vec<Playlist>,
}

/// A video with three liked comments, two likes and two playlists that also
/// hold another video.
async fn fixture() -> Fixture {
    let client = client();
    let owner = user(&client, "owner").await;
    let fan = user(&client, "fan").await;
    let critic = user(&client, "critic").await;
    let target = video(&client, &owner.id, "target").await;
    let other = video(&client, &owner.id, "other").await;

    for text in ["one", "two", "three"] {
        let remark = comment(&client, &target, &fan.id, text).await;
        client
            .toggles()
            .toggle_comment_like(remark.id.as_str(), &critic.id)
            .await
            .expect("comment like");
    }
    for liker in [&fan, &critic] {
        client
            .toggles()
            .toggle_video_like(target.id.as_str(), &liker.id)
            .await
            .expect("video like");
    }
    let playlists = vec![
        playlist_with(&client, &owner.id, "mix", &[&target, &other]).await,
        playlist_with(&client, &owner.id, "later", &[&other, &target]).await,
    ];

    Fixture {
        client,
        owner,
        fan,
        target,
        other,
        playlists,
    }
}

#[tokio::test]
async fn deleting_a_video_removes_every_dependent() {
    let f = fixture().await;
    let report = f
        .client
        .integrity()
        .delete_video(f.target.id.as_str(), &f.owner.id)
        .await
        .expect("cascade");

    assert_eq!(report.affected(CascadeStep::DeletePrimary), 1);
    assert_eq!(report.affected(CascadeStep::DeleteComments), 3);
    assert_eq!(report.affected(CascadeStep::DeleteCommentLikes), 3);
    assert_eq!(report.affected(CascadeStep::DeleteLikes), 2);
    assert_eq!(report.affected(CascadeStep::DetachFromPlaylist), 2);
    assert_eq!(report.failures().count(), 0);

    assert_eq!(count(&f.client, Collection::Comments, "video", &f.target.id).await, 0);
    assert_eq!(count(&f.client, Collection::Likes, "video", &f.target.id).await, 0);
    let remaining_likes = f
        .client
        .store()
        .count(Collection::Likes, &vidshare::filters::Filter::exists("comment"))
        .await
        .expect("count");
    assert_eq!(remaining_likes, 0);

    for playlist in &f.playlists {
        let stored = stored_playlist(&f.client, &playlist.id).await;
        assert_eq!(stored.videos, vec![f.other.id.clone()]);
    }
    let deleted = f.client.blobs().deleted();
    assert!(deleted.contains(&f.target.video_file));
    assert!(deleted.contains(&f.target.thumbnail));
    assert!(f.client.blobs().contains(&f.other.video_file));
}

#[tokio::test]
async fn rerunning_a_cascade_is_not_found_and_writes_nothing() {
    let f = fixture().await;
    let integrity = f.client.integrity();
    integrity
        .delete_video(f.target.id.as_str(), &f.owner.id)
        .await
        .expect("first run");
    let blobs_before = f.client.blobs().deleted().len();

    let err = integrity
        .delete_video(f.target.id.as_str(), &f.owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "video", .. }));
    assert_eq!(f.client.blobs().deleted().len(), blobs_before);
}

#[tokio::test]
async fn non_owner_cannot_delete_a_video() {
    let f = fixture().await;
    let err = f
        .client
        .integrity()
        .delete_video(f.target.id.as_str(), &f.fan.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
    assert!(f.client.collection::<Video>().exists(&f.target.id).await.expect("exists"));
    assert_eq!(count(&f.client, Collection::Comments, "video", &f.target.id).await, 3);
    assert!(f.client.blobs().deleted().is_empty());
}

#[tokio::test]
async fn blob_delete_failures_do_not_fail_the_cascade() {
    let f = fixture().await;
    f.client.blobs().fail_deletes(true);

    let report = f
        .client
        .integrity()
        .delete_video(f.target.id.as_str(), &f.owner.id)
        .await
        .expect("blob failures are tolerated");
    let failed: Vec<_> = report.failures().map(|outcome| outcome.step).collect();
    assert_eq!(failed, vec![CascadeStep::DeleteBlob, CascadeStep::DeleteBlob]);
    assert_eq!(report.affected(CascadeStep::DeleteComments), 3);
    assert!(f.client.blobs().contains(&f.target.video_file));
}

#[tokio::test]
async fn playlist_fault_surfaces_as_cascade_error_and_repair_finishes_the_job() {
    let f = fixture().await;
    let [broken, healthy] = [&f.playlists[0], &f.playlists[1]];
    f.client
        .store()
        .fail_writes_to_id(Collection::Playlists, &broken.id)
        .expect("inject fault");

    let err = f
        .client
        .integrity()
        .delete_video(f.target.id.as_str(), &f.owner.id)
        .await
        .unwrap_err();
    let CoreError::Cascade(cascade) = err else {
        panic!("expected cascade error, got {err:?}");
    };
    let failures: Vec<_> = cascade.report.cleanup_failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].subject.as_deref(), Some(broken.id.as_str()));
    assert_eq!(cascade.report.affected(CascadeStep::DeleteComments), 3);

    assert_eq!(stored_playlist(&f.client, &healthy.id).await.videos, vec![f.other.id.clone()]);
    assert!(stored_playlist(&f.client, &broken.id).await.videos.contains(&f.target.id));
    assert!(!f.client.collection::<Video>().exists(&f.target.id).await.expect("exists"));

    f.client.store().clear_faults().expect("clear faults");
    let report = f
        .client
        .integrity()
        .repair_video_dependents(f.target.id.as_str())
        .await
        .expect("repair");
    assert_eq!(report.affected(CascadeStep::DetachFromPlaylist), 1);
    assert_eq!(stored_playlist(&f.client, &broken.id).await.videos, vec![f.other.id.clone()]);
}

#[tokio::test]
async fn repair_refuses_a_live_video() {
    let f = fixture().await;
    let err = f
        .client
        .integrity()
        .repair_video_dependents(f.target.id.as_str())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert_eq!(count(&f.client, Collection::Comments, "video", &f.target.id).await, 3);
}

#[tokio::test]
async fn concurrent_playlist_add_during_cascade_keeps_both_effects() {
    let f = fixture().await;
    let extra = video(&f.client, &f.owner.id, "extra").await;
    let playlist = &f.playlists[0];
    let integrity = f.client.integrity();

    let (deleted, added) = tokio::join!(
        integrity.delete_video(f.target.id.as_str(), &f.owner.id),
        integrity.add_video_to_playlist(playlist.id.as_str(), extra.id.as_str(), &f.owner.id),
    );
    deleted.expect("cascade");
    added.expect("add");

    let stored = stored_playlist(&f.client, &playlist.id).await;
    assert!(!stored.videos.contains(&f.target.id));
    assert!(stored.videos.contains(&extra.id));
    assert!(stored.videos.contains(&f.other.id));
}

#[tokio::test]
async fn deleting_a_comment_removes_its_likes() {
    let client = client();
    let owner = user(&client, "owner").await;
    let fan = user(&client, "fan").await;
    let clip = video(&client, &owner.id, "clip").await;
    let remark = comment(&client, &clip, &fan.id, "nice").await;
    let kept = comment(&client, &clip, &fan.id, "kept").await;
    for liker in [&owner, &fan] {
        client
            .toggles()
            .toggle_comment_like(remark.id.as_str(), &liker.id)
            .await
            .expect("like");
    }
    client
        .toggles()
        .toggle_comment_like(kept.id.as_str(), &owner.id)
        .await
        .expect("like");

    let err = client
        .integrity()
        .delete_comment(remark.id.as_str(), &owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden { entity: "comment" }));

    let report = client
        .integrity()
        .delete_comment(remark.id.as_str(), &fan.id)
        .await
        .expect("delete comment");
    assert_eq!(report.affected(CascadeStep::DeleteLikes), 2);
    assert_eq!(count(&client, Collection::Likes, "comment", &remark.id).await, 0);
    assert_eq!(count(&client, Collection::Likes, "comment", &kept.id).await, 1);
}

#[tokio::test]
async fn deleting_a_tweet_removes_its_likes() {
    let client = client();
    let author = user(&client, "author").await;
    let fan = user(&client, "fan").await;
    let tweet = client
        .content()
        .create_tweet(&author.id, Some("launch day"))
        .await
        .expect("tweet");
    client
        .toggles()
        .toggle_tweet_like(tweet.id.as_str(), &fan.id)
        .await
        .expect("like");

    let report = client
        .integrity()
        .delete_tweet(tweet.id.as_str(), &author.id)
        .await
        .expect("delete tweet");
    assert_eq!(report.affected(CascadeStep::DeleteLikes), 1);
    assert_eq!(count(&client, Collection::Likes, "tweet", &tweet.id).await, 0);
}
