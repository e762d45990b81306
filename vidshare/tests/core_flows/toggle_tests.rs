use crate::support::*;

#[tokio::test]
async fn like_toggle_flips_state_and_detail_flag() {
    let client = client();
    let owner = user(&client, "owner").await;
    let fan = user(&client, "fan").await;
    let clip = video(&client, &owner.id, "clip").await;

    let first = client
        .toggles()
        .toggle_video_like(clip.id.as_str(), &fan.id)
        .await
        .expect("like");
    assert_eq!(first.state, ToggleState::Added);
    assert_eq!(count(&client, Collection::Likes, "video", &clip.id).await, 1);

    let detail = client
        .views()
        .video_detail(clip.id.as_str(), Some(&fan.id))
        .await
        .expect("detail");
    assert!(detail.is_liked);
    assert_eq!(detail.video.likes, 1);

    let second = client
        .toggles()
        .toggle_video_like(clip.id.as_str(), &fan.id)
        .await
        .expect("unlike");
    assert_eq!(second.state, ToggleState::Removed);
    assert_eq!(second.relation_id, first.relation_id);
    assert_eq!(count(&client, Collection::Likes, "video", &clip.id).await, 0);

    let detail = client
        .views()
        .video_detail(clip.id.as_str(), Some(&fan.id))
        .await
        .expect("detail");
    assert!(!detail.is_liked);
    assert_eq!(detail.video.likes, 0);
}

#[tokio::test]
async fn likes_on_different_targets_are_independent() {
    let client = client();
    let owner = user(&client, "owner").await;
    let clip = video(&client, &owner.id, "clip").await;
    let remark = comment(&client, &clip, &owner.id, "first").await;
    let tweet = client
        .content()
        .create_tweet(&owner.id, Some("hello"))
        .await
        .expect("tweet");

    let toggles = client.toggles();
    toggles.toggle_video_like(clip.id.as_str(), &owner.id).await.expect("video like");
    toggles
        .toggle_comment_like(remark.id.as_str(), &owner.id)
        .await
        .expect("comment like");
    toggles.toggle_tweet_like(tweet.id.as_str(), &owner.id).await.expect("tweet like");

    assert_eq!(count(&client, Collection::Likes, "likedBy", &owner.id).await, 3);
    assert_eq!(count(&client, Collection::Likes, "comment", &remark.id).await, 1);
}

#[tokio::test]
async fn toggling_a_like_on_a_missing_video_is_not_found() {
    let client = client();
    let fan = user(&client, "fan").await;
    let err = client
        .toggles()
        .toggle_video_like(EntityId::generate().as_str(), &fan.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "video", .. }));
    assert_eq!(count(&client, Collection::Likes, "likedBy", &fan.id).await, 0);
}

#[tokio::test]
async fn subscription_toggle_round_trip() {
    let client = client();
    let channel = user(&client, "channel").await;
    let viewer = user(&client, "viewer").await;

    let on = client
        .toggles()
        .toggle_subscription(channel.id.as_str(), &viewer.id)
        .await
        .expect("subscribe");
    assert!(on.is_active());
    assert_eq!(on.message("Subscribed", "Unsubscribed"), "Subscribed");

    let profile = client
        .views()
        .channel_profile("Channel", Some(&viewer.id))
        .await
        .expect("profile");
    assert!(profile.is_subscribed);
    assert_eq!(profile.subscribers_count, 1);

    let off = client
        .toggles()
        .toggle_subscription(channel.id.as_str(), &viewer.id)
        .await
        .expect("unsubscribe");
    assert!(!off.is_active());
    assert_eq!(count(&client, Collection::Subscriptions, "channel", &channel.id).await, 0);
}

#[test]
fn concurrent_toggles_leave_at_most_one_like() {
    const THREADS: usize = 8;

    let client = client();
    let setup = current_runtime();
    let (clip, fan) = setup.block_on(async {
        let owner = user(&client, "owner").await;
        let fan = user(&client, "fan").await;
        (video(&client, &owner.id, "race").await, fan)
    });

    let states: Vec<ToggleState> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    current_runtime()
                        .block_on(client.toggles().toggle_video_like(clip.id.as_str(), &fan.id))
                        .expect("toggle")
                        .state
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().expect("thread")).collect()
    });

    let added = states.iter().filter(|state| **state == ToggleState::Added).count();
    let removed = states.len() - added;
    let rows = setup.block_on(count(&client, Collection::Likes, "video", &clip.id));
    assert!(rows <= 1, "found {rows} like rows for one (video, user) pair");
    assert_eq!(rows as usize, added - removed);
    // an even number of flips ends where it started
    assert_eq!(rows, 0);
}
