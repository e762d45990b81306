use crate::support::*;

#[tokio::test]
async fn total_likes_follow_toggles() {
    let client = client();
    let creator = user(&client, "creator").await;
    let fan = user(&client, "fan").await;
    let clip = video(&client, &creator.id, "clip").await;
    client
        .collection::<Video>()
        .update(&clip.id, patch("views", Value::from(42)))
        .await
        .expect("views");

    client
        .toggles()
        .toggle_video_like(clip.id.as_str(), &fan.id)
        .await
        .expect("like");
    let stats = client.stats().channel_stats(&creator.id).await.expect("stats");
    assert_eq!(stats.total_likes, 1);
    assert_eq!(stats.total_videos, 1);
    assert_eq!(stats.total_views, 42);
    assert_eq!(stats.profile.username, "creator");

    client
        .toggles()
        .toggle_video_like(clip.id.as_str(), &fan.id)
        .await
        .expect("unlike");
    let stats = client.stats().channel_stats(&creator.id).await.expect("stats");
    assert_eq!(stats.total_likes, 0);
}

#[tokio::test]
async fn total_likes_cover_comments_and_tweets_owned_by_the_channel() {
    let client = client();
    let creator = user(&client, "creator").await;
    let other = user(&client, "other").await;
    let fan = user(&client, "fan").await;
    let clip = video(&client, &other.id, "not mine").await;
    let own_comment = comment(&client, &clip, &creator.id, "mine").await;
    let foreign_comment = comment(&client, &clip, &other.id, "theirs").await;
    let tweet = client
        .content()
        .create_tweet(&creator.id, Some("news"))
        .await
        .expect("tweet");

    let toggles = client.toggles();
    toggles
        .toggle_comment_like(own_comment.id.as_str(), &fan.id)
        .await
        .expect("like");
    toggles
        .toggle_comment_like(foreign_comment.id.as_str(), &fan.id)
        .await
        .expect("like");
    toggles.toggle_tweet_like(tweet.id.as_str(), &fan.id).await.expect("like");
    toggles.toggle_video_like(clip.id.as_str(), &fan.id).await.expect("like");

    let stats = client.stats().channel_stats(&creator.id).await.expect("stats");
    assert_eq!(stats.total_likes, 2);
    assert_eq!(stats.total_videos, 0);

    let json = serde_json::to_value(&stats).expect("json");
    assert_eq!(json["totalLikes"], Value::from(2));
    assert_eq!(json["username"], Value::from("creator"));
}

#[tokio::test]
async fn subscriber_list_holds_exactly_the_subscriber() {
    let client = client();
    let first = user(&client, "first").await;
    let second = user(&client, "second").await;

    client
        .toggles()
        .toggle_subscription(second.id.as_str(), &first.id)
        .await
        .expect("subscribe");

    let subscribers = client
        .views()
        .channel_subscribers(second.id.as_str(), 1, 10)
        .await
        .expect("subscribers");
    assert_eq!(subscribers.total, 1);
    assert_eq!(subscribers.items.len(), 1);
    assert_eq!(subscribers.items[0].subscriber.id, first.id);

    let channels = client
        .views()
        .subscribed_channels(first.id.as_str(), 1, 10)
        .await
        .expect("channels");
    assert_eq!(channels.items.len(), 1);
    assert_eq!(channels.items[0].channel.id, second.id);

    let stats = client.stats().channel_stats(&second.id).await.expect("stats");
    assert_eq!(stats.total_subscribers, 1);
    let stats = client.stats().channel_stats(&first.id).await.expect("stats");
    assert_eq!(stats.total_subscribers, 0);
}

#[tokio::test]
async fn stats_for_unknown_channel_are_not_found() {
    let client = client();
    let err = client
        .stats()
        .channel_stats(&EntityId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "channel", .. }));
}

#[tokio::test]
async fn stats_carry_cover_image_and_ignore_other_channels_likes() {
    let client = client();
    let creator = client
        .content()
        .register_user(NewUser {
            username: Some("creator".into()),
            full_name: Some("Creator".into()),
            email: Some("creator@example.com".into()),
            cover_image: Some("https://cdn.example.com/cover.png".into()),
            ..NewUser::default()
        })
        .await
        .expect("register");
    let other = user(&client, "other").await;
    let fan = user(&client, "fan").await;
    let theirs = video(&client, &other.id, "theirs").await;
    client
        .toggles()
        .toggle_video_like(theirs.id.as_str(), &fan.id)
        .await
        .expect("like");

    let stats = client.stats().channel_stats(&creator.id).await.expect("stats");
    assert_eq!(stats.total_likes, 0);
    assert_eq!(stats.cover_image.as_deref(), Some("https://cdn.example.com/cover.png"));
    let json = serde_json::to_value(&stats).expect("json");
    assert_eq!(json["coverImage"], Value::from("https://cdn.example.com/cover.png"));

    let mine = video(&client, &creator.id, "mine").await;
    client
        .toggles()
        .toggle_video_like(mine.id.as_str(), &fan.id)
        .await
        .expect("like");
    let stats = client.stats().channel_stats(&creator.id).await.expect("stats");
    assert_eq!(stats.total_likes, 1);
}
