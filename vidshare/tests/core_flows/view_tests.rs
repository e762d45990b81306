use crate::support::*;

#[tokio::test]
async fn library_pagination_slices_and_reports_total() {
    let client = client();
    let owner = user(&client, "owner").await;
    let base = Utc::now();
    for index in 0..25 {
        raw_video(&client, &owner.id, &format!("video {index:02}"), base + Duration::seconds(index)).await;
    }

    let mut query = listing(Some(&owner.id));
    query.limit = Some(10);
    query.sort_by = Some("createdAt".into());
    query.sort_type = Some("asc".into());

    query.page = Some(2);
    let second = client.views().list_videos(&query, None).await.expect("page 2");
    assert_eq!((second.docs.len(), second.total, second.page, second.limit), (10, 25, 2, 10));
    assert_eq!(second.docs[0].title, "video 10");

    query.page = Some(3);
    let third = client.views().list_videos(&query, None).await.expect("page 3");
    assert_eq!(third.docs.len(), 5);
    assert_eq!(third.docs[4].title, "video 24");

    query.page = Some(4);
    let past_end = client.views().list_videos(&query, None).await.expect("page 4");
    assert!(past_end.docs.is_empty());
    assert_eq!(past_end.total, 25);
}

#[tokio::test]
async fn missing_owner_renders_as_null() {
    let client = client();
    let ghost = EntityId::generate();
    let clip = video(&client, &ghost, "orphan").await;

    let page = client.views().list_videos(&listing(None), None).await.expect("list");
    assert_eq!(page.docs.len(), 1);
    assert!(page.docs[0].owner.is_none());

    let detail = client
        .views()
        .video_detail(clip.id.as_str(), Some(&ghost))
        .await
        .expect("detail");
    let json = serde_json::to_value(&detail).expect("json");
    assert_eq!(json["owner"], Value::Null);
    assert_eq!(json["isLiked"], Value::Bool(false));
}

#[tokio::test]
async fn unknown_sort_field_is_rejected() {
    let client = client();
    let mut query = listing(None);
    query.sort_by = Some("password".into());
    let err = client.views().list_videos(&query, None).await.unwrap_err();
    let CoreError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    assert_eq!(validation.issues[0].field, "sortBy");
}

#[tokio::test]
async fn malformed_identifiers_fail_before_reads() {
    let client = client();
    let err = client.views().video_detail("not-an-id", None).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidIdentifier { field: "videoId", .. }));

    let mut query = listing(None);
    query.user_id = Some("$where".into());
    let err = client.views().list_videos(&query, None).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn text_search_is_case_insensitive_and_literal() {
    let client = client();
    let owner = user(&client, "owner").await;
    video(&client, &owner.id, "Rust (Advanced)").await;
    video(&client, &owner.id, "rust basics").await;
    video(&client, &owner.id, "Go tour").await;

    let search = |term: &str| {
        let mut query = listing(None);
        query.query = Some(term.into());
        query
    };
    let views = client.views();

    let hits = views.list_videos(&search("RUST"), None).await.expect("search");
    assert_eq!(hits.total, 2);

    let hits = views.list_videos(&search("(advanced)"), None).await.expect("search");
    assert_eq!(hits.total, 1);
    assert_eq!(hits.docs[0].title, "Rust (Advanced)");

    let hits = views.list_videos(&search(".*"), None).await.expect("search");
    assert_eq!(hits.total, 0);

    // descriptions are searched too
    let hits = views.list_videos(&search("ABOUT go"), None).await.expect("search");
    assert_eq!(hits.total, 1);
}

#[tokio::test]
async fn sort_ties_keep_insertion_order() {
    let client = client();
    let owner = user(&client, "owner").await;
    let at = Utc::now();
    let mut expected = Vec::new();
    for title in ["first", "second", "third"] {
        expected.push(raw_video(&client, &owner.id, title, at).await.id);
    }

    for direction in ["desc", "asc"] {
        let mut query = listing(None);
        query.sort_type = Some(direction.into());
        let page = client.views().list_videos(&query, None).await.expect("list");
        let ids: Vec<_> = page.docs.into_iter().map(|card| card.id).collect();
        assert_eq!(ids, expected, "ties reordered for {direction}");
    }
}

#[tokio::test]
async fn views_sort_descending_by_default() {
    let client = client();
    let owner = user(&client, "owner").await;
    let quiet = video(&client, &owner.id, "quiet").await;
    let popular = video(&client, &owner.id, "popular").await;
    client
        .collection::<Video>()
        .update(&popular.id, patch("views", Value::from(500)))
        .await
        .expect("views");
    client
        .collection::<Video>()
        .update(&quiet.id, patch("views", Value::from(3)))
        .await
        .expect("views");

    let mut query = listing(None);
    query.sort_by = Some("views".into());
    let page = client.views().list_videos(&query, None).await.expect("list");
    let titles: Vec<_> = page.docs.iter().map(|card| card.title.as_str()).collect();
    assert_eq!(titles, ["popular", "quiet"]);
}

#[tokio::test]
async fn offset_pagination_rejects_page_zero_while_library_pagination_normalizes() {
    let client = client();
    let owner = user(&client, "owner").await;
    let clip = video(&client, &owner.id, "clip").await;
    comment(&client, &clip, &owner.id, "hello").await;

    let err = client
        .views()
        .user_tweets(owner.id.as_str(), 0, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let err = client
        .views()
        .user_tweets(owner.id.as_str(), 1, 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let comments = client
        .views()
        .video_comments(clip.id.as_str(), PaginateOptions { page: Some(0), limit: Some(1_000) }, None, None)
        .await
        .expect("comments");
    assert_eq!(comments.page, 1);
    assert_eq!(comments.limit, 100);
    assert_eq!(comments.docs.len(), 1);
    assert_eq!(
        comments.docs[0].owner.as_ref().map(|owner| owner.username.as_str()),
        Some("owner")
    );
}

#[tokio::test]
async fn unpublished_videos_are_visible_only_to_their_owner() {
    let client = client();
    let owner = user(&client, "owner").await;
    let viewer = user(&client, "viewer").await;
    let draft = video(&client, &owner.id, "draft").await;
    let toggled = client
        .content()
        .toggle_publish_status(draft.id.as_str(), &owner.id)
        .await
        .expect("unpublish");
    assert!(!toggled.is_published);

    let public = client.views().list_videos(&listing(None), Some(&viewer.id)).await.expect("list");
    assert_eq!(public.total, 0);
    let own = client
        .views()
        .list_videos(&listing(Some(&owner.id)), Some(&owner.id))
        .await
        .expect("own list");
    assert_eq!(own.total, 1);

    let err = client
        .views()
        .video_detail(draft.id.as_str(), Some(&viewer.id))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    client
        .views()
        .video_detail(draft.id.as_str(), Some(&owner.id))
        .await
        .expect("owner sees draft");

    let all = client.views().channel_videos(&owner.id).await.expect("channel videos");
    assert_eq!(all.len(), 1);
    let err = client.views().channel_videos(&viewer.id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn user_tweets_include_profile_and_like_counts() {
    let client = client();
    let author = user(&client, "author").await;
    let fan = user(&client, "fan").await;
    let tweet = client
        .content()
        .create_tweet(&author.id, Some("first post"))
        .await
        .expect("tweet");
    client
        .toggles()
        .toggle_tweet_like(tweet.id.as_str(), &fan.id)
        .await
        .expect("like");

    let tweets = client
        .views()
        .user_tweets(author.id.as_str(), 1, 10)
        .await
        .expect("tweets");
    assert_eq!(tweets.profile.username, "author");
    assert_eq!(tweets.tweets.total, 1);
    assert_eq!(tweets.tweets.items[0].likes, 1);

    let err = client
        .views()
        .user_tweets(EntityId::generate().as_str(), 1, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "user", .. }));
}

#[tokio::test]
async fn liked_videos_skip_deleted_targets() {
    let client = client();
    let owner = user(&client, "owner").await;
    let fan = user(&client, "fan").await;
    let kept = video(&client, &owner.id, "kept").await;
    let gone = video(&client, &owner.id, "gone").await;
    for clip in [&kept, &gone] {
        client
            .toggles()
            .toggle_video_like(clip.id.as_str(), &fan.id)
            .await
            .expect("like");
    }
    client
        .store()
        .delete_by_id(Collection::Videos, &gone.id)
        .await
        .expect("raw delete");

    let liked = client.views().liked_videos(&fan.id, 1, 10).await.expect("liked");
    assert_eq!(liked.total, 1);
    assert_eq!(liked.items[0].video.id, kept.id);
}

#[tokio::test]
async fn offset_pagination_slices_and_reports_total() {
    let client = client();
    let author = user(&client, "author").await;
    let base = Utc::now();
    for index in 0..25 {
        let created_at = base + Duration::seconds(index);
        let tweet = vidshare::types::Tweet {
            id: EntityId::generate(),
            content: format!("tweet {index:02}"),
            owner: author.id.clone(),
            created_at,
            updated_at: created_at,
        };
        client.collection::<vidshare::types::Tweet>().create(&tweet).await.expect("insert tweet");
    }

    let views = client.views();
    let second = views.user_tweets(author.id.as_str(), 2, 10).await.expect("page 2").tweets;
    assert_eq!((second.items.len(), second.total, second.page, second.limit), (10, 25, 2, 10));
    assert_eq!(second.items[0].content, "tweet 14");

    let third = views.user_tweets(author.id.as_str(), 3, 10).await.expect("page 3").tweets;
    assert_eq!((third.items.len(), third.total), (5, 25));
    assert_eq!(third.items[4].content, "tweet 00");
    assert!(!third.has_more());

    let past_end = views.user_tweets(author.id.as_str(), 4, 10).await.expect("page 4").tweets;
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.total, 25);
}

#[tokio::test]
async fn huge_page_numbers_are_handled_without_overflow() {
    let client = client();
    let owner = user(&client, "owner").await;
    video(&client, &owner.id, "only").await;

    let mut query = listing(None);
    query.page = Some(u64::MAX / 2);
    query.limit = Some(10);
    let page = client.views().list_videos(&query, None).await.expect("lenient page");
    assert!(page.docs.is_empty());
    assert_eq!((page.total, page.page), (1, u64::MAX / 2));

    let err = client
        .views()
        .user_tweets(owner.id.as_str(), u64::MAX / 2, 10)
        .await
        .unwrap_err();
    let CoreError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    assert_eq!(validation.issues[0].field, "page");
}

#[tokio::test]
async fn title_sort_treats_timestamp_like_titles_as_text() {
    let client = client();
    let owner = user(&client, "owner").await;
    let base = Utc::now();
    let mut titles = Vec::new();
    for index in 0..64i64 {
        let hour = index % 24;
        let title = match index % 3 {
            0 => format!("2024-01-01T{hour:02}:00:00-05:00"),
            1 => format!("2024-01-01T{hour:02}:00:00Z"),
            _ => format!("2024-01-01T{hour:02}:30"),
        };
        raw_video(&client, &owner.id, &title, base + Duration::seconds(index)).await;
        titles.push(title);
    }

    let mut query = listing(None);
    query.limit = Some(100);
    query.sort_by = Some("title".into());
    let page = client.views().list_videos(&query, None).await.expect("sorted by title");

    titles.sort();
    let listed: Vec<_> = page.docs.iter().map(|card| card.title.clone()).collect();
    assert_eq!(listed, titles);
}
