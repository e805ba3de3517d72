use chrono::Duration;
use domains::AppError;
use integration_tests::TestApp;

#[tokio::test]
async fn transliterated_titles_get_distinct_slugs() {
    let app = TestApp::new().await;
    let accented = app.topic("Zeki Müren").await;
    let plain = app.topic("zeki muren").await;

    assert_eq!(accented.title, "zeki müren");
    assert_eq!(accented.slug, "zeki-muren");
    assert_eq!(plain.slug, "zeki-muren-2");
    assert_eq!(accented.absolute_url(), "/topic/zeki-muren/");

    let found = app.services.topics.get_by_slug("zeki-muren-2").await.unwrap().unwrap();
    assert_eq!(found.id, plain.id);
}

#[tokio::test]
async fn duplicate_titles_conflict() {
    let app = TestApp::new().await;
    app.topic("ılık süt").await;

    let err = app.services.topics.create_topic("ILIK SÜT").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let err = app.services.topics.create_topic("   ").await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn category_slugs_are_unique_too() {
    let app = TestApp::new().await;
    let sugar = app.services.categories.create_category("şeker", None).await.unwrap();
    let plain = app.services.categories.create_category("seker", None).await.unwrap();

    assert_eq!(sugar.slug, "seker");
    assert_eq!(plain.slug, "seker-2");
    assert_eq!(app.services.categories.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn only_published_entries_count_as_topic_content() {
    let app = TestApp::new().await;
    let writer = app.novice("yazar").await;
    let topic = app.topic("boş başlık").await;
    let topics = &app.services.topics;

    assert!(topic.exists());
    assert!(!topics.has_entries(topic.id).await.unwrap());

    let draft = app.draft(topic.id, writer.id).await;
    assert!(!topics.has_entries(topic.id).await.unwrap());
    assert_eq!(topics.get(topic.id).await.unwrap().created_by, None);

    app.services.entries.publish(draft.id).await.unwrap();
    assert!(topics.has_entries(topic.id).await.unwrap());
}

#[tokio::test]
async fn first_published_author_claims_the_topic() {
    let app = TestApp::new().await;
    let early = app.novice("erken").await;
    let late = app.novice("geç").await;
    let topic = app.topic("sahiplik").await;

    let draft = app.draft(topic.id, early.id).await;
    app.publish(topic.id, late.id).await;
    app.services.entries.publish(draft.id).await.unwrap();

    let stored = app.services.topics.get(topic.id).await.unwrap();
    assert_eq!(stored.created_by, Some(late.id));
}

#[tokio::test]
async fn latest_entry_date_hides_own_and_blocked_entries() {
    let app = TestApp::new().await;
    let viewer = app.author("okur").await;
    let friend = app.author("dost").await;
    let troll = app.author("trol").await;
    let topic = app.topic("güncel").await;
    let topics = &app.services.topics;

    assert_eq!(topics.latest_entry_date(topic.id, Some(viewer.id)).await.unwrap(), topic.created_at);

    app.clock.advance(Duration::hours(1));
    let friendly = app.publish(topic.id, friend.id).await;
    app.clock.advance(Duration::hours(1));
    app.publish(topic.id, viewer.id).await;
    app.clock.advance(Duration::hours(1));
    let trolling = app.publish(topic.id, troll.id).await;

    assert_eq!(topics.latest_entry_date(topic.id, None).await.unwrap(), trolling.created_at);
    assert_eq!(
        topics.latest_entry_date(topic.id, Some(viewer.id)).await.unwrap(),
        trolling.created_at
    );

    app.services.authors.block(viewer.id, troll.id).await.unwrap();
    assert_eq!(
        topics.latest_entry_date(topic.id, Some(viewer.id)).await.unwrap(),
        friendly.created_at
    );
    // Blocking is directional here: the troll still sees everything but their own.
    assert_eq!(
        topics.latest_entry_date(topic.id, Some(troll.id)).await.unwrap(),
        friendly.created_at + Duration::hours(1)
    );
}

#[tokio::test]
async fn follow_check_tracks_topic_subscriptions() {
    let app = TestApp::new().await;
    let reader = app.novice("okur").await;
    let topic = app.topic("takipte").await;
    let topics = &app.services.topics;

    assert!(!topics.follow_check(topic.id, reader.id).await.unwrap());
    let following = topics.follow(topic.id, reader.id).await.unwrap();
    assert_eq!(following.read_at, app.now());
    assert!(topics.follow_check(topic.id, reader.id).await.unwrap());

    let err = topics.follow(topic.id, reader.id).await.unwrap_err();
    assert!(err.is_conflict());

    assert!(topics.unfollow(topic.id, reader.id).await.unwrap());
    assert!(!topics.follow_check(topic.id, reader.id).await.unwrap());
}
