mod common;

use blogicum::{
    AppError,
    listing::{ListingScope, list_posts},
    policy::{Viewer, is_visible},
    repository::Repository,
};
use chrono::Duration;
use common::{Fixture, new_category, new_post, now, tomorrow, viewer, yesterday};

fn ids(page: &blogicum::models::PostPage) -> Vec<i64> {
    page.posts.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn test_public_feed_hides_drafts_scheduled_and_unpublished_categories() {
    let fx = Fixture::new().await;
    let news = fx.repo.create_category(new_category("news", true)).await.unwrap();
    let hidden = fx.repo.create_category(new_category("hidden", false)).await.unwrap();

    let visible = fx.publish("visible", yesterday(), Some(news.id)).await;
    let uncategorised = fx.publish("uncategorised", yesterday(), None).await;
    fx.publish("scheduled", tomorrow(), Some(news.id)).await;
    fx.publish("in hidden category", yesterday(), Some(hidden.id)).await;
    fx.draft("draft").await;

    let page = list_posts(fx.repo.as_ref(), &Viewer::Anonymous, ListingScope::All, None, now())
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    let mut got = ids(&page);
    got.sort();
    assert_eq!(got, vec![visible.id, uncategorised.id]);
}

#[tokio::test]
async fn test_listing_matches_single_post_policy_for_every_viewer() {
    let fx = Fixture::new().await;
    let news = fx.repo.create_category(new_category("news", true)).await.unwrap();
    let hidden = fx.repo.create_category(new_category("hidden", false)).await.unwrap();
    fx.publish("a", yesterday(), Some(news.id)).await;
    fx.publish("b", tomorrow(), None).await;
    fx.publish("c", yesterday(), Some(hidden.id)).await;
    fx.draft("d").await;
    fx.repo
        .create_post(fx.other.id, new_post("e", yesterday(), false, Some(news.id)))
        .await
        .unwrap();

    let viewers = [
        Viewer::Anonymous,
        viewer(&fx.author),
        viewer(&fx.other),
        viewer(&fx.staff),
    ];
    let everything = list_posts(fx.repo.as_ref(), &viewer(&fx.staff), ListingScope::All, None, now())
        .await
        .unwrap();
    assert_eq!(everything.total, 5);

    for v in &viewers {
        let page = list_posts(fx.repo.as_ref(), v, ListingScope::All, None, now())
            .await
            .unwrap();
        let mut expected: Vec<i64> = everything
            .posts
            .iter()
            .filter(|p| is_visible(v, p, now()))
            .map(|p| p.id)
            .collect();
        let mut got = ids(&page);
        expected.sort();
        got.sort();
        assert_eq!(got, expected, "viewer {v:?}");
    }
}

#[tokio::test]
async fn test_ordering_is_newest_first_with_id_tiebreak() {
    let fx = Fixture::new().await;
    let same_time = yesterday();
    let older = fx.publish("older", same_time - Duration::hours(1), None).await;
    let first = fx.publish("first", same_time, None).await;
    let second = fx.publish("second", same_time, None).await;

    let page = list_posts(fx.repo.as_ref(), &Viewer::Anonymous, ListingScope::All, None, now())
        .await
        .unwrap();

    assert_eq!(ids(&page), vec![second.id, first.id, older.id]);
}

#[tokio::test]
async fn test_posts_carry_comment_counts() {
    let fx = Fixture::new().await;
    let busy = fx.publish("busy", yesterday(), None).await;
    let quiet = fx.publish("quiet", yesterday() - Duration::hours(1), None).await;
    for text in ["one", "two", "three"] {
        fx.repo
            .add_comment(busy.id, fx.other.id, text.to_string())
            .await
            .unwrap();
    }

    let page = list_posts(fx.repo.as_ref(), &Viewer::Anonymous, ListingScope::All, None, now())
        .await
        .unwrap();

    let count_of = |id| page.posts.iter().find(|p| p.id == id).unwrap().comment_count;
    assert_eq!(count_of(busy.id), 3);
    assert_eq!(count_of(quiet.id), 0);
}

#[tokio::test]
async fn test_pagination_serves_ten_per_page_and_clamps() {
    let fx = Fixture::new().await;
    for i in 0..23 {
        fx.publish(&format!("post {i}"), yesterday() - Duration::minutes(i), None)
            .await;
    }
    let anon = Viewer::Anonymous;

    let first = list_posts(fx.repo.as_ref(), &anon, ListingScope::All, None, now())
        .await
        .unwrap();
    assert_eq!(first.posts.len(), 10);
    assert_eq!(first.num_pages, 3);
    assert!(first.has_next);
    assert!(!first.has_previous);

    let third = list_posts(fx.repo.as_ref(), &anon, ListingScope::All, Some("3"), now())
        .await
        .unwrap();
    assert_eq!(third.posts.len(), 3);
    assert!(!third.clamped);

    let beyond = list_posts(fx.repo.as_ref(), &anon, ListingScope::All, Some("99"), now())
        .await
        .unwrap();
    assert_eq!(beyond.page, 3);
    assert!(beyond.clamped);
    assert_eq!(ids(&beyond), ids(&third));

    let huge = list_posts(
        fx.repo.as_ref(),
        &anon,
        ListingScope::All,
        Some("99999999999999999999"),
        now(),
    )
    .await
    .unwrap();
    assert_eq!(huge.page, huge.num_pages);
    assert!(huge.clamped);
    assert_eq!(ids(&huge), ids(&third));

    let garbage = list_posts(fx.repo.as_ref(), &anon, ListingScope::All, Some("abc"), now())
        .await
        .unwrap();
    assert_eq!(garbage.page, 1);
    assert!(garbage.clamped);
    assert_eq!(ids(&garbage), ids(&first));
}

#[tokio::test]
async fn test_unpublished_category_feed_is_not_found_for_non_staff() {
    let fx = Fixture::new().await;
    let news = fx.repo.create_category(new_category("news", false)).await.unwrap();
    fx.publish("inside", yesterday(), Some(news.id)).await;

    for v in [Viewer::Anonymous, viewer(&fx.author), viewer(&fx.other)] {
        let result = list_posts(fx.repo.as_ref(), &v, ListingScope::Category(&news), None, now()).await;
        assert!(matches!(result, Err(AppError::NotFound("category"))), "viewer {v:?}");
    }

    let staff_page = list_posts(
        fx.repo.as_ref(),
        &viewer(&fx.staff),
        ListingScope::Category(&news),
        None,
        now(),
    )
    .await
    .unwrap();
    assert_eq!(staff_page.total, 1);
}

#[tokio::test]
async fn test_category_feed_only_lists_that_category() {
    let fx = Fixture::new().await;
    let news = fx.repo.create_category(new_category("news", true)).await.unwrap();
    let travel = fx.repo.create_category(new_category("travel", true)).await.unwrap();
    let in_news = fx.publish("news post", yesterday(), Some(news.id)).await;
    fx.publish("travel post", yesterday(), Some(travel.id)).await;
    fx.publish("no category", yesterday(), None).await;

    let page = list_posts(fx.repo.as_ref(), &Viewer::Anonymous, ListingScope::Category(&news), None, now())
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![in_news.id]);
}

#[tokio::test]
async fn test_unpublishing_a_category_takes_effect_immediately() {
    let fx = Fixture::new().await;
    let news = fx.repo.create_category(new_category("news", true)).await.unwrap();
    let p = fx.publish("story", yesterday(), Some(news.id)).await;

    let before = list_posts(fx.repo.as_ref(), &Viewer::Anonymous, ListingScope::All, None, now())
        .await
        .unwrap();
    assert_eq!(ids(&before), vec![p.id]);

    fx.repo.set_category_published(news.id, false).await.unwrap();

    let after = list_posts(fx.repo.as_ref(), &Viewer::Anonymous, ListingScope::All, None, now())
        .await
        .unwrap();
    assert!(after.posts.is_empty());

    let reloaded = fx.repo.get_post(p.id).await.unwrap().unwrap();
    assert!(!is_visible(&viewer(&fx.other), &reloaded, now()));
    assert!(is_visible(&viewer(&fx.author), &reloaded, now()));

    let own = list_posts(fx.repo.as_ref(), &viewer(&fx.author), ListingScope::All, None, now())
        .await
        .unwrap();
    assert_eq!(ids(&own), vec![p.id]);
}

#[tokio::test]
async fn test_author_feed_shows_everything_to_its_owner_only() {
    let fx = Fixture::new().await;
    let hidden = fx.repo.create_category(new_category("hidden", false)).await.unwrap();
    fx.publish("live", yesterday(), None).await;
    fx.publish("scheduled", tomorrow(), None).await;
    fx.publish("hidden category", yesterday(), Some(hidden.id)).await;
    fx.draft("draft").await;
    fx.repo
        .create_post(fx.other.id, new_post("someone else", yesterday(), true, None))
        .await
        .unwrap();

    let own = list_posts(
        fx.repo.as_ref(),
        &viewer(&fx.author),
        ListingScope::Author(&fx.author),
        None,
        now(),
    )
    .await
    .unwrap();
    assert_eq!(own.total, 4);
    assert!(own.posts.iter().all(|p| p.author_id == fx.author.id));

    let public = list_posts(
        fx.repo.as_ref(),
        &viewer(&fx.other),
        ListingScope::Author(&fx.author),
        None,
        now(),
    )
    .await
    .unwrap();
    assert_eq!(public.total, 1);
    assert_eq!(public.posts[0].title, "live");
}
