#![allow(dead_code)]

use blogicum::{
    AppConfig, AppState, InMemoryRepository, MockStorageService,
    auth::AuthUser,
    models::{CreateCategoryRequest, CreatePostRequest, Post, User},
    policy::Viewer,
    repository::Repository,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub const AUTHOR_ID: Uuid = Uuid::from_u128(1);
pub const OTHER_ID: Uuid = Uuid::from_u128(2);
pub const STAFF_ID: Uuid = Uuid::from_u128(3);

/// A fixed "now" so publication boundaries are deterministic.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub fn yesterday() -> DateTime<Utc> {
    now() - Duration::days(1)
}

pub fn tomorrow() -> DateTime<Utc> {
    now() + Duration::days(1)
}

pub fn user(id: Uuid, username: &str, is_staff: bool) -> User {
    User {
        id,
        username: username.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        email: format!("{username}@example.com"),
        is_staff,
        created_at: Utc::now(),
    }
}

pub fn auth_user(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        username: user.username.clone(),
        is_staff: user.is_staff,
    }
}

pub fn viewer(user: &User) -> Viewer {
    Viewer::User {
        id: user.id,
        is_staff: user.is_staff,
    }
}

/// A resolved post for the pure policy tests.
pub fn post(
    author_id: Uuid,
    is_published: bool,
    category_is_published: Option<bool>,
    pub_date: DateTime<Utc>,
) -> Post {
    Post {
        id: 1,
        title: "Title".to_string(),
        text: "Text".to_string(),
        pub_date,
        is_published,
        author_id,
        author_username: "author".to_string(),
        category_id: category_is_published.map(|_| 7),
        category_slug: category_is_published.map(|_| "news".to_string()),
        category_title: category_is_published.map(|_| "News".to_string()),
        category_is_published,
        ..Post::default()
    }
}

pub fn new_post(
    title: &str,
    pub_date: DateTime<Utc>,
    is_published: bool,
    category_id: Option<i64>,
) -> CreatePostRequest {
    CreatePostRequest {
        title: title.to_string(),
        text: format!("{title} body"),
        pub_date,
        is_published,
        category_id,
        location_id: None,
        image_key: None,
    }
}

pub fn new_category(slug: &str, is_published: bool) -> CreateCategoryRequest {
    CreateCategoryRequest {
        title: slug.to_uppercase(),
        description: String::new(),
        slug: slug.to_string(),
        is_published,
    }
}

/// An in-memory store with an author, another user and a staff member.
pub struct Fixture {
    pub repo: Arc<InMemoryRepository>,
    pub author: User,
    pub other: User,
    pub staff: User,
}

impl Fixture {
    pub async fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let author = repo.seed_user(user(AUTHOR_ID, "author", false)).await;
        let other = repo.seed_user(user(OTHER_ID, "reader", false)).await;
        let staff = repo.seed_user(user(STAFF_ID, "moderator", true)).await;
        Self {
            repo,
            author,
            other,
            staff,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            repo: self.repo.clone(),
            storage: Arc::new(MockStorageService::new()),
            config: AppConfig::default(),
        }
    }

    pub async fn publish(&self, title: &str, pub_date: DateTime<Utc>, category_id: Option<i64>) -> Post {
        self.repo
            .create_post(self.author.id, new_post(title, pub_date, true, category_id))
            .await
            .unwrap()
    }

    pub async fn draft(&self, title: &str) -> Post {
        self.repo
            .create_post(self.author.id, new_post(title, yesterday(), false, None))
            .await
            .unwrap()
    }
}
