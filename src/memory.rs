use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, RegisterUserRequest, UpdatePostRequest, UpdateProfileRequest, User,
    },
    repository::{PostQuery, Repository},
};

#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    title: String,
    text: String,
    pub_date: DateTime<Utc>,
    is_published: bool,
    image: Option<String>,
    author_id: Uuid,
    category_id: Option<i64>,
    location_id: Option<i64>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: i64,
    text: String,
    post_id: i64,
    author_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    categories: BTreeMap<i64, Category>,
    locations: BTreeMap<i64, Location>,
    posts: BTreeMap<i64, PostRow>,
    comments: BTreeMap<i64, CommentRow>,
    last_id: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    /// Builds the resolved read model, joining current category/location state and
    /// counting comments at call time.
    fn hydrate(&self, row: &PostRow) -> Post {
        let author = self.users.get(&row.author_id);
        let category = row.category_id.and_then(|id| self.categories.get(&id));
        let location = row.location_id.and_then(|id| self.locations.get(&id));
        let comment_count = self
            .comments
            .values()
            .filter(|c| c.post_id == row.id)
            .count() as i64;

        Post {
            id: row.id,
            title: row.title.clone(),
            text: row.text.clone(),
            pub_date: row.pub_date,
            is_published: row.is_published,
            image: row.image.clone(),
            author_id: row.author_id,
            author_username: author.map(|u| u.username.clone()).unwrap_or_default(),
            category_id: category.map(|c| c.id),
            category_slug: category.map(|c| c.slug.clone()),
            category_title: category.map(|c| c.title.clone()),
            category_is_published: category.map(|c| c.is_published),
            location_id: location.map(|l| l.id),
            location_name: location.map(|l| l.name.clone()),
            location_is_published: location.map(|l| l.is_published),
            created_at: row.created_at,
            comment_count,
        }
    }

    fn resolve_comment(&self, row: &CommentRow) -> Comment {
        Comment {
            id: row.id,
            text: row.text.clone(),
            post_id: row.post_id,
            author_id: row.author_id,
            author_username: self
                .users
                .get(&row.author_id)
                .map(|u| u.username.clone())
                .unwrap_or_default(),
            created_at: row.created_at,
        }
    }

    fn matching_posts(&self, query: &PostQuery) -> Vec<Post> {
        self.posts
            .values()
            .map(|row| self.hydrate(row))
            .filter(|post| query.matches(post))
            .collect()
    }
}

/// InMemoryRepository
///
/// A process-local `Repository` guarded by a single `RwLock`. Every write runs inside
/// one write-lock section, which gives it the same all-or-nothing behaviour as a single
/// Postgres statement. Used when no `DATABASE_URL` is configured locally, and by tests.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user record verbatim. This is how staff accounts are provisioned,
    /// since registration always creates non-staff users.
    pub async fn seed_user(&self, user: User) -> User {
        let mut store = self.store.write().await;
        store.users.insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let store = self.store.read().await;
        Ok(store.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, req: RegisterUserRequest) -> Result<User, AppError> {
        let mut store = self.store.write().await;
        if store.username_taken(&req.username, None) {
            return Err(AppError::Conflict("username is already taken".to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: req.username,
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            is_staff: false,
            created_at: Utc::now(),
        };
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError> {
        let mut store = self.store.write().await;
        if let Some(username) = &req.username {
            if store.username_taken(username, Some(id)) {
                return Err(AppError::Conflict("username is already taken".to_string()));
            }
        }
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = req.username {
            user.username = username;
        }
        if let Some(first_name) = req.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = req.email {
            user.email = email;
        }
        Ok(Some(user.clone()))
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, AppError> {
        Ok(self.store.read().await.categories.get(&id).cloned())
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, AppError> {
        let store = self.store.read().await;
        Ok(store.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, AppError> {
        let mut store = self.store.write().await;
        if store.categories.values().any(|c| c.slug == req.slug) {
            return Err(AppError::Conflict("slug is already in use".to_string()));
        }
        let category = Category {
            id: store.next_id(),
            title: req.title,
            description: req.description,
            slug: req.slug,
            is_published: req.is_published,
            created_at: Utc::now(),
        };
        store.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn set_category_published(
        &self,
        id: i64,
        is_published: bool,
    ) -> Result<Option<Category>, AppError> {
        let mut store = self.store.write().await;
        Ok(store.categories.get_mut(&id).map(|category| {
            category.is_published = is_published;
            category.clone()
        }))
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, AppError> {
        Ok(self.store.read().await.locations.get(&id).cloned())
    }

    async fn create_location(&self, req: CreateLocationRequest) -> Result<Location, AppError> {
        let mut store = self.store.write().await;
        let location = Location {
            id: store.next_id(),
            name: req.name,
            is_published: req.is_published,
            created_at: Utc::now(),
        };
        store.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError> {
        let store = self.store.read().await;
        Ok(store.posts.get(&id).map(|row| store.hydrate(row)))
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<i64, AppError> {
        let store = self.store.read().await;
        Ok(store.matching_posts(query).len() as i64)
    }

    async fn list_posts(
        &self,
        query: &PostQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let store = self.store.read().await;
        let mut posts = store.matching_posts(query);
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        Ok(posts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> Result<Post, AppError> {
        let mut store = self.store.write().await;
        let row = PostRow {
            id: store.next_id(),
            title: req.title,
            text: req.text,
            pub_date: req.pub_date,
            is_published: req.is_published,
            image: req.image_key,
            author_id,
            category_id: req.category_id,
            location_id: req.location_id,
            created_at: Utc::now(),
        };
        store.posts.insert(row.id, row.clone());
        Ok(store.hydrate(&row))
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, AppError> {
        let mut store = self.store.write().await;
        let Some(row) = store.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            row.title = title;
        }
        if let Some(text) = req.text {
            row.text = text;
        }
        if let Some(pub_date) = req.pub_date {
            row.pub_date = pub_date;
        }
        if let Some(is_published) = req.is_published {
            row.is_published = is_published;
        }
        // Outer `Some` means the field was sent; an inner `None` clears it.
        if let Some(category_id) = req.category_id {
            row.category_id = category_id;
        }
        if let Some(location_id) = req.location_id {
            row.location_id = location_id;
        }
        if let Some(image) = req.image_key {
            row.image = image;
        }
        let row = row.clone();
        Ok(Some(store.hydrate(&row)))
    }

    async fn delete_post(&self, id: i64) -> Result<bool, AppError> {
        let mut store = self.store.write().await;
        if store.posts.remove(&id).is_none() {
            return Ok(false);
        }
        store.comments.retain(|_, c| c.post_id != id);
        Ok(true)
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let store = self.store.read().await;
        Ok(store.comments.get(&id).map(|row| store.resolve_comment(row)))
    }

    async fn get_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let store = self.store.read().await;
        let mut comments: Vec<Comment> = store
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .map(|row| store.resolve_comment(row))
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, AppError> {
        let mut store = self.store.write().await;
        if !store.posts.contains_key(&post_id) {
            return Err(AppError::NotFound("post"));
        }
        let row = CommentRow {
            id: store.next_id(),
            text,
            post_id,
            author_id,
            created_at: Utc::now(),
        };
        store.comments.insert(row.id, row.clone());
        Ok(store.resolve_comment(&row))
    }

    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, AppError> {
        let mut store = self.store.write().await;
        let Some(row) = store.comments.get_mut(&id) else {
            return Ok(None);
        };
        row.text = text;
        let row = row.clone();
        Ok(Some(store.resolve_comment(&row)))
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.store.write().await.comments.remove(&id).is_some())
    }
}
