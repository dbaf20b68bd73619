use crate::{
    error::AppError,
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, RegisterUserRequest, UpdatePostRequest, UpdateProfileRequest, User,
    },
    policy::VisibleFilter,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// PostQuery
///
/// Selection criteria for a post feed: the viewer's visibility filter narrowed by an
/// optional category and an optional author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostQuery {
    pub filter: VisibleFilter,
    pub category_id: Option<i64>,
    pub author_id: Option<Uuid>,
}

impl PostQuery {
    /// In-memory evaluation, equivalent to the SQL built by `push_where`.
    pub fn matches(&self, post: &Post) -> bool {
        self.filter.matches(post)
            && self.category_id.is_none_or(|id| post.category_id == Some(id))
            && self.author_id.is_none_or(|id| post.author_id == id)
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE ");
        self.filter.push_sql(builder);
        if let Some(category_id) = self.category_id {
            builder.push(" AND p.category_id = ");
            builder.push_bind(category_id);
        }
        if let Some(author_id) = self.author_id {
            builder.push(" AND p.author_id = ");
            builder.push_bind(author_id);
        }
    }
}

/// Repository Trait
///
/// The persistence contract. Handlers and the listing service only see this trait, so
/// Postgres and the in-memory store are interchangeable.
///
/// Reads never apply visibility on their own except through an explicit `PostQuery`;
/// single-record getters return whatever exists and leave the decision to `policy`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    // Conflict if the username is taken.
    async fn create_user(&self, req: RegisterUserRequest) -> Result<User, AppError>;
    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError>;

    // --- Reference data ---
    async fn get_category(&self, id: i64) -> Result<Option<Category>, AppError>;
    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, AppError>;
    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, AppError>;
    async fn set_category_published(
        &self,
        id: i64,
        is_published: bool,
    ) -> Result<Option<Category>, AppError>;
    async fn get_location(&self, id: i64) -> Result<Option<Location>, AppError>;
    async fn create_location(&self, req: CreateLocationRequest) -> Result<Location, AppError>;

    // --- Posts ---
    async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError>;
    async fn count_posts(&self, query: &PostQuery) -> Result<i64, AppError>;
    // Ordered by pub_date DESC, id DESC.
    async fn list_posts(
        &self,
        query: &PostQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError>;
    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> Result<Post, AppError>;
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, AppError>;
    // Cascades to the post's comments.
    async fn delete_post(&self, id: i64) -> Result<bool, AppError>;

    // --- Comments ---
    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, AppError>;
    // Oldest first.
    async fn get_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError>;
    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, AppError>;
    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, AppError>;
    async fn delete_comment(&self, id: i64) -> Result<bool, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// Resolved post read model. Every post read goes through this projection so category
// state and comment counts are always current.
const POST_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date, p.is_published, p.image,
        p.author_id, u.username AS author_username,
        p.category_id, c.slug AS category_slug, c.title AS category_title,
        c.is_published AS category_is_published,
        p.location_id, l.name AS location_name, l.is_published AS location_is_published,
        p.created_at,
        (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    JOIN profiles u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT cm.id, cm.text, cm.post_id, cm.author_id, u.username AS author_username, cm.created_at
    FROM comments cm
    JOIN profiles u ON u.id = cm.author_id
"#;

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, is_staff, created_at";

/// Maps a unique-constraint violation onto `Conflict`, everything else onto `Database`.
fn unique_violation(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(e),
    }
}

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Dynamic filters are assembled with
/// `QueryBuilder` and bound parameters only.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM profiles WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, req: RegisterUserRequest) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO profiles (id, username, first_name, last_name, email, is_staff) \
             VALUES ($1, $2, $3, $4, $5, FALSE) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&req.username)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "username is already taken"))
    }

    /// update_user
    ///
    /// Partial update via `COALESCE`: only columns whose field is `Some` change.
    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE profiles SET \
                username = COALESCE($2, username), \
                first_name = COALESCE($3, first_name), \
                last_name = COALESCE($4, last_name), \
                email = COALESCE($5, email) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(req.username)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "username is already taken"))
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, title, description, slug, is_published, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, title, description, slug, is_published, created_at FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (title, description, slug, is_published) VALUES ($1, $2, $3, $4) \
             RETURNING id, title, description, slug, is_published, created_at",
        )
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.slug)
        .bind(req.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "slug is already in use"))
    }

    async fn set_category_published(
        &self,
        id: i64,
        is_published: bool,
    ) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET is_published = $2 WHERE id = $1 \
             RETURNING id, title, description, slug, is_published, created_at",
        )
        .bind(id)
        .bind(is_published)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, AppError> {
        let location = sqlx::query_as::<_, Location>(
            "SELECT id, name, is_published, created_at FROM locations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(location)
    }

    async fn create_location(&self, req: CreateLocationRequest) -> Result<Location, AppError> {
        let location = sqlx::query_as::<_, Location>(
            "INSERT INTO locations (name, is_published) VALUES ($1, $2) \
             RETURNING id, name, is_published, created_at",
        )
        .bind(&req.name)
        .bind(req.is_published)
        .fetch_one(&self.pool)
        .await?;
        Ok(location)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>(&format!("{POST_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<i64, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM posts p LEFT JOIN categories c ON c.id = p.category_id",
        );
        query.push_where(&mut builder);
        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// list_posts
    ///
    /// The visibility filter is rendered straight into the `WHERE` clause so invisible
    /// posts are never fetched.
    async fn list_posts(
        &self,
        query: &PostQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_SELECT);
        query.push_where(&mut builder);
        builder.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let posts = builder.build_query_as::<Post>().fetch_all(&self.pool).await?;
        Ok(posts)
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> Result<Post, AppError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (title, text, pub_date, is_published, image, author_id, category_id, location_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(&req.title)
        .bind(&req.text)
        .bind(req.pub_date)
        .bind(req.is_published)
        .bind(&req.image_key)
        .bind(author_id)
        .bind(req.category_id)
        .bind(req.location_id)
        .fetch_one(&self.pool)
        .await?;

        self.get_post(id).await?.ok_or(AppError::NotFound("post"))
    }

    /// update_post
    ///
    /// `author_id` is not in the column list: a post's author never changes. Scalar
    /// fields use `COALESCE`; the nullable references take a "was sent" flag so `null`
    /// can clear them.
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, AppError> {
        let updated: Option<i64> = sqlx::query_scalar(
            "UPDATE posts SET \
                title = COALESCE($2, title), \
                text = COALESCE($3, text), \
                pub_date = COALESCE($4, pub_date), \
                is_published = COALESCE($5, is_published), \
                category_id = CASE WHEN $6 THEN $7 ELSE category_id END, \
                location_id = CASE WHEN $8 THEN $9 ELSE location_id END, \
                image = CASE WHEN $10 THEN $11 ELSE image END \
             WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(req.is_published)
        .bind(req.category_id.is_some())
        .bind(req.category_id.flatten())
        .bind(req.location_id.is_some())
        .bind(req.location_id.flatten())
        .bind(req.image_key.is_some())
        .bind(req.image_key.flatten())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.get_post(id).await,
            None => Ok(None),
        }
    }

    async fn delete_post(&self, id: i64) -> Result<bool, AppError> {
        // comments.post_id is ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>(&format!("{COMMENT_SELECT} WHERE cm.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn get_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{COMMENT_SELECT} WHERE cm.post_id = $1 ORDER BY cm.created_at ASC, cm.id ASC"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    /// add_comment
    ///
    /// Insert and author join in one statement through a CTE.
    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (text, post_id, author_id) VALUES ($1, $2, $3)
                RETURNING id, text, post_id, author_id, created_at
            )
            SELECT i.id, i.text, i.post_id, i.author_id, u.username AS author_username, i.created_at
            FROM inserted i JOIN profiles u ON u.id = i.author_id
            "#,
        )
        .bind(text)
        .bind(post_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            // comments.post_id references a post deleted in the meantime.
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::NotFound("post"),
            _ => AppError::Database(e),
        })?;
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments SET text = $2 WHERE id = $1
                RETURNING id, text, post_id, author_id, created_at
            )
            SELECT d.id, d.text, d.post_id, d.author_id, u.username AS author_username, d.created_at
            FROM updated d JOIN profiles u ON u.id = d.author_id
            "#,
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
