use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// Maximum length of titles, names and slugs, mirrored by the `VARCHAR(256)` columns.
pub const MAX_TITLE_LEN: usize = 256;
/// Maximum length of a username.
pub const MAX_USERNAME_LEN: usize = 150;

// --- Core Records (Mapped to Database) ---

/// User
///
/// A registered identity stored in the `profiles` table. `is_staff` grants extended
/// read visibility only; it never grants mutation rights over other users' content.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // Unique, enforced by the `profiles_username_key` constraint.
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Category
///
/// Staff-managed reference data. Unpublishing a category hides every post filed under it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Location
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// The resolved read model of a `posts` row. Besides its own columns it carries the
/// joined author, category and location fields and a `comment_count` that is computed
/// per query. Category state is joined on every read, so it can never be stale.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    // S3 key of the uploaded image.
    pub image: Option<String>,

    // Owner. Set at creation, never updated.
    pub author_id: Uuid,
    pub author_username: String,

    pub category_id: Option<i64>,
    pub category_slug: Option<String>,
    pub category_title: Option<String>,
    // None when the post has no category.
    pub category_is_published: Option<bool>,

    pub location_id: Option<i64>,
    pub location_name: Option<String>,
    pub location_is_published: Option<bool>,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub comment_count: i64,
}

/// Comment
///
/// A `comments` row joined with its author's username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: Uuid,
    pub author_username: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

fn default_published() -> bool {
    true
}

fn require_text(field: &str, value: &str, max_len: Option<usize>) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if let Some(max) = max_len {
        if value.chars().count() > max {
            return Err(AppError::Validation(format!(
                "{field} must be at most {max} characters"
            )));
        }
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), AppError> {
    require_text("username", username, Some(MAX_USERNAME_LEN))?;
    let allowed = |c: char| c.is_alphanumeric() || "@.+-_".contains(c);
    if !username.chars().all(allowed) {
        return Err(AppError::Validation(
            "username may contain only letters, digits and @/./+/-/_".to_string(),
        ));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> Result<(), AppError> {
    require_text("slug", slug, Some(MAX_TITLE_LEN))?;
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !slug.chars().all(allowed) {
        return Err(AppError::Validation(
            "slug may contain only latin letters, digits, hyphens and underscores".to_string(),
        ));
    }
    Ok(())
}

/// RegisterUserRequest
///
/// Input payload for `POST /register`. Credentials are handled by the external identity
/// provider; this only creates the local profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_username(&self.username)?;
        require_text("email", &self.email, None)?;
        if !self.email.contains('@') {
            return Err(AppError::Validation("email must contain '@'".to_string()));
        }
        Ok(())
    }
}

/// UpdateProfileRequest
///
/// Partial update of the caller's own profile (`PUT /me`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(AppError::Validation("email must contain '@'".to_string()));
            }
        }
        Ok(())
    }
}

/// CreatePostRequest
///
/// Input payload for `POST /posts`. The author is always taken from the authenticated
/// identity, never from the body. A future `pub_date` schedules the post.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    #[serde(default = "default_published")]
    pub is_published: bool,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    // Key returned by the presigned upload flow.
    pub image_key: Option<String>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("title", &self.title, Some(MAX_TITLE_LEN))?;
        require_text("text", &self.text, None)
    }
}

/// UpdatePostRequest
///
/// Partial update payload (`PUT /posts/{post_id}`). Only provided fields change; the
/// author is not part of the payload. For the optional references an absent field
/// keeps the current value and an explicit `null` clears it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "number | null")]
    #[schema(value_type = Option<i64>)]
    pub category_id: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "number | null")]
    #[schema(value_type = Option<i64>)]
    pub location_id: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub image_key: Option<Option<String>>,
}

/// Distinguishes a field sent as `null` (`Some(None)`) from one left out (`None`, via
/// `#[serde(default)]`).
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            require_text("title", title, Some(MAX_TITLE_LEN))?;
        }
        if let Some(text) = &self.text {
            require_text("text", text, None)?;
        }
        Ok(())
    }
}

/// CommentRequest
///
/// Body for both creating and editing a comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentRequest {
    pub text: String,
}

impl CommentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("text", &self.text, None)
    }
}

/// CreateCategoryRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("title", &self.title, Some(MAX_TITLE_LEN))?;
        validate_slug(&self.slug)
    }
}

/// CreateLocationRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateLocationRequest {
    pub name: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

impl CreateLocationRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("name", &self.name, Some(MAX_TITLE_LEN))
    }
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for a post image.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    #[schema(example = "sunset.jpg")]
    pub filename: String,
    /// Must be an `image/*` MIME type; the upload is constrained to it.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// Object key to pass back as `image_key` when creating or editing a post.
    pub resource_key: String,
}

// --- Page Schemas (Output) ---

/// PostPage
///
/// One page of a post feed. `clamped` is set when the requested page was malformed or
/// out of range and the nearest valid page was served instead.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub page: i64,
    pub num_pages: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub clamped: bool,
}

/// PostDetail
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// CategoryPage
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryPage {
    pub category: Category,
    pub page: PostPage,
}

/// PublicProfile
///
/// What anyone may see about a user. The email stays private.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at,
        }
    }
}

/// ProfilePage
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfilePage {
    pub profile: PublicProfile,
    pub page: PostPage,
}
