//! Visibility and authorization rules for posts and comments.
//!
//! Viewing and mutating follow different rules:
//!
//! * a post is **visible** to its author, to staff, and to everyone else once it is
//!   published, its category (if any) is published and its `pub_date` has passed;
//! * a post or comment is **modifiable** only by its author. Staff get no override.
//!
//! Every function here is pure. The current time is always passed in by the caller.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{Comment, Post},
};

/// Viewer
///
/// The identity evaluating a request: either nobody, or an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User { id: Uuid, is_staff: bool },
}

impl Viewer {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User { id, .. } => Some(*id),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Viewer::User { is_staff: true, .. })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::User { .. })
    }

    /// True when this viewer is the user `user_id`.
    pub fn is(&self, user_id: Uuid) -> bool {
        self.id() == Some(user_id)
    }
}

impl From<&AuthUser> for Viewer {
    fn from(user: &AuthUser) -> Self {
        Viewer::User {
            id: user.id,
            is_staff: user.is_staff,
        }
    }
}

/// Ownable
///
/// Anything with exactly one author whose mutation rights belong to that author alone.
pub trait Ownable {
    fn author_id(&self) -> Uuid;
}

impl Ownable for Post {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

impl Ownable for Comment {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

/// Whether `post` is publicly readable at `now`, ignoring who is asking.
fn is_public(post: &Post, now: DateTime<Utc>) -> bool {
    post.is_published && post.category_is_published.unwrap_or(true) && post.pub_date <= now
}

/// is_visible
///
/// The single-object visibility check. `post` must have its category resolved.
pub fn is_visible(viewer: &Viewer, post: &Post, now: DateTime<Utc>) -> bool {
    viewer.is(post.author_id) || viewer.is_staff() || is_public(post, now)
}

/// can_modify
///
/// Only the authenticated author may edit or delete a resource.
pub fn can_modify<R: Ownable + ?Sized>(viewer: &Viewer, resource: &R) -> bool {
    viewer.is(resource.author_id())
}

/// VisibleFilter
///
/// The bulk form of [`is_visible`] for one viewer. It can be evaluated in memory
/// ([`VisibleFilter::matches`]) or rendered into a SQL `WHERE` fragment
/// ([`VisibleFilter::push_sql`]); both agree with `is_visible` for every post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibleFilter {
    /// Staff see everything.
    Unrestricted,
    /// Public posts, plus every post by `author` when the viewer is authenticated.
    Public {
        now: DateTime<Utc>,
        author: Option<Uuid>,
    },
}

/// visible_filter
pub fn visible_filter(viewer: &Viewer, now: DateTime<Utc>) -> VisibleFilter {
    if viewer.is_staff() {
        VisibleFilter::Unrestricted
    } else {
        VisibleFilter::Public {
            now,
            author: viewer.id(),
        }
    }
}

impl VisibleFilter {
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            VisibleFilter::Unrestricted => true,
            VisibleFilter::Public { now, author } => {
                *author == Some(post.author_id) || is_public(post, *now)
            }
        }
    }

    /// Appends the filter as a parenthesised boolean expression. Expects the query to
    /// alias `posts` as `p` and `LEFT JOIN categories` as `c`.
    pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            VisibleFilter::Unrestricted => {
                builder.push("TRUE");
            }
            VisibleFilter::Public { now, author } => {
                builder.push("(");
                if let Some(author) = author {
                    builder.push("p.author_id = ");
                    builder.push_bind(*author);
                    builder.push(" OR ");
                }
                builder.push(
                    "(p.is_published = TRUE AND (c.id IS NULL OR c.is_published = TRUE) AND p.pub_date <= ",
                );
                builder.push_bind(*now);
                builder.push("))");
            }
        }
    }
}

/// Access
///
/// Tagged outcome of a policy check against a resource that may not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
    NotFound,
}

impl Access {
    /// `what` names the resource in the `NotFound` error.
    pub fn into_result(self, what: &'static str) -> Result<(), AppError> {
        match self {
            Access::Allowed => Ok(()),
            Access::Denied => Err(AppError::Forbidden),
            Access::NotFound => Err(AppError::NotFound(what)),
        }
    }
}

/// view_access
pub fn view_access(viewer: &Viewer, post: Option<&Post>, now: DateTime<Utc>) -> Access {
    match post {
        None => Access::NotFound,
        Some(post) if is_visible(viewer, post, now) => Access::Allowed,
        Some(_) => Access::Denied,
    }
}

/// modify_access
pub fn modify_access<R: Ownable>(viewer: &Viewer, resource: Option<&R>) -> Access {
    match resource {
        None => Access::NotFound,
        Some(resource) if can_modify(viewer, resource) => Access::Allowed,
        Some(_) => Access::Denied,
    }
}
