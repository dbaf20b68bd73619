use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{Category, PostPage, User},
    pagination::{PAGE_SIZE, PageNumber, PageWindow, parse_page},
    policy::{Viewer, visible_filter},
    repository::{PostQuery, Repository},
};

/// ListingScope
///
/// Which feed is being read. Scopes carry the already-loaded category or author so a
/// missing slug/username is reported by the caller as `NotFound` before listing starts.
#[derive(Debug, Clone, Copy)]
pub enum ListingScope<'a> {
    All,
    Category(&'a Category),
    Author(&'a User),
}

/// list_posts
///
/// Produces one page of a feed for `viewer`: visibility-filtered, newest first (ties by
/// descending id), with comment counts.
///
/// A category feed whose category is unpublished does not exist for anyone but staff.
/// For an author feed read by that author, the visibility filter already admits all of
/// their own posts.
///
/// A malformed `page` is logged and served as the nearest valid page.
pub async fn list_posts(
    repo: &dyn Repository,
    viewer: &Viewer,
    scope: ListingScope<'_>,
    page: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PostPage, AppError> {
    let mut query = PostQuery {
        filter: visible_filter(viewer, now),
        category_id: None,
        author_id: None,
    };
    match scope {
        ListingScope::All => {}
        ListingScope::Category(category) => {
            if !category.is_published && !viewer.is_staff() {
                return Err(AppError::NotFound("category"));
            }
            query.category_id = Some(category.id);
        }
        ListingScope::Author(author) => query.author_id = Some(author.id),
    }

    let (requested, malformed) = match parse_page(page) {
        Ok(number) => (number, false),
        Err(e) => {
            tracing::warn!(error = %e, "invalid page parameter, serving first page");
            (PageNumber::Number(1), true)
        }
    };

    let total = repo.count_posts(&query).await?;
    let window = PageWindow::resolve(requested, total, PAGE_SIZE);
    let posts = repo.list_posts(&query, window.limit, window.offset).await?;

    Ok(PostPage {
        posts,
        page: window.number,
        num_pages: window.num_pages,
        total,
        has_next: window.has_next(),
        has_previous: window.has_previous(),
        clamped: window.clamped || malformed,
    })
}
