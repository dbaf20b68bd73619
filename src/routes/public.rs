use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only feeds and detail pages plus registration. Callers may be anonymous; if they
/// do send credentials, they are validated and the viewer gets their extra visibility
/// (own drafts, staff access).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(|| async { "ok" }))
        // POST /register
        .route("/register", post(handlers::register_user))
        // GET /posts?page=N
        // Main feed, 10 posts per page, newest first.
        .route("/posts", get(handlers::get_index))
        // GET /posts/{post_id}
        // 404 when missing, 403 when it exists but is not visible to the viewer.
        .route("/posts/{post_id}", get(handlers::get_post_detail))
        // GET /posts/{post_id}/comments
        .route("/posts/{post_id}/comments", get(handlers::get_comments))
        // GET /category/{slug}?page=N
        // 404 for unknown categories, and for unpublished ones unless the viewer is staff.
        .route("/category/{slug}", get(handlers::get_category_posts))
        // GET /profile/{username}?page=N
        .route("/profile/{username}", get(handlers::get_profile))
}
