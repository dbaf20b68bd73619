use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every handler here receives a validated `AuthUser`. Mutations of posts and comments
/// are author-only; the check runs inside the handler against the stored record.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PUT /me
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        // POST /posts
        .route("/posts", post(handlers::create_post))
        // PUT/DELETE /posts/{post_id}
        .route(
            "/posts/{post_id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // POST /posts/{post_id}/comments
        .route("/posts/{post_id}/comments", post(handlers::add_comment))
        // PUT/DELETE /posts/{post_id}/comments/{comment_id}
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
        // POST /upload/presigned
        // Presigned S3 PUT URL for a post image, valid for 10 minutes.
        .route("/upload/presigned", post(handlers::get_presigned_url))
}
