use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Category and location management, nested under `/admin`. Authentication is applied as
/// a layer; the staff check happens in each handler.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/categories
        .route("/categories", post(handlers::create_category))
        // PUT /admin/categories/{id}/status
        // Publishing or hiding a category changes the visibility of all its posts at once.
        .route(
            "/categories/{id}/status",
            put(handlers::update_category_status),
        )
        // POST /admin/locations
        .route("/locations", post(handlers::create_location))
}
