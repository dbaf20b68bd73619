use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    listing::{ListingScope, list_posts},
    models::{
        Category, CategoryPage, Comment, CommentRequest, CreateCategoryRequest,
        CreateLocationRequest, CreatePostRequest, Location, Post, PostDetail, PostPage,
        PresignedUrlRequest, PresignedUrlResponse, ProfilePage, RegisterUserRequest,
        UpdatePostRequest, UpdateProfileRequest, User,
    },
    pagination::PageQuery,
    policy::{Viewer, modify_access, view_access},
    repository::Repository,
    storage::image_object_key,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

// --- Shared Checks ---

fn require_staff(user: &AuthUser) -> Result<(), AppError> {
    if user.is_staff {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, "staff-only action refused");
        Err(AppError::Forbidden)
    }
}

/// Rejects references to categories or locations that do not exist.
async fn check_references(
    repo: &dyn Repository,
    category_id: Option<i64>,
    location_id: Option<i64>,
) -> Result<(), AppError> {
    if let Some(id) = category_id {
        if repo.get_category(id).await?.is_none() {
            return Err(AppError::Validation(format!("category {id} does not exist")));
        }
    }
    if let Some(id) = location_id {
        if repo.get_location(id).await?.is_none() {
            return Err(AppError::Validation(format!("location {id} does not exist")));
        }
    }
    Ok(())
}

/// Loads a comment only if it belongs to `post_id`; a comment addressed through the
/// wrong post does not exist at that path.
async fn load_comment(
    repo: &dyn Repository,
    post_id: i64,
    comment_id: i64,
) -> Result<Option<Comment>, AppError> {
    Ok(repo
        .get_comment(comment_id)
        .await?
        .filter(|comment| comment.post_id == post_id))
}

/// Loads a post and checks the viewer may read it.
async fn load_visible_post(
    repo: &dyn Repository,
    viewer: &Viewer,
    post_id: i64,
) -> Result<Post, AppError> {
    let post = repo.get_post(post_id).await?;
    view_access(viewer, post.as_ref(), Utc::now()).into_result("post")?;
    post.ok_or(AppError::NotFound("post"))
}

// --- Identity ---

/// register_user
///
/// [Public Route] Creates the local profile for a new user. Registration never grants
/// staff rights.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 409, description = "Username taken"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    payload.validate()?;
    let user = state.repo.create_user(payload).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile, email included.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> Result<Json<User>, AppError> {
    let me = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(me))
}

/// update_me
///
/// [Authenticated Route] Edits the caller's own profile. There is no route for editing
/// anyone else's.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 409, description = "Username taken")
    )
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    payload.validate()?;
    let updated = state
        .repo
        .update_user(user.id, payload)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(updated))
}

// --- Feeds ---

/// get_index
///
/// [Public Route] The main feed: every post the viewer may see, newest first.
#[utoipa::path(
    get,
    path = "/posts",
    params(PageQuery),
    responses((status = 200, description = "Feed page", body = PostPage))
)]
pub async fn get_index(
    viewer: Viewer,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostPage>, AppError> {
    let page = list_posts(
        state.repo.as_ref(),
        &viewer,
        ListingScope::All,
        query.page.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(page))
}

/// get_category_posts
///
/// [Public Route] Feed of one category. An unpublished category is not found unless the
/// viewer is staff.
#[utoipa::path(
    get,
    path = "/category/{slug}",
    params(("slug" = String, Path, description = "Category slug"), PageQuery),
    responses(
        (status = 200, description = "Category feed", body = CategoryPage),
        (status = 404, description = "Unknown or unpublished category")
    )
)]
pub async fn get_category_posts(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryPage>, AppError> {
    let category = state
        .repo
        .get_category_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound("category"))?;
    let page = list_posts(
        state.repo.as_ref(),
        &viewer,
        ListingScope::Category(&category),
        query.page.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(CategoryPage { category, page }))
}

/// get_profile
///
/// [Public Route] A user's public profile with their posts. The owner sees drafts and
/// scheduled posts too.
#[utoipa::path(
    get,
    path = "/profile/{username}",
    params(("username" = String, Path, description = "Username"), PageQuery),
    responses(
        (status = 200, description = "Profile feed", body = ProfilePage),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn get_profile(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfilePage>, AppError> {
    let author = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let page = list_posts(
        state.repo.as_ref(),
        &viewer,
        ListingScope::Author(&author),
        query.page.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(ProfilePage {
        profile: author.into(),
        page,
    }))
}

// --- Posts ---

/// get_post_detail
///
/// [Public Route] A single post with its comments. Missing posts are 404; existing posts
/// the viewer may not read are 403.
#[utoipa::path(
    get,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetail),
        (status = 403, description = "Not visible to this viewer"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post_detail(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostDetail>, AppError> {
    let post = load_visible_post(state.repo.as_ref(), &viewer, post_id).await?;
    let comments = state.repo.get_comments(post.id).await?;
    Ok(Json(PostDetail { post, comments }))
}

/// create_post
///
/// [Authenticated Route] The author is the caller, never a payload field.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    payload.validate()?;
    check_references(state.repo.as_ref(), payload.category_id, payload.location_id).await?;
    let post = state.repo.create_post(user.id, payload).await?;
    tracing::info!(post_id = post.id, author_id = %user.id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Author-only. Ownership is checked on the stored post before the
/// payload is even validated, so a refused edit never touches the store.
#[utoipa::path(
    put,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let viewer = Viewer::from(&user);
    let existing = state.repo.get_post(post_id).await?;
    if let Err(e) = modify_access(&viewer, existing.as_ref()).into_result("post") {
        tracing::warn!(post_id, user_id = %user.id, "post edit refused: {}", e);
        return Err(e);
    }

    payload.validate()?;
    check_references(
        state.repo.as_ref(),
        payload.category_id.flatten(),
        payload.location_id.flatten(),
    )
    .await?;
    let post = state
        .repo
        .update_post(post_id, payload)
        .await?
        .ok_or(AppError::NotFound("post"))?;
    tracing::info!(post_id, "post updated");
    Ok(Json(post))
}

/// delete_post
///
/// [Authenticated Route] Author-only. Comments go with the post.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let viewer = Viewer::from(&user);
    let existing = state.repo.get_post(post_id).await?;
    if let Err(e) = modify_access(&viewer, existing.as_ref()).into_result("post") {
        tracing::warn!(post_id, user_id = %user.id, "post delete refused: {}", e);
        return Err(e);
    }

    if state.repo.delete_post(post_id).await? {
        tracing::info!(post_id, "post deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("post"))
    }
}

// --- Comments ---

/// get_comments
///
/// [Public Route] Comments of a post the viewer may read, oldest first.
#[utoipa::path(
    get,
    path = "/posts/{post_id}/comments",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 403, description = "Post not visible"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_comments(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let post = load_visible_post(state.repo.as_ref(), &viewer, post_id).await?;
    Ok(Json(state.repo.get_comments(post.id).await?))
}

/// add_comment
///
/// [Authenticated Route] Any authenticated user may comment on a post they can read.
#[utoipa::path(
    post,
    path = "/posts/{post_id}/comments",
    params(("post_id" = i64, Path, description = "Post ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 403, description = "Post not visible"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let viewer = Viewer::from(&user);
    let post = load_visible_post(state.repo.as_ref(), &viewer, post_id).await?;
    payload.validate()?;
    let comment = state.repo.add_comment(post.id, user.id, payload.text).await?;
    tracing::info!(post_id, comment_id = comment.id, "comment added");
    Ok((StatusCode::CREATED, Json(comment)))
}

/// update_comment
///
/// [Authenticated Route] Comment author only.
#[utoipa::path(
    put,
    path = "/posts/{post_id}/comments/{comment_id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let viewer = Viewer::from(&user);
    let existing = load_comment(state.repo.as_ref(), post_id, comment_id).await?;
    if let Err(e) = modify_access(&viewer, existing.as_ref()).into_result("comment") {
        tracing::warn!(comment_id, user_id = %user.id, "comment edit refused: {}", e);
        return Err(e);
    }

    payload.validate()?;
    let comment = state
        .repo
        .update_comment(comment_id, payload.text)
        .await?
        .ok_or(AppError::NotFound("comment"))?;
    tracing::info!(post_id, comment_id, "comment updated");
    Ok(Json(comment))
}

/// delete_comment
///
/// [Authenticated Route] Comment author only; staff have no override.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}/comments/{comment_id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    let viewer = Viewer::from(&user);
    let existing = load_comment(state.repo.as_ref(), post_id, comment_id).await?;
    if let Err(e) = modify_access(&viewer, existing.as_ref()).into_result("comment") {
        tracing::warn!(comment_id, user_id = %user.id, "comment delete refused: {}", e);
        return Err(e);
    }

    if state.repo.delete_comment(comment_id).await? {
        tracing::info!(post_id, comment_id, "comment deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("comment"))
    }
}

// --- Media ---

/// get_presigned_url
///
/// [Authenticated Route] A 10-minute presigned PUT URL for a post image. The returned
/// `resource_key` is what goes into `image_key`.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 422, description = "Not an image content type")
    )
)]
pub async fn get_presigned_url(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, AppError> {
    let object_key = image_object_key(&payload.filename, &payload.file_type)?;
    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await?;
    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

// --- Reference Data (Staff) ---

/// create_category
///
/// [Admin Route] Staff only.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 403, description = "Not staff"),
        (status = 409, description = "Slug in use")
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    require_staff(&user)?;
    payload.validate()?;
    let category = state.repo.create_category(payload).await?;
    tracing::info!(category_id = category.id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category_status
///
/// [Admin Route] Publishes or hides a category. Takes effect on the very next read of
/// any post filed under it.
#[utoipa::path(
    put,
    path = "/admin/categories/{id}/status",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = bool,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 403, description = "Not staff"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_category_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(is_published): Json<bool>,
) -> Result<Json<Category>, AppError> {
    require_staff(&user)?;
    let category = state
        .repo
        .set_category_published(id, is_published)
        .await?
        .ok_or(AppError::NotFound("category"))?;
    tracing::info!(category_id = id, is_published, "category status changed");
    Ok(Json(category))
}

/// create_location
///
/// [Admin Route] Staff only.
#[utoipa::path(
    post,
    path = "/admin/locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Created", body = Location),
        (status = 403, description = "Not staff")
    )
)]
pub async fn create_location(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>), AppError> {
    require_staff(&user)?;
    payload.validate()?;
    let location = state.repo.create_location(payload).await?;
    tracing::info!(location_id = location.id, name = %location.name, "location created");
    Ok((StatusCode::CREATED, Json(location)))
}
