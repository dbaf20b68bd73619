use blogicum::{
    AppError,
    models::{
        CommentRequest, CreateCategoryRequest, CreatePostRequest, MAX_TITLE_LEN, Post,
        PublicProfile, RegisterUserRequest, UpdatePostRequest, UpdateProfileRequest, User,
    },
};
use chrono::Utc;
use uuid::Uuid;

fn is_validation(result: Result<(), AppError>) -> bool {
    matches!(result, Err(AppError::Validation(_)))
}

// --- Request Validation ---

#[test]
fn test_register_username_charset() {
    let mut req = RegisterUserRequest {
        username: "jane.doe+blog@home".to_string(),
        email: "jane@example.com".to_string(),
        ..RegisterUserRequest::default()
    };
    assert!(req.validate().is_ok());

    req.username = "jane doe".to_string();
    assert!(is_validation(req.validate()));

    req.username = "x".repeat(151);
    assert!(is_validation(req.validate()));
}

#[test]
fn test_register_requires_email() {
    let req = RegisterUserRequest {
        username: "jane".to_string(),
        email: "not-an-email".to_string(),
        ..RegisterUserRequest::default()
    };
    assert!(is_validation(req.validate()));
}

#[test]
fn test_profile_update_only_checks_provided_fields() {
    assert!(UpdateProfileRequest::default().validate().is_ok());

    let bad = UpdateProfileRequest {
        email: Some("nope".to_string()),
        ..UpdateProfileRequest::default()
    };
    assert!(is_validation(bad.validate()));
}

#[test]
fn test_post_title_length_limit() {
    let mut req = CreatePostRequest {
        title: "t".repeat(MAX_TITLE_LEN),
        text: "body".to_string(),
        pub_date: Utc::now(),
        ..CreatePostRequest::default()
    };
    assert!(req.validate().is_ok());

    req.title.push('t');
    assert!(is_validation(req.validate()));
}

#[test]
fn test_post_blank_text_rejected() {
    let req = CreatePostRequest {
        title: "Title".to_string(),
        text: " \n\t".to_string(),
        pub_date: Utc::now(),
        ..CreatePostRequest::default()
    };
    assert!(is_validation(req.validate()));
}

#[test]
fn test_update_post_empty_payload_is_valid() {
    assert!(UpdatePostRequest::default().validate().is_ok());
    let blank = UpdatePostRequest {
        text: Some(String::new()),
        ..UpdatePostRequest::default()
    };
    assert!(is_validation(blank.validate()));
}

#[test]
fn test_comment_must_have_text() {
    assert!(is_validation(
        CommentRequest {
            text: "   ".to_string()
        }
        .validate()
    ));
    assert!(
        CommentRequest {
            text: "hi".to_string()
        }
        .validate()
        .is_ok()
    );
}

#[test]
fn test_category_slug_charset() {
    let mut req = CreateCategoryRequest {
        title: "Travel".to_string(),
        description: String::new(),
        slug: "travel_2025-eu".to_string(),
        is_published: true,
    };
    assert!(req.validate().is_ok());

    req.slug = "путешествия".to_string();
    assert!(is_validation(req.validate()));

    req.slug = "with space".to_string();
    assert!(is_validation(req.validate()));
}

// --- Serialization ---

#[test]
fn test_create_post_defaults_to_published() {
    let req: CreatePostRequest = serde_json::from_value(serde_json::json!({
        "title": "Hello",
        "text": "World",
        "pub_date": "2025-01-01T00:00:00Z",
        "category_id": null,
        "location_id": null,
        "image_key": null
    }))
    .unwrap();
    assert!(req.is_published);
}

#[test]
fn test_update_post_omits_unset_fields() {
    let req = UpdatePostRequest {
        title: Some("New".to_string()),
        ..UpdatePostRequest::default()
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json, serde_json::json!({ "title": "New" }));
}

#[test]
fn test_update_post_null_differs_from_absent() {
    let cleared: UpdatePostRequest =
        serde_json::from_value(serde_json::json!({ "category_id": null, "image_key": "posts/b.png" }))
            .unwrap();
    assert_eq!(cleared.category_id, Some(None));
    assert_eq!(cleared.image_key, Some(Some("posts/b.png".to_string())));
    assert_eq!(cleared.location_id, None);

    let json = serde_json::to_value(&cleared).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "category_id": null, "image_key": "posts/b.png" })
    );
}

#[test]
fn test_public_profile_drops_email_and_staff_flag() {
    let user = User {
        id: Uuid::new_v4(),
        username: "jane".to_string(),
        email: "jane@example.com".to_string(),
        is_staff: true,
        ..User::default()
    };
    let json = serde_json::to_value(PublicProfile::from(user)).unwrap();
    assert_eq!(json["username"], "jane");
    assert!(json.get("email").is_none());
    assert!(json.get("is_staff").is_none());
}

#[test]
fn test_post_serializes_resolved_category() {
    let post = Post {
        id: 3,
        title: "Title".to_string(),
        category_id: Some(1),
        category_slug: Some("news".to_string()),
        category_is_published: Some(false),
        comment_count: 2,
        ..Post::default()
    };
    let json = serde_json::to_value(&post).unwrap();
    assert_eq!(json["category_slug"], "news");
    assert_eq!(json["category_is_published"], false);
    assert_eq!(json["comment_count"], 2);
}
