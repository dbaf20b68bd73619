use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;

/// Lifetime of a presigned upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// StorageService
///
/// Object storage for post images. The real client talks to S3/MinIO; the mock returns
/// deterministic URLs for tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if missing. Only called in `Env::Local`.
    async fn ensure_bucket_exists(&self);

    /// Returns a time-limited URL that lets a client PUT exactly one object at `key`
    /// with the given `content_type`.
    async fn get_presigned_upload_url(&self, key: &str, content_type: &str)
    -> Result<String, AppError>;
}

/// image_object_key
///
/// Builds the object key for a new post image (`posts/<uuid>.<ext>`). Only `image/*`
/// content types are accepted.
pub fn image_object_key(filename: &str, content_type: &str) -> Result<String, AppError> {
    let is_image = content_type
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty());
    if !is_image {
        return Err(AppError::Validation(format!(
            "'{content_type}' is not an image content type"
        )));
    }
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
        .to_ascii_lowercase();
    Ok(format!("posts/{}.{}", Uuid::new_v4(), extension))
}

/// S3StorageClient
///
/// `aws-sdk-s3` client. Path-style addressing is forced for MinIO compatibility.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    /// new
    ///
    /// Builds a client from static credentials. `force_path_style` keeps the bucket in
    /// the URL path (`http://host:9000/bucket/key`), which MinIO requires.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket already exists.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket: {:?}", e);
        }
    }

    /// get_presigned_upload_url
    ///
    /// Signs a `PutObject` for exactly `key`, valid for `UPLOAD_URL_TTL`. Signing is
    /// local; no request reaches the endpoint. The client must upload with the same
    /// `Content-Type` header or S3 rejects the signature, which is what restricts
    /// uploads to the image type checked by `image_object_key`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            // Signed header.
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }
}

/// Strips empty, `.` and `..` segments from a key.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// Offline stand-in: URLs are deterministic and nothing is uploaded.
#[derive(Clone, Default)]
pub struct MockStorageService {
    // Every presign call fails with `AppError::Storage`.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, AppError> {
        if self.should_fail {
            return Err(AppError::Storage("simulated storage failure".to_string()));
        }
        Ok(format!(
            "http://localhost:9000/blogicum-mock/{}?X-Amz-Signature=mock",
            sanitize_key(key)
        ))
    }
}

/// StorageState
pub type StorageState = Arc<dyn StorageService>;
