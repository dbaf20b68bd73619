use blogicum::storage::{MockStorageService, S3StorageClient, StorageService, image_object_key};

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_image_key_layout() {
        let key = image_object_key("holiday.PNG", "image/png").unwrap();
        assert!(key.starts_with("posts/"));
        assert!(key.ends_with(".png"));
        // posts/ + uuid + .png
        assert_eq!(key.len(), "posts/".len() + 36 + ".png".len());
    }

    #[test]
    fn test_image_key_is_unique_per_call() {
        let a = image_object_key("a.jpg", "image/jpeg").unwrap();
        let b = image_object_key("a.jpg", "image/jpeg").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_image_key_without_extension_falls_back() {
        let key = image_object_key("snapshot", "image/webp").unwrap();
        assert!(key.ends_with(".bin"));
    }

    #[test]
    fn test_image_key_ignores_path_in_filename() {
        let key = image_object_key("../../etc/passwd.gif", "image/gif").unwrap();
        assert!(!key.contains(".."));
        assert!(key.ends_with(".gif"));
    }

    #[test]
    fn test_image_key_rejects_non_image_types() {
        assert!(image_object_key("clip.mp4", "video/mp4").is_err());
        assert!(image_object_key("x.png", "image/").is_err());
        assert!(image_object_key("x.png", "").is_err());
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "posts/abc.jpg";
        let url = mock
            .get_presigned_upload_url(key, "image/jpeg")
            .await
            .unwrap();

        assert!(url.contains("X-Amz-Signature=mock"));
        assert!(url.contains(key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock.get_presigned_upload_url("posts/a.jpg", "image/jpeg").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let url = mock
            .get_presigned_upload_url("../../etc/passwd", "image/png")
            .await
            .unwrap();

        assert!(!url.contains(".."));
        assert!(url.contains("etc/passwd"));
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    #[tokio::test]
    async fn test_s3_presign_is_offline_and_scoped_to_key() {
        // Presigning is a local signing operation; no request reaches the endpoint.
        let client = S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "admin",
            "password",
            "blogicum-test",
        )
        .await;

        let url = client
            .get_presigned_upload_url("posts/photo.jpg", "image/jpeg")
            .await
            .unwrap();

        assert!(url.contains("localhost:9000"));
        assert!(url.contains("blogicum-test/posts/photo.jpg"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=600"));
    }
}
