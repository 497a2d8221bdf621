/// Third-party image hosting for user avatars
use crate::error::ApiResult;
use async_trait::async_trait;

pub mod cloudinary;

pub use cloudinary::CloudinaryHost;

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Publicly servable URL of the transformed image
    pub url: String,
    pub version: u64,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload `bytes` under `public_id`, overwriting any earlier version
    async fn upload(&self, bytes: Vec<u8>, public_id: &str) -> ApiResult<UploadedImage>;
}

/// Host used when no image service is configured; every upload fails
pub struct UnconfiguredImageHost;

#[async_trait]
impl ImageHost for UnconfiguredImageHost {
    async fn upload(&self, _bytes: Vec<u8>, _public_id: &str) -> ApiResult<UploadedImage> {
        Err(crate::error::ApiError::Upstream(
            "Image host is not configured".to_string(),
        ))
    }
}
