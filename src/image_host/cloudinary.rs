/// Cloudinary signed uploads
use super::{ImageHost, UploadedImage};
use crate::{
    config::ImageHostConfig,
    error::{ApiError, ApiResult},
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";
const AVATAR_TRANSFORMATION: &str = "c_fill,h_250,w_250";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    version: u64,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

#[derive(Clone)]
pub struct CloudinaryHost {
    config: ImageHostConfig,
    http_client: reqwest::Client,
}

impl CloudinaryHost {
    pub fn new(config: ImageHostConfig) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("contacts-api/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn full_public_id(&self, public_id: &str) -> String {
        if self.config.folder.is_empty() {
            public_id.to_string()
        } else {
            format!("{}/{}", self.config.folder.trim_end_matches('/'), public_id)
        }
    }

    /// 250x250 fill of a specific uploaded version
    pub fn delivery_url(&self, public_id: &str, version: u64) -> String {
        format!(
            "{}/{}/image/upload/{}/v{}/{}",
            DELIVERY_BASE, self.config.cloud_name, AVATAR_TRANSFORMATION, version, public_id
        )
    }
}

/// Hex SHA-256 over the alphabetically sorted `k=v` pairs joined by `&`,
/// followed directly by the API secret.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, bytes: Vec<u8>, public_id: &str) -> ApiResult<UploadedImage> {
        let public_id = self.full_public_id(public_id);
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let signature = sign_params(
            &[
                ("overwrite", "true"),
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.config.api_secret,
        );

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name("avatar"))
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("public_id", public_id.clone())
            .text("overwrite", "true")
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let url = format!("{}/{}/image/upload", API_BASE, self.config.cloud_name);
        tracing::debug!("Uploading image {} to {}", public_id, url);

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Image upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| status.to_string());
            tracing::warn!("Image host rejected upload of {}: {}", public_id, message);
            return Err(ApiError::Upstream(format!("Image upload rejected: {}", message)));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Unexpected image host response: {}", e)))?;

        Ok(UploadedImage {
            url: self.delivery_url(&uploaded.public_id, uploaded.version),
            version: uploaded.version,
        })
    }
}
