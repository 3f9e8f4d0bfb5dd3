use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SubclipError};
use crate::types::UploadOutcome;
use super::MediaPipeline;
use super::url::{compose_subtitled_url, raw_attachment_url, transcript_id_for};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// Client for the managed media API (Cloudinary-compatible)
pub struct CloudMediaClient {
    client: Client,
    config: MediaConfig,
}

impl CloudMediaClient {
    pub fn new(config: MediaConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("subclip/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(SubclipError::Http)?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.cloud_name,
            path
        )
    }

    /// Upload parameters that take part in the signature.
    fn signed_params(&self, clip_id: &str, timestamp: i64) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("folder", self.config.folder.clone()),
            ("public_id", clip_id.to_string()),
            ("raw_convert", self.config.raw_convert.clone()),
            ("timestamp", timestamp.to_string()),
        ])
    }

    async fn upload_form(&self, file_path: &Path, clip_id: &str) -> Result<Form> {
        let file = File::open(file_path).await.map_err(|e| {
            SubclipError::Upload(format!("cannot open {}: {}", file_path.display(), e))
        })?;
        let length = file.metadata().await?.len();

        let body = reqwest::Body::wrap_stream(FramedRead::new(file, BytesCodec::new()));
        let part = Part::stream_with_length(body, length)
            .file_name(format!("{}.mp4", clip_id))
            .mime_str("video/mp4")
            .map_err(SubclipError::Http)?;

        let params = self.signed_params(clip_id, chrono::Utc::now().timestamp());
        let signature = sign_params(&params, &self.config.api_secret);

        let mut form = Form::new().part("file", part);
        for (key, value) in params {
            form = form.text(key, value);
        }
        Ok(form
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256"))
    }
}

/// Hex SHA-256 over `k=v` pairs in key order joined with `&`, followed by the secret.
pub fn sign_params(params: &BTreeMap<&'static str, String>, secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn provider_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ProviderError>(body) {
        Ok(err) => format!("{} (HTTP {})", err.error.message, status),
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => format!("HTTP {}: {}", status, body.trim()),
    }
}

#[async_trait]
impl MediaPipeline for CloudMediaClient {
    async fn submit(&self, file_path: &Path, clip_id: &str) -> Result<UploadOutcome> {
        info!("Uploading with transcription: {}", clip_id);

        let form = self.upload_form(file_path, clip_id).await?;
        let response = self
            .client
            .post(self.api_url("video/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| SubclipError::Upload(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubclipError::Upload(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(SubclipError::Upload(provider_message(status, &body)));
        }

        let uploaded: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| SubclipError::Upload(format!("unexpected response: {}", e)))?;
        info!("Uploaded: {}", uploaded.public_id);

        Ok(UploadOutcome {
            video_id: uploaded.public_id,
            video_url: uploaded.secure_url,
            duration: uploaded.duration,
            format: uploaded.format,
            transcript_id: transcript_id_for(&self.config.folder, clip_id),
        })
    }

    async fn resource_exists(&self, resource_id: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.api_url(&format!("resources/raw/upload/{}", resource_id)))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await?;

        let status = response.status();
        debug!("Lookup of {} returned HTTP {}", resource_id, status);

        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        response.error_for_status()?;
        Ok(false)
    }

    fn compose_subtitled_url(&self, video_id: &str, transcript_id: &str) -> String {
        compose_subtitled_url(
            &self.config.delivery_base_url,
            &self.config.cloud_name,
            video_id,
            transcript_id,
        )
    }

    async fn fetch_transcript_text(&self, transcript_id: &str) -> Result<String> {
        let url = raw_attachment_url(
            &self.config.delivery_base_url,
            &self.config.cloud_name,
            transcript_id,
        );
        let text = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }
}
