// Media provider integration
//
// The pipeline only talks to the provider through `MediaPipeline`:
// - cloud: HTTP client for the managed media API (upload, lookup, downloads)
// - url: pure builders for delivery URLs

pub mod cloud;
pub mod url;

use async_trait::async_trait;
use std::path::Path;

pub use cloud::CloudMediaClient;
pub use url::{SubtitleStyle, compose_subtitled_url, overlay_id, transcript_id_for};

use crate::config::MediaConfig;
use crate::error::Result;
use crate::types::UploadOutcome;

/// Operations the pipeline needs from the media provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaPipeline: Send + Sync {
    /// Upload a local clip and request transcript generation alongside it
    async fn submit(&self, file_path: &Path, clip_id: &str) -> Result<UploadOutcome>;

    /// Whether a raw resource (such as a transcript) exists yet
    async fn resource_exists(&self, resource_id: &str) -> Result<bool>;

    /// Playback URL of `video_id` with `transcript_id` burned in as subtitles
    fn compose_subtitled_url(&self, video_id: &str, transcript_id: &str) -> String;

    /// Raw contents of a transcript file
    async fn fetch_transcript_text(&self, transcript_id: &str) -> Result<String>;
}

/// Factory for creating media pipeline clients
pub struct MediaPipelineFactory;

impl MediaPipelineFactory {
    pub fn create_default(config: MediaConfig) -> Result<Box<dyn MediaPipeline>> {
        Ok(Box::new(CloudMediaClient::new(config)?))
    }
}
