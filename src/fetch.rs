use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, SubclipError};
use crate::storage::{TempStore, remove_quietly};
use crate::types::DownloadedClip;

/// Downloads a source clip into the scratch directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipFetcher: Send + Sync {
    /// Stream `source_url` to a file named after `clip_id` and return it once
    /// fully flushed. No retries.
    async fn fetch(&self, source_url: &str, clip_id: &str) -> Result<DownloadedClip>;
}

pub struct HttpFetcher {
    client: Client,
    store: TempStore,
}

impl HttpFetcher {
    pub fn new(client: Client, store: TempStore) -> Self {
        Self { client, store }
    }

    async fn stream_to(&self, source_url: &str, path: &Path) -> Result<u64> {
        let response = self
            .client
            .get(source_url)
            .send()
            .await
            .map_err(|e| SubclipError::Fetch(format!("request to {} failed: {}", source_url, e)))?;

        if !response.status().is_success() {
            return Err(SubclipError::Fetch(format!(
                "{} returned HTTP {}",
                source_url,
                response.status()
            )));
        }

        let mut file = File::create(path)
            .await
            .map_err(|e| SubclipError::Fetch(format!("cannot create {}: {}", path.display(), e)))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SubclipError::Fetch(format!("stream interrupted: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| SubclipError::Fetch(format!("write to {} failed: {}", path.display(), e)))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| SubclipError::Fetch(format!("flush of {} failed: {}", path.display(), e)))?;
        file.sync_all()
            .await
            .map_err(|e| SubclipError::Fetch(format!("sync of {} failed: {}", path.display(), e)))?;

        Ok(written)
    }
}

#[async_trait]
impl ClipFetcher for HttpFetcher {
    async fn fetch(&self, source_url: &str, clip_id: &str) -> Result<DownloadedClip> {
        let path = self.store.path_for(clip_id);
        info!("Downloading clip: {}", clip_id);

        match self.stream_to(source_url, &path).await {
            Ok(bytes) => {
                debug!("Wrote {} bytes to {}", bytes, path.display());
                info!("Downloaded: {}", clip_id);
                Ok(DownloadedClip {
                    path,
                    clip_id: clip_id.to_string(),
                })
            }
            Err(e) => {
                // A failed download never reaches the pipeline's cleanup step.
                remove_quietly(&path).await;
                Err(e)
            }
        }
    }
}
