use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use crate::config::WebhookConfig;
use crate::error::{Result, SubclipError};
use crate::types::ProcessedResult;

/// Forwards finished clips to the workflow automation side.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultDispatcher: Send + Sync {
    async fn dispatch(&self, result: &ProcessedResult) -> Result<()>;
}

/// POSTs the processed result as JSON to a configured webhook
pub struct WebhookDispatcher {
    client: Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SubclipError::Http)?;

        Ok(Self { client, url: url.into() })
    }

    /// `None` when no webhook URL is configured.
    pub fn from_config(config: &WebhookConfig) -> Result<Option<Self>> {
        match config.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Ok(Some(Self::new(url, Duration::from_secs(config.timeout_secs))?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ResultDispatcher for WebhookDispatcher {
    async fn dispatch(&self, result: &ProcessedResult) -> Result<()> {
        info!("Sending {} to webhook {}", result.video_public_id, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(result)
            .send()
            .await
            .map_err(|e| SubclipError::Dispatch(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SubclipError::Dispatch(format!(
                "webhook returned HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        info!("Webhook accepted {}", result.video_public_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClipRequest, TranscriptText};
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    fn sample() -> ProcessedResult {
        ProcessedResult {
            video_public_id: "processed_clips/clip1".into(),
            transcript_public_id: "processed_clips/clip1.transcript".into(),
            video_url: "https://res/clip1.mp4".into(),
            video_with_subtitles_url: "https://res/subs/clip1".into(),
            duration: Some(30.0),
            format: Some("mp4".into()),
            transcript: TranscriptText::Fetched("hello".into()),
            original_clip_data: ClipRequest {
                new_public_id: Some("clip1".into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_unset_url_disables_dispatch() {
        let config = WebhookConfig { url: None, timeout_secs: 5 };
        assert!(WebhookDispatcher::from_config(&config).unwrap().is_none());

        let config = WebhookConfig { url: Some("  ".into()), timeout_secs: 5 };
        assert!(WebhookDispatcher::from_config(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_posts_result_body() {
        let received: Arc<Mutex<Option<Value>>> = Arc::default();
        let sink = received.clone();
        let app = Router::new().route(
            "/hook",
            post(move |axum::Json(body): axum::Json<Value>| async move {
                *sink.lock().unwrap() = Some(body);
                StatusCode::OK
            }),
        );
        let base = serve(app).await;

        let dispatcher = WebhookDispatcher::new(format!("{}/hook", base), Duration::from_secs(5)).unwrap();
        dispatcher.dispatch(&sample()).await.unwrap();

        let body = received.lock().unwrap().clone().unwrap();
        assert_eq!(body["videoPublicId"], json!("processed_clips/clip1"));
        assert_eq!(body["transcriptText"], json!("hello"));
        assert_eq!(body["originalClipData"]["new_public_id"], json!("clip1"));
    }

    #[tokio::test]
    async fn test_non_success_is_dispatch_error() {
        let app = Router::new().route("/hook", post(|| async { StatusCode::BAD_GATEWAY }));
        let base = serve(app).await;

        let dispatcher = WebhookDispatcher::new(format!("{}/hook", base), Duration::from_secs(5)).unwrap();
        let err = dispatcher.dispatch(&sample()).await.unwrap_err();

        assert!(matches!(err, SubclipError::Dispatch(_)));
        assert!(err.to_string().contains("502"));
    }
}
