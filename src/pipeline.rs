use serde_json::Value;
use std::fmt;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::Config;
use crate::dispatch::{ResultDispatcher, WebhookDispatcher};
use crate::error::{Result, SubclipError};
use crate::fetch::{ClipFetcher, HttpFetcher};
use crate::media::{MediaPipeline, MediaPipelineFactory};
use crate::poller::{PollPolicy, TranscriptPoller};
use crate::storage::{ClipStore, TempStore};
use crate::types::{BatchOutcome, ClipRequest, DownloadedClip, ProcessedResult, TranscriptText};

/// Steps a single clip moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipStage {
    Received,
    Fetching,
    Uploading,
    Polling,
    ComposingUrl,
    FetchingText,
    Cleanup,
    Done,
    Failed,
}

impl fmt::Display for ClipStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::Fetching => "FETCHING",
            Self::Uploading => "UPLOADING",
            Self::Polling => "POLLING",
            Self::ComposingUrl => "COMPOSING_URL",
            Self::FetchingText => "FETCHING_TEXT",
            Self::Cleanup => "CLEANUP",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

fn enter(stage: ClipStage) {
    debug!(%stage, "entering stage");
}

/// Download, upload, wait for the transcript, build the subtitled URL, clean up.
///
/// Clips are processed strictly one after another; a batch never runs two
/// clips at the same time.
pub struct Pipeline {
    fetcher: Box<dyn ClipFetcher>,
    media: Box<dyn MediaPipeline>,
    poller: TranscriptPoller,
    dispatcher: Option<Box<dyn ResultDispatcher>>,
    store: Box<dyn ClipStore>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self> {
        let store = TempStore::open(&config.storage.temp_dir)?;
        let client = Client::builder()
            .user_agent(concat!("subclip/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SubclipError::Http)?;

        let fetcher = HttpFetcher::new(client, store.clone());
        let media = MediaPipelineFactory::create_default(config.media.clone())?;
        let poller = TranscriptPoller::new(PollPolicy::from(&config.polling));
        let dispatcher = WebhookDispatcher::from_config(&config.webhook)?
            .map(|d| Box::new(d) as Box<dyn ResultDispatcher>);

        if dispatcher.is_none() {
            warn!("No webhook URL configured; processed clips will not be forwarded");
        }

        Ok(Self::from_parts(Box::new(fetcher), media, poller, dispatcher, Box::new(store)))
    }

    pub fn from_parts(
        fetcher: Box<dyn ClipFetcher>,
        media: Box<dyn MediaPipeline>,
        poller: TranscriptPoller,
        dispatcher: Option<Box<dyn ResultDispatcher>>,
        store: Box<dyn ClipStore>,
    ) -> Self {
        Self {
            fetcher,
            media,
            poller,
            dispatcher,
            store,
        }
    }

    /// Run one clip to DONE or FAILED. Does not dispatch.
    pub async fn process_clip(
        &self,
        request: &ClipRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessedResult> {
        let span = info_span!("clip", clip_id = request.clip_id().unwrap_or("-"));
        let outcome = self.run_clip(request, cancel).instrument(span.clone()).await;

        span.in_scope(|| match &outcome {
            Ok(result) => {
                enter(ClipStage::Done);
                if result.is_degraded() {
                    info!("Clip processed without transcript text: {}", result.video_public_id);
                } else {
                    info!("Clip processed: {}", result.video_public_id);
                }
            }
            Err(e) => {
                enter(ClipStage::Failed);
                error!("Clip failed: {}", e);
            }
        });
        outcome
    }

    /// Single-clip mode: process, then forward the result to the webhook.
    ///
    /// A dispatch failure fails the whole call even though the clip itself
    /// was processed.
    pub async fn process_and_dispatch(
        &self,
        request: &ClipRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessedResult> {
        let result = self.process_clip(request, cancel).await?;
        self.dispatch(&result).await?;
        Ok(result)
    }

    /// Process raw batch entries in input order, one at a time, forwarding
    /// each finished clip to the webhook.
    ///
    /// An entry that cannot be read, fails processing, or fails dispatch is
    /// recorded as an error and the batch moves on. Once `cancel` fires, the
    /// remaining entries are recorded as cancelled without being fetched.
    pub async fn process_batch(&self, clips: &[Value], cancel: &CancellationToken) -> BatchOutcome {
        info!("Processing batch of {} clips", clips.len());
        let mut outcome = BatchOutcome::default();

        for raw in clips {
            if cancel.is_cancelled() {
                let clip_id = ClipRequest::raw_clip_id(raw);
                let label = clip_id.as_deref().unwrap_or("unnamed clip");
                let e = SubclipError::Cancelled(format!("before {} started", label));
                outcome.record_failure(clip_id.as_deref(), &e);
                continue;
            }

            let request = match ClipRequest::from_value(raw) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Skipping unreadable batch entry: {}", e);
                    outcome.record_failure(ClipRequest::raw_clip_id(raw).as_deref(), &e);
                    continue;
                }
            };

            let clip_id = request.clip_id();
            let processed = match self.process_clip(&request, cancel).await {
                Ok(result) => {
                    let sent = self.dispatch(&result).await;
                    sent.map(|()| result)
                }
                Err(e) => Err(e),
            };
            match processed {
                Ok(result) => outcome.record_success(clip_id.unwrap_or_default(), &result),
                Err(e) => outcome.record_failure(clip_id, &e),
            }
        }

        info!(
            "Batch finished: {} processed, {} failed",
            outcome.processed, outcome.failed
        );
        outcome
    }

    async fn dispatch(&self, result: &ProcessedResult) -> Result<()> {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.dispatch(result).await,
            None => {
                warn!("Skipping dispatch of {}: no webhook configured", result.video_public_id);
                Ok(())
            }
        }
    }

    async fn run_clip(
        &self,
        request: &ClipRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessedResult> {
        enter(ClipStage::Received);
        info!(
            "New clip received (start time {}s)",
            request.start_seconds().unwrap_or(0.0)
        );
        let target = request.validate()?;

        if cancel.is_cancelled() {
            return Err(SubclipError::Cancelled(format!("before downloading {}", target.clip_id)));
        }

        enter(ClipStage::Fetching);
        let clip = self.fetcher.fetch(&target.source_url, &target.clip_id).await?;

        let outcome = self.run_fetched(&clip, request, cancel).await;

        enter(ClipStage::Cleanup);
        self.store.discard(clip).await;

        outcome
    }

    async fn run_fetched(
        &self,
        clip: &DownloadedClip,
        request: &ClipRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessedResult> {
        enter(ClipStage::Uploading);
        let upload = self.media.submit(&clip.path, &clip.clip_id).await?;

        enter(ClipStage::Polling);
        self.poller
            .wait_until_ready(self.media.as_ref(), &upload.transcript_id, cancel)
            .await?;

        enter(ClipStage::ComposingUrl);
        let subtitled_url = self
            .media
            .compose_subtitled_url(&upload.video_id, &upload.transcript_id);

        enter(ClipStage::FetchingText);
        let transcript = match self.media.fetch_transcript_text(&upload.transcript_id).await {
            Ok(text) => TranscriptText::Fetched(text),
            Err(e) => {
                warn!("Could not fetch transcript text: {}", e);
                TranscriptText::Unavailable { reason: e.to_string() }
            }
        };

        Ok(ProcessedResult {
            video_public_id: upload.video_id,
            transcript_public_id: upload.transcript_id,
            video_url: upload.video_url,
            video_with_subtitles_url: subtitled_url,
            duration: upload.duration,
            format: upload.format,
            transcript,
            original_clip_data: request.clone(),
        })
    }
}
