use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PollingConfig;
use crate::error::{Result, SubclipError};
use crate::media::MediaPipeline;

/// Bounded, fixed-interval polling policy. No backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval: Duration::from_millis(5000),
        }
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            interval: config.interval(),
        }
    }
}

/// Waits for an asynchronously generated transcript to appear at the provider.
#[derive(Debug, Clone, Default)]
pub struct TranscriptPoller {
    policy: PollPolicy,
}

impl TranscriptPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    /// Check for `transcript_id` up to `max_attempts` times, sleeping
    /// `interval` between checks. Returns the number of checks performed.
    ///
    /// Lookup errors count as "not ready yet". The sleep is skipped after the
    /// last attempt, so exhausting N attempts takes (N - 1) intervals.
    pub async fn wait_until_ready(
        &self,
        media: &dyn MediaPipeline,
        transcript_id: &str,
        cancel: &CancellationToken,
    ) -> Result<u32> {
        let max_attempts = self.policy.max_attempts;
        info!("Waiting for transcript: {}", transcript_id);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(SubclipError::Cancelled(format!("while waiting for {}", transcript_id)));
            }

            match media.resource_exists(transcript_id).await {
                Ok(true) => {
                    info!("Transcript ready: {} (attempt {})", transcript_id, attempt);
                    return Ok(attempt);
                }
                Ok(false) => debug!("Transcript {} not found yet", transcript_id),
                Err(e) => debug!("Transcript lookup for {} failed: {}", transcript_id, e),
            }

            if attempt < max_attempts {
                info!(
                    "Attempt {}/{} - waiting {}s...",
                    attempt,
                    max_attempts,
                    self.policy.interval.as_secs_f64()
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(SubclipError::Cancelled(format!("while waiting for {}", transcript_id)));
                    }
                    _ = tokio::time::sleep(self.policy.interval) => {}
                }
            }
        }

        Err(SubclipError::TranscriptTimeout {
            transcript_id: transcript_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaPipeline;
    use mockall::Sequence;
    use tokio::time::Instant;

    const ID: &str = "processed_clips/clip1.transcript";

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_exactly_max_attempts() {
        let mut media = MockMediaPipeline::new();
        media
            .expect_resource_exists()
            .times(15)
            .returning(|_| Ok(false));

        let poller = TranscriptPoller::default();
        let started = Instant::now();
        let err = poller
            .wait_until_ready(&media, ID, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SubclipError::TranscriptTimeout { ref transcript_id } if transcript_id == ID));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(70) && elapsed < Duration::from_secs(71));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_on_first_success_without_further_checks() {
        let mut seq = Sequence::new();
        let mut media = MockMediaPipeline::new();
        media
            .expect_resource_exists()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(false));
        media
            .expect_resource_exists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));

        let poller = TranscriptPoller::default();
        let started = Instant::now();
        let attempts = poller
            .wait_until_ready(&media, ID, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_errors_count_as_not_ready() {
        let mut seq = Sequence::new();
        let mut media = MockMediaPipeline::new();
        media
            .expect_resource_exists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(SubclipError::Config("provider hiccup".into())));
        media
            .expect_resource_exists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));

        let poller = TranscriptPoller::new(PollPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(100),
        });
        let attempts = poller
            .wait_until_ready(&media, ID, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_never_sleeps() {
        let mut media = MockMediaPipeline::new();
        media.expect_resource_exists().times(1).returning(|_| Ok(false));

        let poller = TranscriptPoller::new(PollPolicy {
            max_attempts: 1,
            interval: Duration::from_secs(60),
        });
        let started = Instant::now();
        let result = poller
            .wait_until_ready(&media, ID, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SubclipError::TranscriptTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let mut media = MockMediaPipeline::new();
        media.expect_resource_exists().times(2).returning(|_| Ok(false));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(7500)).await;
            trigger.cancel();
        });

        let poller = TranscriptPoller::default();
        let err = poller.wait_until_ready(&media, ID, &cancel).await.unwrap_err();

        assert!(matches!(err, SubclipError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_calls() {
        let mut media = MockMediaPipeline::new();
        media.expect_resource_exists().never();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = TranscriptPoller::default()
            .wait_until_ready(&media, ID, &cancel)
            .await;
        assert!(matches!(result, Err(SubclipError::Cancelled(_))));
    }
}
