//! Data carried through the clip pipeline.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::error::{Result, SubclipError};

/// Clip metadata as received from the caller.
///
/// Unknown fields are kept in `extra` so they travel unchanged into the
/// processed result. Identifier and URL fields accept numbers as well as
/// strings; timing fields are kept as sent and only read for logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipRequest {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub new_public_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub secure_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_duration: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The two fields a clip cannot be processed without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipTarget {
    pub source_url: String,
    pub clip_id: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ClipRequest {
    /// Read one clip out of raw JSON. Anything that is not an object, or an
    /// identifier that is neither string nor number, is a validation error.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| SubclipError::Validation(format!("Invalid clip data: {}", e)))
    }

    /// Best-effort identifier of a raw entry, used to label entries that
    /// could not be read as a clip.
    pub fn raw_clip_id(value: &Value) -> Option<String> {
        text_of(value.get("new_public_id")).or_else(|| text_of(value.get("public_id")))
    }

    /// `start_time` in seconds, whether it was sent as a number or a string.
    pub fn start_seconds(&self) -> Option<f64> {
        match self.start_time.as_ref()? {
            Value::Number(n) => n.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// `secure_url` wins over `url`.
    pub fn source_url(&self) -> Option<&str> {
        non_empty(&self.secure_url).or_else(|| non_empty(&self.url))
    }

    /// `new_public_id` wins over `public_id`.
    pub fn clip_id(&self) -> Option<&str> {
        non_empty(&self.new_public_id).or_else(|| non_empty(&self.public_id))
    }

    pub fn validate(&self) -> Result<ClipTarget> {
        let source_url = self.source_url().ok_or_else(|| {
            SubclipError::Validation("Missing video URL (secure_url or url) in request".to_string())
        })?;
        let clip_id = self.clip_id().ok_or_else(|| {
            SubclipError::Validation("Missing public_id or new_public_id in request".to_string())
        })?;

        if clip_id.contains(['/', '\\']) || clip_id == "." || clip_id == ".." {
            return Err(SubclipError::Validation(format!(
                "Invalid clip identifier '{}'",
                clip_id
            )));
        }

        Ok(ClipTarget {
            source_url: source_url.to_string(),
            clip_id: clip_id.to_string(),
        })
    }
}

/// A clip written to the scratch directory.
///
/// Owned by the pipeline for one clip run and handed back to the store for
/// deletion on every exit path.
#[derive(Debug, PartialEq, Eq)]
pub struct DownloadedClip {
    pub path: PathBuf,
    pub clip_id: String,
}

/// What the media provider reported for an accepted upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub video_id: String,
    pub video_url: String,
    pub duration: Option<f64>,
    pub format: Option<String>,
    /// Predicted as `<folder>/<clip id>.transcript`; the provider does not
    /// return it because the transcript does not exist yet at upload time.
    pub transcript_id: String,
}

/// Outcome of the best-effort transcript text download.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptText {
    Fetched(String),
    Unavailable { reason: String },
}

impl TranscriptText {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Fetched(text) => text,
            Self::Unavailable { .. } => "",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }
}

impl Serialize for TranscriptText {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Final record for one clip, sent to the webhook as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedResult {
    pub video_public_id: String,
    pub transcript_public_id: String,
    pub video_url: String,
    pub video_with_subtitles_url: String,
    pub duration: Option<f64>,
    pub format: Option<String>,
    #[serde(rename = "transcriptText")]
    pub transcript: TranscriptText,
    pub original_clip_data: ClipRequest,
}

impl ProcessedResult {
    /// True when the clip succeeded but its transcript text could not be read.
    pub fn is_degraded(&self) -> bool {
        !self.transcript.is_available()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub clip_id: String,
    pub status: String,
    pub video_with_subtitles_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    pub clip_id: Option<String>,
    pub error: String,
}

/// Accumulated result of a sequential batch run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
    pub errors: Vec<BatchError>,
}

impl BatchOutcome {
    pub fn record_success(&mut self, clip_id: &str, result: &ProcessedResult) {
        self.results.push(BatchItem {
            clip_id: clip_id.to_string(),
            status: "success".to_string(),
            video_with_subtitles_url: result.video_with_subtitles_url.clone(),
        });
        self.processed += 1;
    }

    pub fn record_failure(&mut self, clip_id: Option<&str>, error: &SubclipError) {
        self.errors.push(BatchError {
            clip_id: clip_id.map(str::to_string),
            error: error.to_string(),
        });
        self.failed += 1;
    }

    pub fn total(&self) -> usize {
        self.processed + self.failed
    }
}

/// Body of the batch endpoint and of `subclip batch --input`.
///
/// Entries stay raw so one malformed clip fails on its own instead of
/// rejecting the whole batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub clips: Vec<Value>,
}
