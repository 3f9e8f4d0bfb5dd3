use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubclipError {
    #[error("{0}")]
    Validation(String),

    #[error("Download failed: {0}")]
    Fetch(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Transcript generation timed out for: {transcript_id}")]
    TranscriptTimeout { transcript_id: String },

    #[error("Webhook dispatch failed: {0}")]
    Dispatch(String),

    #[error("Processing cancelled {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SubclipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_passed_through() {
        let e = SubclipError::Validation("Missing video URL (secure_url or url) in request".into());
        assert_eq!(e.to_string(), "Missing video URL (secure_url or url) in request");
    }

    #[test]
    fn test_timeout_names_transcript() {
        let e = SubclipError::TranscriptTimeout {
            transcript_id: "processed_clips/clip1.transcript".into(),
        };
        assert_eq!(
            e.to_string(),
            "Transcript generation timed out for: processed_clips/clip1.transcript"
        );
    }

    #[test]
    fn test_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: SubclipError = io_err.into();
        assert!(matches!(e, SubclipError::Io(_)));
        assert!(e.to_string().contains("gone"));
    }
}
