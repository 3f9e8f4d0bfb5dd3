//! Subclip - Clip Transcription Relay
//!
//! Downloads video clips, uploads them to a managed media provider that
//! generates transcripts, waits for the transcript, builds a subtitled
//! playback URL and forwards the result to a workflow webhook.

pub mod cli;
pub mod config;
pub mod error;
pub mod types;
pub mod storage;
pub mod fetch;
pub mod media;
pub mod poller;
pub mod dispatch;
pub mod pipeline;
pub mod server;
