use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, SubclipError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub polling: PollingConfig,
    pub webhook: WebhookConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the HTTP service listens on
    pub port: u16,
    /// Maximum accepted JSON body size in bytes
    pub body_limit_bytes: usize,
    /// Name reported by the health endpoint
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Provider account (cloud) name
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Destination folder for uploaded clips and their transcripts
    pub folder: String,
    /// Conversion requested at upload time; produces the transcript artifact
    pub raw_convert: String,
    /// Base of the upload and admin API, without the cloud name
    pub api_base_url: String,
    /// Base of delivery URLs, without the cloud name
    pub delivery_base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Number of existence checks before giving up on a transcript
    pub max_attempts: u32,
    /// Fixed delay between two checks
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Workflow webhook receiving processed results; dispatch is skipped when unset
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Scratch directory for downloaded clips
    pub temp_dir: PathBuf,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            body_limit_bytes: 50 * 1024 * 1024,
            service_name: "Video Clip Transcription Service".to_string(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: "processed_clips".to_string(),
            raw_convert: "google_speech:srt:vtt".to_string(),
            api_base_url: "https://api.cloudinary.com/v1_1".to_string(),
            delivery_base_url: "https://res.cloudinary.com".to_string(),
            request_timeout_secs: 300,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval_ms: 5000,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp_clips"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubclipError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SubclipError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubclipError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubclipError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides using the variable names the service has always read:
    /// `CLOUDNAME`, `API_KEY`, `API_SECRET`, `WEBHOOK_URL` and `PORT`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup("CLOUDNAME") {
            self.media.cloud_name = v;
        }
        if let Some(v) = lookup("API_KEY") {
            self.media.api_key = v;
        }
        if let Some(v) = lookup("API_SECRET") {
            self.media.api_secret = v;
        }
        if let Some(v) = lookup("WEBHOOK_URL") {
            self.webhook.url = Some(v);
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v.trim().parse().map_err(|_| {
                SubclipError::Config(format!("Invalid PORT value '{}'", v))
            })?;
        }
        Ok(())
    }

    /// Check the settings the pipeline cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.polling.max_attempts == 0 {
            return Err(SubclipError::Config(
                "polling.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.media.folder.trim().is_empty() {
            return Err(SubclipError::Config("media.folder must not be empty".to_string()));
        }

        let missing: Vec<&str> = [
            ("cloud_name (CLOUDNAME)", &self.media.cloud_name),
            ("api_key (API_KEY)", &self.media.api_key),
            ("api_secret (API_SECRET)", &self.media.api_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(SubclipError::Config(format!(
                "Missing media provider credentials: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_credentials() -> Config {
        let mut config = Config::default();
        config.media.cloud_name = "demo".into();
        config.media.api_key = "key".into();
        config.media.api_secret = "secret".into();
        config
    }

    #[test]
    fn test_defaults_match_service_behaviour() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.body_limit_bytes, 52_428_800);
        assert_eq!(config.polling.max_attempts, 15);
        assert_eq!(config.polling.interval(), Duration::from_secs(5));
        assert_eq!(config.media.folder, "processed_clips");
        assert!(config.webhook.url.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [polling]
            max_attempts = 3

            [webhook]
            url = "http://localhost:5678/webhook/processed"
            "#,
        )
        .unwrap();

        assert_eq!(config.polling.max_attempts, 3);
        assert_eq!(config.polling.interval_ms, 5000);
        assert_eq!(config.webhook.url.as_deref(), Some("http://localhost:5678/webhook/processed"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CLOUDNAME", "demo"),
            ("API_KEY", "123"),
            ("API_SECRET", "abc"),
            ("WEBHOOK_URL", "http://hook"),
            ("PORT", "8080"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.media.cloud_name, "demo");
        assert_eq!(config.media.api_key, "123");
        assert_eq!(config.media.api_secret, "abc");
        assert_eq!(config.webhook.url.as_deref(), Some("http://hook"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|_| Some("  ".to_string())).unwrap();
        assert!(config.webhook.url.is_none());
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, SubclipError::Config(_)));
    }

    #[test]
    fn test_validate() {
        assert!(with_credentials().validate().is_ok());

        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("CLOUDNAME"));

        let mut config = with_credentials();
        config.polling.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = with_credentials();
        config.polling.interval_ms = 250;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.polling.interval_ms, 250);
        assert_eq!(loaded.media.cloud_name, "demo");
    }
}
