//! Settings loading.
//!
//! Not itself a pipeline component, but a binary still needs somewhere to
//! land the validated settings object the extractor wrapper, scheduler, and
//! HTTP layer all read from. Environment variables override a YAML file
//! which overrides built-in defaults.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::models::{Explicit, PodcastType, TranscriptSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub base_url: String,
    pub config_file: Option<PathBuf>,
    pub cookies_path: Option<PathBuf>,

    pub server_host: String,
    pub server_port: u16,
    pub admin_server_port: u16,
    pub trusted_proxies: Vec<String>,

    pub log_format: String,
    pub log_level: String,
    pub log_include_stacktrace: bool,

    pub yt_channel: String,
    pub yt_dlp_update_freq: humantime_repr::DurationSeconds,

    pub pot_provider_url: Option<String>,

    pub max_errors: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/data"),
            base_url: "http://localhost:8080".to_string(),
            config_file: None,
            cookies_path: None,
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            admin_server_port: 8081,
            trusted_proxies: Vec::new(),
            log_format: "pretty".to_string(),
            log_level: "info".to_string(),
            log_include_stacktrace: false,
            yt_channel: "stable".to_string(),
            yt_dlp_update_freq: humantime_repr::DurationSeconds(86_400),
            pot_provider_url: None,
            max_errors: 3,
        }
    }
}

impl Settings {
    /// Environment variables (prefix `APP_`) override the YAML file at
    /// `config_file`, which overrides defaults.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Fail-fast validation at startup; bad configuration should abort
    /// before anything is bootstrapped.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.data_dir.as_os_str().is_empty() {
            errors.push("data_dir must not be empty".to_string());
        }
        if self.server_port == 0 {
            errors.push("server_port must be between 1 and 65535, got 0".to_string());
        }
        if self.admin_server_port == 0 {
            errors.push("admin_server_port must be between 1 and 65535, got 0".to_string());
        }
        for proxy in &self.trusted_proxies {
            if proxy.parse::<IpAddr>().is_err() && ipnet_like(proxy).is_none() {
                errors.push(format!("trusted_proxies entry '{proxy}' is not a valid IP or CIDR"));
            }
        }
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            errors.push(format!("log_format must be 'json' or 'pretty', got '{}'", self.log_format));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Minimal CIDR shape check (`a.b.c.d/nn`) without pulling in a dedicated
/// crate just for startup validation of an operator-supplied list.
fn ipnet_like(s: &str) -> Option<()> {
    let (addr, prefix) = s.split_once('/')?;
    addr.parse::<IpAddr>().ok()?;
    prefix.parse::<u8>().ok()?;
    Some(())
}

/// Per-feed configuration supplied by the externally owned feed-id → config
/// mapping. Carries the operator-set half of the `Feed` data model;
/// discovery fills in the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub id: String,
    pub enabled: bool,
    pub url: Option<String>,
    /// A five-field cron expression, or the literal `"manual"`.
    pub schedule: String,
    #[serde(default)]
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub keep_last: Option<u32>,

    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub remote_image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub podcast_type: Option<PodcastType>,
    #[serde(default)]
    pub explicit: Option<Explicit>,

    #[serde(default)]
    pub transcript_lang: Option<String>,
    #[serde(default)]
    pub transcript_source_priority: Option<Vec<TranscriptSource>>,

    #[serde(default)]
    pub cookies_path: Option<PathBuf>,
}

impl FeedConfig {
    pub fn is_manual(&self) -> bool {
        self.schedule.eq_ignore_ascii_case("manual")
    }

    /// Parses `schedule` as a `cron::Schedule`, rejecting the literal
    /// `"manual"` (callers must check `is_manual` first).
    pub fn cron_schedule(&self) -> Result<cron::Schedule, cron::error::Error> {
        self.schedule.parse()
    }
}

/// Loads the feed list from `Settings::config_file`: a YAML sequence of
/// `FeedConfig` entries, each carrying its own `id`.
pub fn load_feed_configs(path: &Path) -> Result<Vec<FeedConfig>, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Message(format!("reading feed config {}: {e}", path.display())))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Message(format!("parsing feed config {}: {e}", path.display())))
}

/// Fail-fast validation of every configured feed's `schedule`, run once at
/// startup so a typo'd cron expression aborts the process instead of
/// silently disabling that one feed's trigger forever at runtime.
pub fn validate_feed_configs(configs: &[FeedConfig]) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    for config in configs {
        if config.is_manual() {
            continue;
        }
        if let Err(e) = config.cron_schedule() {
            errors.push(format!("feed '{}': invalid schedule '{}': {e}", config.id, config.schedule));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Newtype so `Settings` doesn't need a `humantime`/`Duration` serde shim
/// spelled out twice.
pub mod humantime_repr {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DurationSeconds(pub u64);

    impl DurationSeconds {
        pub fn as_duration(self) -> Duration {
            Duration::from_secs(self.0)
        }
    }

    impl Serialize for DurationSeconds {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_u64(self.0)
        }
    }

    impl<'de> Deserialize<'de> for DurationSeconds {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            Ok(Self(u64::deserialize(d)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let mut s = Settings::default();
        s.server_port = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_bad_trusted_proxy() {
        let mut s = Settings::default();
        s.trusted_proxies = vec!["not-an-ip".to_string()];
        assert!(s.validate().is_err());
    }

    #[test]
    fn accepts_cidr_trusted_proxy() {
        let mut s = Settings::default();
        s.trusted_proxies = vec!["10.0.0.0/8".to_string()];
        assert!(s.validate().is_ok());
    }

    #[test]
    fn load_feed_configs_parses_yaml_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.yaml");
        std::fs::write(
            &path,
            "- id: demo\n  enabled: true\n  url: https://example.test/demo\n  schedule: \"0 3 * * *\"\n",
        )
        .unwrap();
        let feeds = load_feed_configs(&path).unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].id, "demo");
        assert!(!feeds[0].is_manual());
    }

    #[test]
    fn validate_feed_configs_rejects_bad_cron_expression() {
        let mut cfg = FeedConfig {
            id: "demo".to_string(),
            enabled: true,
            url: None,
            schedule: "not a cron expression".to_string(),
            since: None,
            keep_last: None,
            title: None,
            subtitle: None,
            description: None,
            language: None,
            author: None,
            author_email: None,
            remote_image_url: None,
            category: None,
            podcast_type: None,
            explicit: None,
            transcript_lang: None,
            transcript_source_priority: None,
            cookies_path: None,
        };
        assert!(validate_feed_configs(&[cfg.clone()]).is_err());

        cfg.schedule = "0 3 * * *".to_string();
        assert!(validate_feed_configs(&[cfg.clone()]).is_ok());

        cfg.schedule = "manual".to_string();
        assert!(validate_feed_configs(&[cfg]).is_ok());
    }

    #[test]
    fn feed_config_manual_schedule() {
        let cfg = FeedConfig {
            id: "drop".to_string(),
            enabled: true,
            url: None,
            schedule: "manual".to_string(),
            since: None,
            keep_last: None,
            title: None,
            subtitle: None,
            description: None,
            language: None,
            author: None,
            author_email: None,
            remote_image_url: None,
            category: None,
            podcast_type: None,
            explicit: None,
            transcript_lang: None,
            transcript_source_priority: None,
            cookies_path: None,
        };
        assert!(cfg.is_manual());
        assert!(cfg.cron_schedule().is_err());
    }
}
