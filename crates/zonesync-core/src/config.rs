//! Configuration types for zonesync
//!
//! This module defines all configuration structures used throughout the crate.
//! Everything is validated up front by [`SyncConfig::validate`], which the
//! engine calls before accepting a configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::{DEFAULT_MAX_DELAY, RetryPolicy};

pub use crate::plan::{ConflictStrategy, SyncMode, SyncModeConfig};

/// Main zonesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Primary (authoritative) zone
    pub source: SourceConfig,

    /// Secondary zone kept in sync
    pub target: TargetConfig,

    /// Mode and conflict strategy
    #[serde(default)]
    pub sync: SyncModeConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Optional notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl SyncConfig {
    pub fn new(source: SourceConfig, target: TargetConfig) -> Self {
        Self {
            source,
            target,
            sync: SyncModeConfig::default(),
            engine: EngineConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.target.validate()?;
        self.sync.validate()?;
        self.engine.validate()?;
        self.notifications.validate()?;
        Ok(())
    }
}

/// Primary provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Cloudflare API v4
    Cloudflare {
        /// API token with Zone:DNS:Read permission
        api_token: String,
        /// Zone identifier
        zone_id: String,
    },
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            SourceConfig::Cloudflare { api_token, zone_id } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token cannot be empty"));
                }
                if zone_id.is_empty() {
                    return Err(Error::config("Cloudflare zone ID cannot be empty"));
                }
                Ok(())
            }
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::Cloudflare { .. } => "cloudflare",
        }
    }
}

/// How the secondary authenticates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ClouDnsAuth {
    /// Main account (`auth-id`)
    AuthId(String),
    /// Delegated sub-user (`sub-auth-id`)
    SubAuthId(String),
}

impl ClouDnsAuth {
    /// Form parameter name and value
    pub fn param(&self) -> (&'static str, &str) {
        match self {
            ClouDnsAuth::AuthId(id) => ("auth-id", id),
            ClouDnsAuth::SubAuthId(id) => ("sub-auth-id", id),
        }
    }

    fn id(&self) -> &str {
        self.param().1
    }
}

/// Secondary provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetConfig {
    /// ClouDNS HTTP API
    Cloudns {
        auth: ClouDnsAuth,
        auth_password: String,
        /// Zone apex, e.g. `example.com`
        domain_name: String,
    },
}

impl TargetConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            TargetConfig::Cloudns {
                auth,
                auth_password,
                domain_name,
            } => {
                if auth.id().is_empty() {
                    return Err(Error::config("ClouDNS auth ID cannot be empty"));
                }
                if auth_password.is_empty() {
                    return Err(Error::config("ClouDNS auth password cannot be empty"));
                }
                let domain = domain_name.trim_end_matches('.');
                if domain.is_empty() || !domain.contains('.') {
                    return Err(Error::config(format!(
                        "ClouDNS domain name '{domain_name}' is not a valid zone"
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn zone_name(&self) -> &str {
        match self {
            TargetConfig::Cloudns { domain_name, .. } => domain_name,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            TargetConfig::Cloudns { .. } => "cloudns",
        }
    }
}

/// How planned actions are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ApplyMode {
    /// One action at a time, in plan order
    #[default]
    Sequential,
    /// Up to `width` actions of the same kind at once
    Batched {
        #[serde(default = "default_batch_width")]
        width: usize,
    },
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Attempts per mutation, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay of the exponential backoff (milliseconds)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Cap on any single backoff (milliseconds)
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Minimum time between two successful cycles (seconds)
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    #[serde(default)]
    pub apply: ApplyMode,

    /// Serve the secondary listing through the read-through cache
    #[serde(default)]
    pub cache_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            sync_interval_secs: default_sync_interval_secs(),
            apply: ApplyMode::default(),
            cache_enabled: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(Error::config("retry_max_delay_ms must not be below retry_base_delay_ms"));
        }
        if self.retry_max_delay_ms > DEFAULT_MAX_DELAY.as_millis() as u64 {
            return Err(Error::config(format!(
                "retry_max_delay_ms must not exceed {}",
                DEFAULT_MAX_DELAY.as_millis()
            )));
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::config("sync_interval_secs must be > 0"));
        }
        if let ApplyMode::Batched { width: 0 } = self.apply {
            return Err(Error::config("batch width must be > 0"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

/// Notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Endpoint receiving a JSON POST per cycle
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl NotificationConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.webhook_url.as_deref() {
            None | Some("") => Err(Error::config("notifications are enabled but no webhook URL is set")),
            Some(url) if !url.starts_with("https://") && !url.starts_with("http://") => Err(Error::config(
                format!("notification webhook must be an HTTP(S) URL, got '{url}'"),
            )),
            Some(_) => Ok(()),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    5000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_sync_interval_secs() -> u64 {
    3600
}

fn default_batch_width() -> usize {
    10
}
