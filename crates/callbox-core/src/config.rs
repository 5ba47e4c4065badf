//! Configuration for callbox
//!
//! [`CallboxConfig`] is loaded from TOML. Every field has a default, so an
//! empty file (or no file) is a valid configuration.
//!
//! ```toml
//! token_url = "https://voice.example.com/accessToken"
//! platform = "android"
//!
//! [policy]
//! on_token_failure = "abort"
//! on_device_not_ready = "fail"
//! init_timeout_secs = 30
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{CallboxError, CallboxResult};
use crate::navigation::DEFAULT_EXIT_ROUTES;
use crate::platform::Platform;

/// Token endpoint used when none is configured
pub const DEFAULT_TOKEN_URL: &str = "http://127.0.0.1:3000/accessToken";

/// Display name handed to CallKit
pub const DEFAULT_CALL_KIT_APP_NAME: &str = "Twilio Call";

/// What to do when the access token cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenFailurePolicy {
    /// Log the failure and initialize the SDK with an empty token
    PassThrough,
    /// Log the failure and fail the initialization without calling the SDK
    Abort,
}

/// What to do when the device reports not-ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotReadyPolicy {
    /// Log only; the session stays where it is
    KeepLoading,
    /// Return to the uninitialized state
    Reset,
    /// Enter the failed state carrying the SDK error
    Fail,
}

/// How the initialization sequence reacts to failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitPolicy {
    /// Token fetch failure handling
    pub on_token_failure: TokenFailurePolicy,
    /// Device not-ready handling
    pub on_device_not_ready: NotReadyPolicy,
    /// Bound on the whole sequence, up to the ready event (`0` in TOML = none)
    #[serde(
        rename = "init_timeout_secs",
        serialize_with = "serialize_opt_secs",
        deserialize_with = "deserialize_opt_secs"
    )]
    pub init_timeout: Option<Duration>,
}

impl Default for InitPolicy {
    fn default() -> Self {
        Self {
            on_token_failure: TokenFailurePolicy::Abort,
            on_device_not_ready: NotReadyPolicy::Fail,
            init_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl InitPolicy {
    /// Permissive behavior: pass failed tokens through, keep loading on
    /// not-ready, never time out
    pub fn compatible() -> Self {
        Self {
            on_token_failure: TokenFailurePolicy::PassThrough,
            on_device_not_ready: NotReadyPolicy::KeepLoading,
            init_timeout: None,
        }
    }

    /// Override the timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.init_timeout = timeout;
        self
    }
}

/// Log output settings applied by the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level directive (`error` .. `trace`)
    pub level: String,
    /// Emit JSON lines
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallboxConfig {
    /// Access token endpoint
    pub token_url: String,
    /// Per-request timeout for the token fetch (`0` = none)
    #[serde(
        rename = "token_timeout_secs",
        serialize_with = "serialize_opt_secs",
        deserialize_with = "deserialize_opt_secs"
    )]
    pub token_timeout: Option<Duration>,
    /// Reject non-2xx token responses
    pub require_token_status: bool,
    /// Platform family to behave as
    pub platform: Platform,
    /// Display name for the system call UI
    pub call_kit_app_name: String,
    /// Where the session snapshot is kept; `None` disables persistence
    pub snapshot_path: Option<PathBuf>,
    /// Routes on which back exits the application
    pub exit_routes: Vec<String>,
    /// Failure handling of the initialization sequence
    pub policy: InitPolicy,
    /// Log output
    pub logging: LoggingSettings,
}

impl Default for CallboxConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            token_timeout: None,
            require_token_status: false,
            platform: Platform::current(),
            call_kit_app_name: DEFAULT_CALL_KIT_APP_NAME.to_string(),
            snapshot_path: None,
            exit_routes: DEFAULT_EXIT_ROUTES.iter().map(|r| r.to_string()).collect(),
            policy: InitPolicy::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl CallboxConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> CallboxResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CallboxError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> CallboxResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let text = std::fs::read_to_string(path).map_err(|e| {
            CallboxError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> CallboxResult<String> {
        toml::to_string_pretty(self).map_err(|e| CallboxError::config(e.to_string()))
    }

    /// Set the token endpoint
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set the platform family
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set the initialization policy
    pub fn with_policy(mut self, policy: InitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the snapshot location
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Check field constraints
    pub fn validate(&self) -> CallboxResult<()> {
        if self.token_url.is_empty() {
            return Err(CallboxError::config("token_url must not be empty"));
        }
        if !(self.token_url.starts_with("http://") || self.token_url.starts_with("https://")) {
            return Err(CallboxError::config(
                "token_url must be an http:// or https:// URL",
            ));
        }
        if self.call_kit_app_name.trim().is_empty() {
            return Err(CallboxError::config("call_kit_app_name must not be empty"));
        }
        Ok(())
    }
}

fn serialize_opt_secs<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(value.map(|d| d.as_secs()).unwrap_or(0))
}

fn deserialize_opt_secs<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
