//! Target platform family

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CallboxError;

/// Platform families with different calling integration requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Needs an explicit runtime grant for the microphone
    Android,
    /// Integrates calls with the system call UI (CallKit)
    Ios,
    /// Neither of the above
    Desktop,
}

impl Platform {
    /// Platform the binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Desktop
        }
    }

    /// Whether microphone access must be requested before initializing
    pub fn requires_audio_permission(self) -> bool {
        matches!(self, Platform::Android)
    }

    /// Whether the session should configure CallKit after initializing
    pub fn supports_call_kit(self) -> bool {
        matches!(self, Platform::Ios)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Desktop => "desktop",
        };
        f.write_str(name)
    }
}

impl FromStr for Platform {
    type Err = CallboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "desktop" => Ok(Platform::Desktop),
            other => Err(CallboxError::config(format!("unknown platform '{other}'"))),
        }
    }
}
