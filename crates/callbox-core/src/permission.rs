//! Microphone permission gate
//!
//! Platforms that require an explicit runtime grant get exactly one system
//! dialog with fixed copy. There is no rationale step and no re-prompt; the
//! outcome is returned as-is and callers decide what a denial means.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Outcome of a permission check or request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    /// Access granted
    Granted,
    /// Access denied
    Denied,
}

impl PermissionStatus {
    /// Whether access was granted
    pub fn is_granted(self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

/// Copy shown in the permission dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPrompt {
    /// Dialog title
    pub title: String,
    /// Dialog body
    pub message: String,
    /// Label of the accepting button
    pub button_positive: String,
    /// Label of the refusing button
    pub button_negative: String,
}

impl PermissionPrompt {
    /// The microphone request dialog
    pub fn microphone() -> Self {
        Self {
            title: "Microphone Permission".to_string(),
            message: "For this app work properly, we will need access to your microphone. \
                      Can you grant access for us?"
                .to_string(),
            button_positive: "Yes, I do!".to_string(),
            button_negative: "No, I'm afraid".to_string(),
        }
    }
}

/// Operating-system permission surface for microphone access
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Current grant state, without prompting
    async fn check(&self) -> PermissionStatus;

    /// Show the permission dialog once and return the user's answer
    async fn request(&self, prompt: &PermissionPrompt) -> PermissionStatus;
}

/// Check the microphone grant and prompt once if it is missing
pub async fn ensure_microphone_permission(gate: &dyn PermissionGate) -> PermissionStatus {
    let current = gate.check().await;
    if current.is_granted() {
        debug!("Microphone permission already granted");
        return current;
    }

    let outcome = gate.request(&PermissionPrompt::microphone()).await;
    if outcome.is_granted() {
        info!("Microphone permission granted");
    } else {
        warn!("Microphone permission denied");
    }
    outcome
}

/// Gate with a preset answer, for tests and targets without runtime grants
///
/// `check` returns the current status; `request` records the prompt and
/// switches to the preset answer.
#[derive(Debug)]
pub struct StaticPermissionGate {
    status: Mutex<PermissionStatus>,
    answer: PermissionStatus,
    requests: AtomicUsize,
    last_prompt: Mutex<Option<PermissionPrompt>>,
}

impl StaticPermissionGate {
    /// Gate whose current status is `status` and whose dialog answers `answer`
    pub fn new(status: PermissionStatus, answer: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            answer,
            requests: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Already granted; never prompts
    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted, PermissionStatus::Granted)
    }

    /// Not granted; the dialog will be declined
    pub fn denying() -> Self {
        Self::new(PermissionStatus::Denied, PermissionStatus::Denied)
    }

    /// Number of dialogs shown
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Copy of the last dialog shown
    pub fn last_prompt(&self) -> Option<PermissionPrompt> {
        self.last_prompt.lock().clone()
    }
}

#[async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn check(&self) -> PermissionStatus {
        *self.status.lock()
    }

    async fn request(&self, prompt: &PermissionPrompt) -> PermissionStatus {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock() = Some(prompt.clone());
        *self.status.lock() = self.answer;
        self.answer
    }
}
