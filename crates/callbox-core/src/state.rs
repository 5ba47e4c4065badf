//! Session state rendered by the call screen
//!
//! [`SessionState`] is the whole application state tree. It doubles as the
//! persisted snapshot: it serializes with camelCase keys, and
//! [`SessionState::restore`] rebuilds a fresh state from a snapshot, keeping
//! only the navigation tree.

use serde::{Deserialize, Deserializer, Serialize};

use crate::navigation::NavigationState;

/// The application state tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    /// Navigation tree owned by the front end
    pub navigation_state: NavigationState,
    /// True once the voice device reported ready
    pub initialized: bool,
    /// Number currently entered; empty means unset
    #[serde(deserialize_with = "null_as_empty")]
    pub destination_number: String,
    /// True while an initialization sequence is in flight
    pub loading: bool,
    /// Reason the last initialization failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Phase of the voice session, derived from [`SessionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Nothing started yet
    Uninitialized,
    /// Waiting for token, permission, SDK init or the ready event
    Initializing,
    /// Device ready, calls can be placed
    Ready,
    /// Last initialization failed; can be retried
    Failed,
}

impl SessionState {
    /// Rebuild a session from a persisted snapshot
    ///
    /// Only the navigation tree survives a restart. Call-session fields start
    /// over at their defaults.
    pub fn restore(snapshot: SessionState) -> Self {
        Self {
            navigation_state: snapshot.navigation_state,
            ..Self::default()
        }
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        if self.initialized {
            SessionPhase::Ready
        } else if self.loading {
            SessionPhase::Initializing
        } else if self.last_error.is_some() {
            SessionPhase::Failed
        } else {
            SessionPhase::Uninitialized
        }
    }

    /// Whether a destination number has been entered
    pub fn has_destination(&self) -> bool {
        !self.destination_number.is_empty()
    }

    /// Whether the call control accepts input
    pub fn can_place_call(&self) -> bool {
        self.initialized && self.has_destination()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
