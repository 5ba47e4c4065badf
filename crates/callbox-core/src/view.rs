//! Call screen view model
//!
//! [`render`] maps a [`SessionState`] to what the screen shows. Front ends draw
//! the returned [`CallScreenView`] and nothing else, so two front ends fed the
//! same state always agree.

use crate::state::{SessionPhase, SessionState};

/// Label of the initialize control
pub const INITIALIZE_LABEL: &str = "Initialize Twilio Call";
/// Label of the number entry field
pub const NUMBER_FIELD_LABEL: &str = "What number do you want to call to?";
/// Label of the call control
pub const CALL_LABEL: &str = "Make the call!";

/// What the call screen shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallScreenView {
    /// The initialize control
    Initialize,
    /// Indeterminate progress indicator
    Loading,
    /// Initialization failed; shows the reason and the initialize control
    Failed {
        /// Failure reason
        reason: String,
    },
    /// Number entry plus the call control
    Dial {
        /// Number currently entered
        number: String,
        /// Whether the call control accepts input
        call_enabled: bool,
    },
}

impl CallScreenView {
    /// Whether the call control is shown and enabled
    pub fn call_enabled(&self) -> bool {
        matches!(self, CallScreenView::Dial { call_enabled: true, .. })
    }

    /// Whether the initialize control is shown
    pub fn offers_initialize(&self) -> bool {
        matches!(self, CallScreenView::Initialize | CallScreenView::Failed { .. })
    }
}

/// Map the session state to the call screen
pub fn render(state: &SessionState) -> CallScreenView {
    match state.phase() {
        SessionPhase::Ready => CallScreenView::Dial {
            number: state.destination_number.clone(),
            call_enabled: state.can_place_call(),
        },
        SessionPhase::Initializing => CallScreenView::Loading,
        SessionPhase::Failed => CallScreenView::Failed {
            reason: state.last_error.clone().unwrap_or_default(),
        },
        SessionPhase::Uninitialized => CallScreenView::Initialize,
    }
}
