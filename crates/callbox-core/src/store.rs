//! Application state store
//!
//! The single source of truth the call screen renders from. Every mutation
//! goes through one of the transition methods below, which check the current
//! phase and write `loading`/`initialized` together, so no observer can ever
//! see both set. Observers get change notifications through
//! [`SessionStore::subscribe`].
//!
//! Each accepted [`SessionStore::begin_initializing`] opens a new attempt.
//! Only the current attempt may fail initialization, so a sequence that was
//! overtaken by a retry cannot touch the state of its successor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::{CallboxError, CallboxResult};
use crate::navigation::NavigationState;
use crate::state::{SessionPhase, SessionState};

/// Shared handle to the session state
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
    // written only while the watch value is locked
    attempt: Arc<AtomicU64>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.tx.borrow())
            .field("attempt", &self.attempt())
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}

impl SessionStore {
    /// Create a store holding `initial`
    pub fn new(initial: SessionState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            tx: Arc::new(tx),
            attempt: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.tx.borrow().phase()
    }

    /// Id of the latest initialization attempt, `0` before the first one
    pub fn attempt(&self) -> u64 {
        self.attempt.load(Ordering::Acquire)
    }

    /// Receive every subsequent state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Uninitialized/Failed → Initializing
    ///
    /// Rejects re-entry while a sequence is in flight or the device is ready.
    /// Returns the id of the new attempt.
    pub fn begin_initializing(&self) -> CallboxResult<u64> {
        let mut outcome = Ok(0);
        self.tx.send_if_modified(|state| match state.phase() {
            SessionPhase::Initializing => {
                outcome = Err(CallboxError::AlreadyInitializing);
                false
            }
            SessionPhase::Ready => {
                outcome = Err(CallboxError::AlreadyInitialized);
                false
            }
            SessionPhase::Uninitialized | SessionPhase::Failed => {
                state.loading = true;
                state.initialized = false;
                state.last_error = None;
                outcome = Ok(self.attempt.fetch_add(1, Ordering::AcqRel) + 1);
                true
            }
        });
        if let Ok(attempt) = &outcome {
            debug!(attempt = *attempt, "Session initializing");
        }
        outcome
    }

    /// Initializing → Ready
    ///
    /// Returns `false` and leaves the state untouched in any other phase.
    pub fn mark_ready(&self) -> bool {
        self.transition("ready", &[SessionPhase::Initializing], |state| {
            state.initialized = true;
            state.loading = false;
            state.last_error = None;
        })
    }

    /// Initializing → Failed, for `attempt` only
    ///
    /// Ignored once a newer attempt has started.
    pub fn fail_initialization(&self, attempt: u64, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.tx.send_if_modified(|state| {
            let current = self.attempt.load(Ordering::Acquire);
            if current != attempt || state.phase() != SessionPhase::Initializing {
                trace!(attempt, current, "Stale initialization failure, ignoring");
                return false;
            }
            state.initialized = false;
            state.loading = false;
            state.last_error = Some(reason);
            debug!(attempt, "Session transition to failed");
            true
        })
    }

    /// Initializing/Ready → Failed
    pub fn mark_failed(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.transition(
            "failed",
            &[SessionPhase::Initializing, SessionPhase::Ready],
            move |state| {
                state.initialized = false;
                state.loading = false;
                state.last_error = Some(reason);
            },
        )
    }

    /// Initializing/Ready → Uninitialized
    pub fn reset(&self) -> bool {
        self.transition(
            "uninitialized",
            &[SessionPhase::Initializing, SessionPhase::Ready],
            |state| {
                state.initialized = false;
                state.loading = false;
                state.last_error = None;
            },
        )
    }

    /// Number-entry edit
    pub fn set_destination_number(&self, number: impl Into<String>) {
        let number = number.into();
        self.tx.send_if_modified(|state| {
            if state.destination_number == number {
                return false;
            }
            state.destination_number = number;
            true
        });
    }

    /// Replace the navigation tree
    pub fn set_navigation_state(&self, navigation: NavigationState) {
        self.tx.send_if_modified(|state| {
            if state.navigation_state == navigation {
                return false;
            }
            state.navigation_state = navigation;
            true
        });
    }

    fn transition<F>(&self, to: &str, allowed: &[SessionPhase], apply: F) -> bool
    where
        F: FnOnce(&mut SessionState),
    {
        self.tx.send_if_modified(|state| {
            let from = state.phase();
            if !allowed.contains(&from) {
                trace!(?from, to, "Transition not allowed, ignoring");
                return false;
            }
            apply(state);
            debug_assert!(!(state.loading && state.initialized));
            debug!(?from, to = ?state.phase(), "Session transition");
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_initializing_sets_loading() {
        let store = SessionStore::default();
        store.begin_initializing().unwrap();
        let state = store.snapshot();
        assert!(state.loading);
        assert!(!state.initialized);
        assert_eq!(state.phase(), SessionPhase::Initializing);
    }

    #[test]
    fn test_begin_initializing_rejects_reentry() {
        let store = SessionStore::default();
        store.begin_initializing().unwrap();
        assert!(matches!(
            store.begin_initializing(),
            Err(CallboxError::AlreadyInitializing)
        ));
        store.mark_ready();
        assert!(matches!(
            store.begin_initializing(),
            Err(CallboxError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_ready_only_from_initializing() {
        let store = SessionStore::default();
        assert!(!store.mark_ready());
        assert_eq!(store.snapshot(), SessionState::default());

        store.begin_initializing().unwrap();
        assert!(store.mark_ready());
        let state = store.snapshot();
        assert!(state.initialized);
        assert!(!state.loading);
    }

    #[test]
    fn test_failed_can_retry() {
        let store = SessionStore::default();
        let attempt = store.begin_initializing().unwrap();
        assert!(store.fail_initialization(attempt, "token endpoint unreachable"));
        assert_eq!(store.phase(), SessionPhase::Failed);
        assert_eq!(
            store.snapshot().last_error.as_deref(),
            Some("token endpoint unreachable")
        );

        store.begin_initializing().unwrap();
        assert_eq!(store.phase(), SessionPhase::Initializing);
        assert!(store.snapshot().last_error.is_none());
    }

    #[test]
    fn test_fail_initialization_ignored_when_ready() {
        let store = SessionStore::default();
        let attempt = store.begin_initializing().unwrap();
        store.mark_ready();
        assert!(!store.fail_initialization(attempt, "late timeout"));
        assert_eq!(store.phase(), SessionPhase::Ready);

        assert!(store.mark_failed("device lost"));
        assert_eq!(store.phase(), SessionPhase::Failed);
    }

    #[test]
    fn test_stale_attempt_cannot_fail_retry() {
        let store = SessionStore::default();
        let first = store.begin_initializing().unwrap();
        assert!(store.mark_failed("device offline"));

        let second = store.begin_initializing().unwrap();
        assert_eq!(second, first + 1);
        assert!(!store.fail_initialization(first, "initialize timed out"));
        assert_eq!(store.phase(), SessionPhase::Initializing);
        assert!(store.snapshot().last_error.is_none());

        assert!(store.fail_initialization(second, "initialize timed out"));
        assert_eq!(store.phase(), SessionPhase::Failed);
    }

    #[test]
    fn test_reset_returns_to_uninitialized() {
        let store = SessionStore::default();
        assert!(!store.reset());
        store.begin_initializing().unwrap();
        assert!(store.reset());
        assert_eq!(store.phase(), SessionPhase::Uninitialized);
    }

    #[test]
    fn test_loading_and_initialized_never_both_true() {
        let steps: Vec<Box<dyn Fn(&SessionStore)>> = vec![
            Box::new(|s| {
                let _ = s.begin_initializing();
            }),
            Box::new(|s| {
                s.mark_ready();
            }),
            Box::new(|s| {
                s.mark_failed("x");
            }),
            Box::new(|s| {
                s.reset();
            }),
            Box::new(|s| {
                s.fail_initialization(s.attempt(), "y");
            }),
            Box::new(|s| s.set_destination_number("123")),
        ];

        // every ordered pair and triple of transitions
        for a in &steps {
            for b in &steps {
                for c in &steps {
                    let store = SessionStore::default();
                    for step in [a, b, c] {
                        step(&store);
                        let state = store.snapshot();
                        assert!(!(state.loading && state.initialized), "{state:?}");
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = SessionStore::default();
        let mut rx = store.subscribe();
        store.set_destination_number("5551234");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().destination_number, "5551234");
    }

    #[test]
    fn test_unchanged_destination_does_not_notify() {
        let store = SessionStore::default();
        let mut rx = store.subscribe();
        store.set_destination_number("");
        assert!(!rx.has_changed().unwrap());
    }
}
