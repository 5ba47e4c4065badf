//! Voice session manager
//!
//! Drives the session through `Uninitialized → Initializing → Ready`, with a
//! `Failed` exit from initialization, and places calls once ready.
//!
//! # Initialization
//!
//! [`VoiceSessionManager::initialize`] does its synchronous part before it
//! returns: the re-entrancy guard, `loading = true`, and the device event
//! subscription. The rest runs on a spawned task:
//!
//! 1. fetch an access token,
//! 2. request microphone access where the platform needs it (a denial is
//!    logged, not fatal),
//! 3. `init_with_token`,
//! 4. configure CallKit on iOS,
//! 5. wait for the device to report ready.
//!
//! The whole task runs under [`InitPolicy::init_timeout`]. Device events can
//! arrive at any time and are applied to the store as they come in. A
//! not-ready event that moves the session out of `Initializing` ends the
//! sequence where it stands, and a retry aborts whatever is left of the
//! previous one.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use callbox_core::{
//!     LoopbackVoiceSdk, StaticConfirmer, StaticTokenSource, VoiceSessionManager,
//! };
//!
//! # async fn example() -> callbox_core::CallboxResult<()> {
//! let manager = VoiceSessionManager::builder(
//!     Arc::new(LoopbackVoiceSdk::new()),
//!     Arc::new(StaticTokenSource::new("abc123")),
//! )
//! .build();
//!
//! manager.initialize()?.wait().await?;
//! manager.set_destination_number("+15550100");
//! manager.place_call(&StaticConfirmer::accepting()).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::call::{CallConfirmer, CallOutcome, ConfirmationPrompt};
use crate::config::{
    CallboxConfig, InitPolicy, NotReadyPolicy, TokenFailurePolicy, DEFAULT_CALL_KIT_APP_NAME,
};
use crate::error::{CallboxError, CallboxResult};
use crate::permission::{ensure_microphone_permission, PermissionGate, StaticPermissionGate};
use crate::platform::Platform;
use crate::recovery::with_timeout;
use crate::sdk::{CallKitConfig, ConnectParams, DeviceEvent, VoiceSdk};
use crate::state::{SessionPhase, SessionState};
use crate::store::SessionStore;
use crate::token::{AccessToken, TokenSource};
use crate::view::{render, CallScreenView};

/// Owns the voice SDK handle and the session state machine
pub struct VoiceSessionManager {
    sdk: Arc<dyn VoiceSdk>,
    tokens: Arc<dyn TokenSource>,
    permissions: Arc<dyn PermissionGate>,
    store: SessionStore,
    platform: Platform,
    policy: InitPolicy,
    call_kit_app_name: String,
    listener: Mutex<Option<JoinHandle<()>>>,
    sequence: Mutex<Option<AbortHandle>>,
}

impl std::fmt::Debug for VoiceSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSessionManager")
            .field("store", &self.store)
            .field("platform", &self.platform)
            .field("policy", &self.policy)
            .field("call_kit_app_name", &self.call_kit_app_name)
            .finish_non_exhaustive()
    }
}

/// Builder for [`VoiceSessionManager`]
pub struct VoiceSessionManagerBuilder {
    sdk: Arc<dyn VoiceSdk>,
    tokens: Arc<dyn TokenSource>,
    permissions: Option<Arc<dyn PermissionGate>>,
    store: Option<SessionStore>,
    platform: Platform,
    policy: InitPolicy,
    call_kit_app_name: String,
}

impl VoiceSessionManagerBuilder {
    /// Permission gate used on platforms that need a microphone grant
    ///
    /// Defaults to a gate that reports access as granted.
    pub fn permission_gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.permissions = Some(gate);
        self
    }

    /// Store to drive; defaults to a fresh one
    pub fn store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Platform family to behave as
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Failure handling policy
    pub fn policy(mut self, policy: InitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Name shown in the system call UI
    pub fn call_kit_app_name(mut self, name: impl Into<String>) -> Self {
        self.call_kit_app_name = name.into();
        self
    }

    /// Take platform, policy and CallKit name from `config`
    pub fn config(self, config: &CallboxConfig) -> Self {
        self.platform(config.platform)
            .policy(config.policy.clone())
            .call_kit_app_name(config.call_kit_app_name.clone())
    }

    /// Build the manager
    pub fn build(self) -> Arc<VoiceSessionManager> {
        Arc::new(VoiceSessionManager {
            sdk: self.sdk,
            tokens: self.tokens,
            permissions: self
                .permissions
                .unwrap_or_else(|| Arc::new(StaticPermissionGate::granted())),
            store: self.store.unwrap_or_default(),
            platform: self.platform,
            policy: self.policy,
            call_kit_app_name: self.call_kit_app_name,
            listener: Mutex::new(None),
            sequence: Mutex::new(None),
        })
    }
}

/// Pending initialization sequence
#[derive(Debug)]
pub struct InitializeHandle {
    task: JoinHandle<CallboxResult<()>>,
}

impl InitializeHandle {
    /// Wait until the device is ready or initialization failed
    pub async fn wait(self) -> CallboxResult<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(CallboxError::invalid_state(format!(
                "initialization task ended abnormally: {e}"
            ))),
        }
    }

    /// Whether the sequence has finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl VoiceSessionManager {
    /// Start building a manager around `sdk` and `tokens`
    pub fn builder(
        sdk: Arc<dyn VoiceSdk>,
        tokens: Arc<dyn TokenSource>,
    ) -> VoiceSessionManagerBuilder {
        VoiceSessionManagerBuilder {
            sdk,
            tokens,
            permissions: None,
            store: None,
            platform: Platform::current(),
            policy: InitPolicy::default(),
            call_kit_app_name: DEFAULT_CALL_KIT_APP_NAME.to_string(),
        }
    }

    /// The store this manager drives
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Copy of the current state
    pub fn state(&self) -> SessionState {
        self.store.snapshot()
    }

    /// The call screen for the current state
    pub fn view(&self) -> CallScreenView {
        render(&self.store.snapshot())
    }

    /// Active failure policy
    pub fn policy(&self) -> &InitPolicy {
        &self.policy
    }

    /// Start initializing the voice device
    ///
    /// Fails with [`CallboxError::AlreadyInitializing`] or
    /// [`CallboxError::AlreadyInitialized`] instead of starting a second
    /// sequence. Must be called from within a tokio runtime.
    pub fn initialize(self: &Arc<Self>) -> CallboxResult<InitializeHandle> {
        // guard and loading = true first, so a rejected call keeps the live listener
        let attempt = self.store.begin_initializing()?;
        self.listen_for_device_events();
        info!(attempt, platform = %self.platform, "Initializing voice device");

        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = with_timeout(
                "initialize",
                manager.policy.init_timeout,
                manager.run_initialization(attempt),
            )
            .await;
            if let Err(e) = &result {
                if manager.store.fail_initialization(attempt, e.to_string()) {
                    error!(attempt, error = %e, "Voice device initialization failed");
                } else {
                    debug!(attempt, error = %e, "Initialization attempt ended");
                }
            }
            result
        });

        if let Some(previous) = self.sequence.lock().replace(task.abort_handle()) {
            previous.abort();
        }
        Ok(InitializeHandle { task })
    }

    /// Apply a device event to the session
    pub fn handle_device_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Ready => {
                if self.store.mark_ready() {
                    info!("Voice device ready");
                } else {
                    warn!(
                        phase = ?self.store.phase(),
                        "Ignoring device ready event outside initialization"
                    );
                }
            }
            DeviceEvent::NotReady { error } => {
                warn!(%error, policy = ?self.policy.on_device_not_ready, "Voice device not ready");
                match self.policy.on_device_not_ready {
                    NotReadyPolicy::KeepLoading => {}
                    NotReadyPolicy::Reset => {
                        self.store.reset();
                    }
                    NotReadyPolicy::Fail => {
                        self.store.mark_failed(error);
                    }
                }
            }
        }
    }

    /// Number-entry edit
    pub fn set_destination_number(&self, number: impl Into<String>) {
        self.store.set_destination_number(number);
    }

    /// Confirm with the user, then dial the entered number
    ///
    /// Needs a ready device and a non-empty number. A declined confirmation
    /// changes nothing.
    pub async fn place_call(&self, confirmer: &dyn CallConfirmer) -> CallboxResult<CallOutcome> {
        let state = self.store.snapshot();
        if state.phase() != SessionPhase::Ready {
            return Err(CallboxError::NotReady);
        }
        if !state.has_destination() {
            return Err(CallboxError::EmptyDestination);
        }

        let to = state.destination_number;
        if !confirmer.confirm(&ConfirmationPrompt::for_number(&to)).await {
            debug!(%to, "Call declined at confirmation");
            return Ok(CallOutcome::Declined);
        }

        info!(%to, "Placing call");
        self.sdk.connect(ConnectParams::new(to.clone())).await?;
        Ok(CallOutcome::Placed { to })
    }

    /// Stop listening for device events
    pub fn shutdown(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
            debug!("Device event listener stopped");
        }
    }

    async fn run_initialization(&self, attempt: u64) -> CallboxResult<()> {
        let prepare = self.prepare_device();
        tokio::pin!(prepare);
        let device = self.wait_for_device(attempt);
        tokio::pin!(device);

        tokio::select! {
            prepared = &mut prepare => {
                prepared?;
                device.await
            }
            outcome = &mut device => match outcome {
                // ready before setup finished; finish it anyway
                Ok(()) => prepare.await,
                Err(e) => {
                    debug!(attempt, error = %e, "Session left initialization, dropping remaining steps");
                    Err(e)
                }
            },
        }
    }

    async fn prepare_device(&self) -> CallboxResult<()> {
        let token = match self.tokens.fetch_token().await {
            Ok(token) => token,
            Err(e) => match self.policy.on_token_failure {
                TokenFailurePolicy::PassThrough => {
                    error!(error = %e, "Access token fetch failed, continuing with empty token");
                    AccessToken::empty()
                }
                TokenFailurePolicy::Abort => return Err(e),
            },
        };

        if self.platform.requires_audio_permission() {
            let status = ensure_microphone_permission(self.permissions.as_ref()).await;
            if !status.is_granted() {
                warn!("Continuing without microphone permission");
            }
        }

        self.sdk.init_with_token(&token).await?;

        if self.platform.supports_call_kit() {
            self.sdk
                .configure_call_kit(CallKitConfig {
                    app_name: self.call_kit_app_name.clone(),
                })
                .await?;
        }
        Ok(())
    }

    async fn wait_for_device(&self, attempt: u64) -> CallboxResult<()> {
        let mut changes = self.store.subscribe();
        loop {
            let state = changes.borrow_and_update().clone();
            if self.store.attempt() != attempt {
                return Err(CallboxError::invalid_state(
                    "initialization superseded by a newer attempt",
                ));
            }
            match state.phase() {
                SessionPhase::Ready => return Ok(()),
                SessionPhase::Initializing => {}
                SessionPhase::Failed => {
                    return Err(CallboxError::DeviceNotReady {
                        error: state.last_error.unwrap_or_default(),
                    })
                }
                SessionPhase::Uninitialized => return Err(CallboxError::NotReady),
            }
            if changes.changed().await.is_err() {
                return Err(CallboxError::invalid_state("session store closed"));
            }
        }
    }

    fn listen_for_device_events(self: &Arc<Self>) {
        let mut events = self.sdk.subscribe();
        let manager: Weak<Self> = Arc::downgrade(self);
        let listener = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        manager.handle_device_event(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Device event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        // one subscription per manager; a retry replaces the previous one
        if let Some(previous) = self.listener.lock().replace(listener) {
            previous.abort();
        }
    }
}

impl Drop for VoiceSessionManager {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}
