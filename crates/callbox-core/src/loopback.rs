//! In-process voice SDK
//!
//! [`LoopbackVoiceSdk`] behaves like a voice SDK without any network: a
//! non-empty token makes the device report ready after a short delay, an empty
//! token makes it report not-ready. Outgoing calls are recorded instead of
//! dialed. The CLI uses it as its default device, and tests use the manual
//! knobs to drive event timing themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{CallboxError, CallboxResult};
use crate::sdk::{CallKitConfig, ConnectParams, DeviceEvent, DeviceEventEmitter, VoiceSdk};
use crate::token::AccessToken;

/// Error text reported for an empty token
pub const INVALID_TOKEN_ERROR: &str = "Invalid access token";

/// Voice SDK stand-in that never leaves the process
#[derive(Debug)]
pub struct LoopbackVoiceSdk {
    emitter: DeviceEventEmitter,
    ready: Arc<AtomicBool>,
    auto_ready: bool,
    ready_delay: Duration,
    init_delay: Option<Duration>,
    init_failure: Option<String>,
    init_tokens: Mutex<Vec<AccessToken>>,
    connects: Mutex<Vec<ConnectParams>>,
    call_kit: Mutex<Option<CallKitConfig>>,
}

impl Default for LoopbackVoiceSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackVoiceSdk {
    /// Device that reports ready 50 ms after initialization
    pub fn new() -> Self {
        Self {
            emitter: DeviceEventEmitter::default(),
            ready: Arc::new(AtomicBool::new(false)),
            auto_ready: true,
            ready_delay: Duration::from_millis(50),
            init_delay: None,
            init_failure: None,
            init_tokens: Mutex::new(Vec::new()),
            connects: Mutex::new(Vec::new()),
            call_kit: Mutex::new(None),
        }
    }

    /// Delay between `init_with_token` and the device event
    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// Never emit device events on its own; use [`LoopbackVoiceSdk::emit`]
    pub fn manual_events(mut self) -> Self {
        self.auto_ready = false;
        self
    }

    /// Make `init_with_token` itself take `delay`
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    /// Make `init_with_token` fail with `details`
    pub fn failing_init(mut self, details: impl Into<String>) -> Self {
        self.init_failure = Some(details.into());
        self
    }

    /// Emit a device event to every subscriber
    pub fn emit(&self, event: DeviceEvent) {
        self.ready
            .store(matches!(event, DeviceEvent::Ready), Ordering::SeqCst);
        self.emitter.emit(event);
    }

    /// Number of live event subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.emitter.receiver_count()
    }

    /// Tokens passed to `init_with_token`, in order
    pub fn init_tokens(&self) -> Vec<AccessToken> {
        self.init_tokens.lock().clone()
    }

    /// Calls placed, in order
    pub fn connects(&self) -> Vec<ConnectParams> {
        self.connects.lock().clone()
    }

    /// Last CallKit configuration applied
    pub fn call_kit_config(&self) -> Option<CallKitConfig> {
        self.call_kit.lock().clone()
    }

    /// Whether the device currently reports ready
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceSdk for LoopbackVoiceSdk {
    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.emitter.subscribe()
    }

    async fn init_with_token(&self, token: &AccessToken) -> CallboxResult<()> {
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(details) = &self.init_failure {
            return Err(CallboxError::sdk("init_with_token", details.clone()));
        }

        self.init_tokens.lock().push(token.clone());
        debug!(?token, "Loopback device initializing");

        if self.auto_ready {
            let emitter = self.emitter.clone();
            let ready = self.ready.clone();
            let delay = self.ready_delay;
            let valid = !token.is_empty();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                ready.store(valid, Ordering::SeqCst);
                if valid {
                    emitter.emit(DeviceEvent::Ready);
                } else {
                    emitter.emit(DeviceEvent::NotReady {
                        error: INVALID_TOKEN_ERROR.to_string(),
                    });
                }
            });
        }
        Ok(())
    }

    async fn connect(&self, params: ConnectParams) -> CallboxResult<()> {
        if !self.is_ready() {
            return Err(CallboxError::NotReady);
        }
        info!(to = %params.to, "Loopback device connecting call");
        self.connects.lock().push(params);
        Ok(())
    }

    async fn configure_call_kit(&self, config: CallKitConfig) -> CallboxResult<()> {
        debug!(app_name = %config.app_name, "Loopback device CallKit configured");
        *self.call_kit.lock() = Some(config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_valid_token_reports_ready() {
        let sdk = LoopbackVoiceSdk::new().with_ready_delay(Duration::from_millis(1));
        let mut events = sdk.subscribe();
        sdk.init_with_token(&AccessToken::new("abc123")).await.unwrap();
        assert_eq!(events.recv().await.unwrap(), DeviceEvent::Ready);
        assert!(sdk.is_ready());
    }

    #[tokio::test]
    async fn test_empty_token_reports_not_ready() {
        let sdk = LoopbackVoiceSdk::new().with_ready_delay(Duration::from_millis(1));
        let mut events = sdk.subscribe();
        sdk.init_with_token(&AccessToken::empty()).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            DeviceEvent::NotReady {
                error: INVALID_TOKEN_ERROR.to_string()
            }
        );
        assert!(!sdk.is_ready());
    }

    #[tokio::test]
    async fn test_connect_requires_ready() {
        let sdk = LoopbackVoiceSdk::new().manual_events();
        assert!(matches!(
            sdk.connect(ConnectParams::new("100")).await,
            Err(CallboxError::NotReady)
        ));
        sdk.emit(DeviceEvent::Ready);
        sdk.connect(ConnectParams::new("100")).await.unwrap();
        assert_eq!(sdk.connects(), vec![ConnectParams::new("100")]);
    }

    #[tokio::test]
    async fn test_failing_init() {
        let sdk = LoopbackVoiceSdk::new().failing_init("bad region");
        let err = sdk.init_with_token(&AccessToken::new("t")).await.unwrap_err();
        assert!(matches!(err, CallboxError::Sdk { .. }));
        assert!(sdk.init_tokens().is_empty());
    }
}
