//! Voice SDK boundary
//!
//! Call setup, audio transport and token validation belong to an external
//! voice SDK. The session manager only sees it through [`VoiceSdk`], so a
//! real SDK binding and the in-process [`LoopbackVoiceSdk`] are
//! interchangeable.
//!
//! [`LoopbackVoiceSdk`]: crate::loopback::LoopbackVoiceSdk

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::CallboxResult;
use crate::token::AccessToken;

/// Device status events emitted by the SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device finished initializing and can place calls
    Ready,
    /// The device could not initialize, or lost its registration
    NotReady {
        /// SDK-provided error text
        error: String,
    },
}

/// Parameters of an outgoing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectParams {
    /// Destination number, passed to the SDK unvalidated
    #[serde(rename = "To")]
    pub to: String,
}

impl ConnectParams {
    /// Call `to`
    pub fn new(to: impl Into<String>) -> Self {
        Self { to: to.into() }
    }
}

/// System call UI integration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallKitConfig {
    /// Name shown in the system call UI
    pub app_name: String,
}

/// The third-party voice SDK
#[async_trait]
pub trait VoiceSdk: Send + Sync {
    /// Start listening for device events
    ///
    /// Every call returns a new receiver; dropping it unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent>;

    /// Initialize the calling session with an access token
    ///
    /// Completion does not mean the device is ready; readiness arrives later
    /// as [`DeviceEvent::Ready`].
    async fn init_with_token(&self, token: &AccessToken) -> CallboxResult<()>;

    /// Place an outgoing call
    async fn connect(&self, params: ConnectParams) -> CallboxResult<()>;

    /// Configure the system call UI integration
    async fn configure_call_kit(&self, config: CallKitConfig) -> CallboxResult<()>;
}

/// Broadcast fan-out for [`DeviceEvent`]s, for SDK implementations
#[derive(Debug, Clone)]
pub struct DeviceEventEmitter {
    sender: broadcast::Sender<DeviceEvent>,
}

impl DeviceEventEmitter {
    /// Create an emitter buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: DeviceEvent) {
        // no receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscriptions
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DeviceEventEmitter {
    fn default() -> Self {
        Self::new(64)
    }
}
