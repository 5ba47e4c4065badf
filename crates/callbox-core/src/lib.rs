//! # callbox-core - Voice session coordination
//!
//! This crate sequences everything a calling client does before and around a
//! call, while the call itself stays inside an external voice SDK:
//!
//! - **Permission gate**: microphone grant on platforms that require one
//! - **Token fetcher**: short-lived access token from a backend endpoint
//! - **Voice session manager**: SDK initialization state machine, device
//!   events and call placement
//! - **State store**: the session state every front end renders from, with
//!   snapshot persistence
//! - **Call screen**: the state-to-view mapping
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use callbox_core::{
//!     render, CallScreenView, HttpTokenFetcher, LoopbackVoiceSdk, StaticConfirmer,
//!     VoiceSessionManager,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = VoiceSessionManager::builder(
//!         Arc::new(LoopbackVoiceSdk::new()),
//!         Arc::new(HttpTokenFetcher::new("https://voice.example.com/accessToken")),
//!     )
//!     .build();
//!
//!     // loading = true as soon as this returns
//!     let pending = manager.initialize()?;
//!     assert_eq!(manager.view(), CallScreenView::Loading);
//!
//!     pending.wait().await?;
//!     manager.set_destination_number("+15550100");
//!     assert!(render(&manager.state()).call_enabled());
//!
//!     manager.place_call(&StaticConfirmer::accepting()).await?;
//!     Ok(())
//! }
//! ```

pub mod call;
pub mod config;
pub mod error;
pub mod loopback;
pub mod manager;
pub mod navigation;
pub mod permission;
pub mod platform;
pub mod recovery;
pub mod sdk;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod token;
pub mod view;

// Re-export main types
pub use call::{CallConfirmer, CallOutcome, ConfirmationPrompt, StaticConfirmer};
pub use config::{CallboxConfig, InitPolicy, LoggingSettings, NotReadyPolicy, TokenFailurePolicy};
pub use error::{CallboxError, CallboxResult};
pub use loopback::LoopbackVoiceSdk;
pub use manager::{InitializeHandle, VoiceSessionManager, VoiceSessionManagerBuilder};
pub use navigation::{can_exit, NavigationState};
pub use permission::{
    ensure_microphone_permission, PermissionGate, PermissionPrompt, PermissionStatus,
    StaticPermissionGate,
};
pub use platform::Platform;
pub use sdk::{CallKitConfig, ConnectParams, DeviceEvent, DeviceEventEmitter, VoiceSdk};
pub use snapshot::{
    setup_session_store, spawn_snapshot_persister, FileSnapshotStorage, MemorySnapshotStorage,
    SnapshotStorage,
};
pub use state::{SessionPhase, SessionState};
pub use store::SessionStore;
pub use token::{AccessToken, HttpTokenFetcher, StaticTokenSource, TokenSource};
pub use view::{render, CallScreenView};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
