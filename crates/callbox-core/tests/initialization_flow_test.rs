//! Initialization state machine tests
//!
//! These drive a [`VoiceSessionManager`] against the loopback SDK and check
//! the session state and call screen at each step.

use std::sync::Arc;
use std::time::Duration;

use callbox_core::{
    render, AccessToken, CallKitConfig, CallScreenView, CallboxError, CallboxResult,
    DeviceEvent, InitPolicy, LoopbackVoiceSdk, NotReadyPolicy, PermissionStatus, Platform,
    SessionPhase, StaticPermissionGate, StaticTokenSource, TokenSource, VoiceSessionManager,
};

struct UnreachableTokens;

#[async_trait::async_trait]
impl TokenSource for UnreachableTokens {
    async fn fetch_token(&self) -> CallboxResult<AccessToken> {
        Err(CallboxError::token_fetch("connection refused"))
    }
}

fn fast_sdk() -> Arc<LoopbackVoiceSdk> {
    Arc::new(LoopbackVoiceSdk::new().with_ready_delay(Duration::from_millis(5)))
}

async fn wait_for_phase(manager: &VoiceSessionManager, phase: SessionPhase) {
    let mut changes = manager.store().subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        while changes.borrow_and_update().phase() != phase {
            changes.changed().await.unwrap();
        }
    })
    .await
    .unwrap_or_else(|_| panic!("session never reached {phase:?}"));
}

#[tokio::test]
async fn test_end_to_end_initialize_then_dial() {
    let sdk = fast_sdk();
    let gate = Arc::new(StaticPermissionGate::new(
        PermissionStatus::Denied,
        PermissionStatus::Granted,
    ));
    let manager = VoiceSessionManager::builder(sdk.clone(), Arc::new(StaticTokenSource::new("abc123")))
        .platform(Platform::Android)
        .permission_gate(gate.clone())
        .build();

    let state = manager.state();
    assert_eq!(state.phase(), SessionPhase::Uninitialized);
    assert!(!state.loading);
    assert_eq!(state.destination_number, "");
    assert_eq!(manager.view(), CallScreenView::Initialize);

    let pending = manager.initialize().unwrap();
    // synchronous part of the transition is already visible
    assert!(manager.state().loading);
    assert_eq!(manager.view(), CallScreenView::Loading);

    pending.wait().await.unwrap();
    let state = manager.state();
    assert!(state.initialized);
    assert!(!state.loading);
    assert_eq!(sdk.init_tokens(), vec![AccessToken::new("abc123")]);
    assert_eq!(gate.request_count(), 1);

    assert_eq!(
        manager.view(),
        CallScreenView::Dial {
            number: String::new(),
            call_enabled: false
        }
    );
    manager.set_destination_number("+15550100");
    assert!(manager.view().call_enabled());
}

#[tokio::test]
async fn test_permission_denied_still_initializes() {
    let sdk = fast_sdk();
    let gate = Arc::new(StaticPermissionGate::denying());
    let manager = VoiceSessionManager::builder(sdk.clone(), Arc::new(StaticTokenSource::new("abc123")))
        .platform(Platform::Android)
        .permission_gate(gate.clone())
        .build();

    manager.initialize().unwrap().wait().await.unwrap();
    assert_eq!(gate.request_count(), 1);
    assert_eq!(manager.store().phase(), SessionPhase::Ready);
}

#[tokio::test]
async fn test_desktop_skips_permission_and_call_kit() {
    let sdk = fast_sdk();
    let gate = Arc::new(StaticPermissionGate::denying());
    let manager = VoiceSessionManager::builder(sdk.clone(), Arc::new(StaticTokenSource::new("abc123")))
        .platform(Platform::Desktop)
        .permission_gate(gate.clone())
        .build();

    manager.initialize().unwrap().wait().await.unwrap();
    assert_eq!(gate.request_count(), 0);
    assert!(sdk.call_kit_config().is_none());
}

#[tokio::test]
async fn test_ios_configures_call_kit() {
    let sdk = fast_sdk();
    let manager = VoiceSessionManager::builder(sdk.clone(), Arc::new(StaticTokenSource::new("abc123")))
        .platform(Platform::Ios)
        .build();

    manager.initialize().unwrap().wait().await.unwrap();
    assert_eq!(
        sdk.call_kit_config(),
        Some(CallKitConfig {
            app_name: "Twilio Call".to_string()
        })
    );
}

#[tokio::test]
async fn test_second_initialize_is_rejected() {
    let sdk = Arc::new(LoopbackVoiceSdk::new().manual_events());
    let manager = VoiceSessionManager::builder(sdk.clone(), Arc::new(StaticTokenSource::new("abc123")))
        .platform(Platform::Desktop)
        .build();

    let _pending = manager.initialize().unwrap();
    assert!(matches!(
        manager.initialize(),
        Err(CallboxError::AlreadyInitializing)
    ));
    assert_eq!(sdk.subscriber_count(), 1);

    sdk.emit(DeviceEvent::Ready);
    wait_for_phase(&manager, SessionPhase::Ready).await;
    assert!(matches!(
        manager.initialize(),
        Err(CallboxError::AlreadyInitialized)
    ));
    assert_eq!(sdk.subscriber_count(), 1);
}

#[tokio::test]
async fn test_token_failure_aborts_by_default() {
    let sdk = fast_sdk();
    let manager = VoiceSessionManager::builder(sdk.clone(), Arc::new(UnreachableTokens))
        .platform(Platform::Desktop)
        .build();

    let err = manager.initialize().unwrap().wait().await.unwrap_err();
    assert!(matches!(err, CallboxError::TokenFetch { .. }));
    assert!(sdk.init_tokens().is_empty());

    let state = manager.state();
    assert_eq!(state.phase(), SessionPhase::Failed);
    assert!(!state.loading);
    assert!(matches!(render(&state), CallScreenView::Failed { .. }));
}

#[tokio::test]
async fn test_compatible_policy_passes_empty_token_and_stays_loading() {
    let sdk = fast_sdk();
    let manager = VoiceSessionManager::builder(sdk.clone(), Arc::new(UnreachableTokens))
        .platform(Platform::Desktop)
        .policy(InitPolicy::compatible())
        .build();

    let pending = manager.initialize().unwrap();
    // the loopback device answers an empty token with not-ready
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sdk.init_tokens(), vec![AccessToken::empty()]);
    assert!(!pending.is_finished());

    let state = manager.state();
    assert!(state.loading);
    assert!(!state.initialized);
    assert_eq!(manager.view(), CallScreenView::Loading);
}

#[tokio::test]
async fn test_not_ready_fails_then_retry_succeeds() {
    let sdk = Arc::new(LoopbackVoiceSdk::new().manual_events());
    let manager = VoiceSessionManager::builder(sdk.clone(), Arc::new(StaticTokenSource::new("abc123")))
        .platform(Platform::Desktop)
        .build();
    assert_eq!(manager.policy().on_device_not_ready, NotReadyPolicy::Fail);

    let pending = manager.initialize().unwrap();
    while sdk.init_tokens().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    sdk.emit(DeviceEvent::NotReady {
        error: "JWT expired".to_string(),
    });

    let err = pending.wait().await.unwrap_err();
    assert!(matches!(err, CallboxError::DeviceNotReady { .. }));
    let state = manager.state();
    assert_eq!(state.phase(), SessionPhase::Failed);
    assert_eq!(state.last_error.as_deref(), Some("JWT expired"));

    let retry = manager.initialize().unwrap();
    // the previous listener is aborted, not duplicated
    for _ in 0..100 {
        if sdk.subscriber_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(sdk.subscriber_count(), 1);
    while sdk.init_tokens().len() < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    sdk.emit(DeviceEvent::Ready);
    retry.wait().await.unwrap();
    assert_eq!(manager.store().phase(), SessionPhase::Ready);
    assert!(manager.state().last_error.is_none());
}

struct SlowTokens(Duration);

#[async_trait::async_trait]
impl TokenSource for SlowTokens {
    async fn fetch_token(&self) -> CallboxResult<AccessToken> {
        tokio::time::sleep(self.0).await;
        Ok(AccessToken::new("abc123"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_early_not_ready_runs_alone() {
    let sdk = Arc::new(LoopbackVoiceSdk::new().manual_events());
    let manager = VoiceSessionManager::builder(
        sdk.clone(),
        Arc::new(SlowTokens(Duration::from_millis(100))),
    )
    .platform(Platform::Desktop)
    .policy(InitPolicy::default().with_timeout(Some(Duration::from_millis(300))))
    .build();

    // not-ready while the token is still being fetched
    let first = manager.initialize().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    sdk.emit(DeviceEvent::NotReady {
        error: "network down".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(manager.store().phase(), SessionPhase::Failed);
    assert!(first.is_finished());
    assert!(matches!(
        first.wait().await,
        Err(CallboxError::DeviceNotReady { .. })
    ));

    // t = 50 ms
    let retry = manager.initialize().unwrap();

    // past the first attempt's deadline, inside the retry's
    tokio::time::sleep(Duration::from_millis(270)).await;
    assert_eq!(sdk.init_tokens(), vec![AccessToken::new("abc123")]);
    let state = manager.state();
    assert_eq!(state.phase(), SessionPhase::Initializing);
    assert!(state.last_error.is_none());

    // the retry's own deadline at t = 350 ms
    let err = retry.wait().await.unwrap_err();
    assert!(matches!(err, CallboxError::Timeout { .. }));
    assert_eq!(manager.store().phase(), SessionPhase::Failed);
}

#[tokio::test]
async fn test_hung_sdk_init_times_out() {
    let sdk = Arc::new(
        LoopbackVoiceSdk::new().with_init_delay(Duration::from_secs(60)),
    );
    let manager = VoiceSessionManager::builder(sdk, Arc::new(StaticTokenSource::new("abc123")))
        .platform(Platform::Desktop)
        .policy(InitPolicy::default().with_timeout(Some(Duration::from_millis(50))))
        .build();

    let err = manager.initialize().unwrap().wait().await.unwrap_err();
    assert!(matches!(err, CallboxError::Timeout { .. }));
    assert_eq!(manager.store().phase(), SessionPhase::Failed);
}

#[tokio::test]
async fn test_sdk_init_error_fails_session() {
    let sdk = Arc::new(LoopbackVoiceSdk::new().failing_init("account suspended"));
    let manager = VoiceSessionManager::builder(sdk, Arc::new(StaticTokenSource::new("abc123")))
        .platform(Platform::Desktop)
        .build();

    let err = manager.initialize().unwrap().wait().await.unwrap_err();
    assert!(matches!(err, CallboxError::Sdk { .. }));
    let state = manager.state();
    assert_eq!(state.phase(), SessionPhase::Failed);
    assert!(state.last_error.unwrap().contains("account suspended"));
}

#[tokio::test]
async fn test_loading_and_initialized_never_observed_together() {
    let sdk = fast_sdk();
    let manager = VoiceSessionManager::builder(sdk, Arc::new(StaticTokenSource::new("abc123")))
        .platform(Platform::Desktop)
        .build();

    let mut changes = manager.store().subscribe();
    let observer = tokio::spawn(async move {
        loop {
            {
                let state = changes.borrow_and_update();
                assert!(!(state.loading && state.initialized), "{:?}", *state);
                if state.initialized {
                    break;
                }
            }
            if changes.changed().await.is_err() {
                break;
            }
        }
    });

    manager.initialize().unwrap().wait().await.unwrap();
    observer.await.unwrap();
}
