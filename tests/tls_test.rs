//! TLS trust-mode tests against the fake server's self-signed
//! certificate: accept-all, matching pin, and mismatched pin.

mod fake_eas;

use airsync_client::{
    AccountConfig, ErrorKind, MemoryAccounts, MemoryMirror, MirrorStore, RetryPolicy, SyncEngine,
    TlsMode,
};
use fake_eas::{FakeEasServer, ServerStateBuilder};
use std::sync::Arc;
use std::time::Duration;

const ACCOUNT: &str = "a1";

fn tls_config(server: &FakeEasServer) -> AccountConfig {
    let mut config =
        AccountConfig::plain(ACCOUNT, "127.0.0.1", server.port(), "testuser", "testpass");
    config.tls = TlsMode::Tls;
    config
}

fn engine_for(config: AccountConfig, mirror: &Arc<MemoryMirror>) -> SyncEngine {
    let accounts = Arc::new(MemoryAccounts::new());
    accounts.insert(config.clone());
    SyncEngine::new(&config, Arc::clone(mirror) as Arc<dyn MirrorStore>, accounts)
        .unwrap()
        .with_retry(RetryPolicy {
            attempts: 1,
            base_delay: Duration::from_millis(10),
        })
}

#[tokio::test]
async fn accept_all_certificates_allows_self_signed() {
    let state = ServerStateBuilder::new()
        .folder("5", None, "Inbox", 2)
        .build();
    let server = FakeEasServer::start_tls(state).await;

    let mut config = tls_config(&server);
    config.accept_all_certs = true;

    let mirror = Arc::new(MemoryMirror::new());
    let engine = engine_for(config, &mirror);

    let changed = engine.sync_folders().await.unwrap();
    assert_eq!(changed, 1);
    assert_eq!(mirror.folders(ACCOUNT).unwrap().len(), 1);
}

#[tokio::test]
async fn matching_pinned_fingerprint_allows_connection() {
    let state = ServerStateBuilder::new()
        .folder("5", None, "Inbox", 2)
        .build();
    let server = FakeEasServer::start_tls(state).await;

    let mut config = tls_config(&server);
    config.pinned_cert_sha256 = server.cert_sha256_hex();

    let mirror = Arc::new(MemoryMirror::new());
    let engine = engine_for(config, &mirror);

    let changed = engine.sync_folders().await.unwrap();
    assert_eq!(changed, 1);
}

#[tokio::test]
async fn mismatched_pinned_fingerprint_is_rejected() {
    let state = ServerStateBuilder::new()
        .folder("5", None, "Inbox", 2)
        .build();
    let server = FakeEasServer::start_tls(state).await;

    let mut config = tls_config(&server);
    config.pinned_cert_sha256 = Some("00".repeat(32));

    let mirror = Arc::new(MemoryMirror::new());
    let engine = engine_for(config, &mirror);

    let err = engine.sync_folders().await.unwrap_err();
    assert!(
        matches!(err.kind(), ErrorKind::Tls | ErrorKind::Transport),
        "unexpected error kind: {err}"
    );
    assert!(mirror.folders(ACCOUNT).unwrap().is_empty());
}

#[tokio::test]
async fn default_validation_rejects_self_signed() {
    let state = ServerStateBuilder::new()
        .folder("5", None, "Inbox", 2)
        .build();
    let server = FakeEasServer::start_tls(state).await;

    // No accept-all, no pin: the self-signed cert must fail standard
    // validation.
    let config = tls_config(&server);
    let mirror = Arc::new(MemoryMirror::new());
    let engine = engine_for(config, &mirror);

    let err = engine.sync_folders().await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Tls | ErrorKind::Transport));
}
