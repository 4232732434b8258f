//! End-to-end scenarios across page, relay, background and approval window.
//!
//! Every context runs on the in-memory host. Approval windows are driven by
//! the test: each opened window is picked up from the window manager and
//! answered through [`ApprovalWindow`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_test::assert_pending;
use tracing_subscriber::EnvFilter;

use wallet_bridge::background::{APPROVAL_WINDOW_KEY, TRANSACTION_LOCK_KEY};
use wallet_bridge::host::KeyValueStore;
use wallet_bridge::host::memory::{MemoryHost, OpenedWindow};
use wallet_bridge::protocol::{MessageSource, PageMessage};
use wallet_bridge::{
    ApprovalWindow, BackgroundDispatcher, BroadcastEvent, ContentRelay, Error, EventKind,
    PageBridge, PageWindow, RequestKind, StorageKey, TabId, WalletConfig, WindowGeometry,
};

// ============================================================================
// Harness
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    config: WalletConfig,
    host: MemoryHost,
    dispatcher: BackgroundDispatcher,
    opened: broadcast::Receiver<OpenedWindow>,
    event_loop: JoinHandle<()>,
}

struct Page {
    bridge: PageBridge,
    window: Arc<PageWindow>,
    relay: ContentRelay,
}

impl Harness {
    fn new() -> Result<Self> {
        init_tracing();
        let config = WalletConfig::new();
        let (host, channels) = MemoryHost::new();
        let dispatcher = BackgroundDispatcher::new(config.clone(), host.background_host())?;
        let opened = host.windows.subscribe();
        let event_loop = dispatcher.spawn(channels.inbox, channels.window_events);

        Ok(Self {
            config,
            host,
            dispatcher,
            opened,
            event_loop,
        })
    }

    async fn page(&self, tab: u32) -> Result<Page> {
        let tab_id = TabId::new(tab).context("tab id")?;
        let window = PageWindow::new(format!("https://dapp-{tab}.example"));
        let bus_rx = self.host.bus.connect_tab(tab_id);
        let relay = ContentRelay::attach(
            &self.config,
            tab_id,
            window.clone(),
            self.host.bus.clone(),
            bus_rx,
        )
        .await;

        Ok(Page {
            bridge: PageBridge::new(window.clone(), &self.config),
            window,
            relay,
        })
    }

    /// Waits for the next window the dispatcher opens.
    async fn next_window(&mut self) -> Result<OpenedWindow> {
        let window = tokio::time::timeout(Duration::from_secs(5), self.opened.recv())
            .await
            .context("no window opened")??;
        Ok(window)
    }

    async fn approval_window(&mut self) -> Result<(OpenedWindow, ApprovalWindow)> {
        let opened = self.next_window().await?;
        let approval = ApprovalWindow::open(self.dispatcher.clone(), &opened.url).await?;
        Ok((opened, approval))
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_get_network_through_probe_window() -> Result<()> {
    let mut harness = Harness::new()?;
    let page = harness.page(1).await?;

    let bridge = page.bridge.clone();
    let call = tokio::spawn(async move { bridge.get_network().await });

    let (opened, approval) = harness.approval_window().await?;
    assert_eq!(opened.geometry, WindowGeometry::PROBE);
    assert_eq!(approval.kind(), RequestKind::GetNetwork);
    assert!(!harness.dispatcher.is_locked());

    let network = json!({"network": "TESTNET", "networkPassphrase": "Test SDF Network ; September 2015"});
    assert!(approval.approve(network.clone()).await);

    let result = call.await??;
    assert_eq!(result, Some(network));
    assert_eq!(page.relay.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_oversized_sign_transaction_rejected() -> Result<()> {
    let mut harness = Harness::new()?;
    let page = harness.page(2).await?;
    let xdr = Value::String("A".repeat(200_000));

    let bridge = page.bridge.clone();
    let payload = xdr.clone();
    let call = tokio::spawn(async move { bridge.sign_transaction(payload).await });

    let (opened, approval) = harness.approval_window().await?;
    assert_eq!(opened.geometry, WindowGeometry::APPROVAL);
    assert!(opened.url.as_str().contains("storageKey="));
    assert!(opened.url.as_str().len() < 1_000);
    assert_eq!(approval.payload(), Some(&xdr));
    assert!(harness.dispatcher.is_locked());

    assert!(approval.reject().await);
    assert_eq!(call.await??, None);
    assert!(!harness.dispatcher.is_locked());
    assert_eq!(
        harness.host.session_store.get(TRANSACTION_LOCK_KEY).await?,
        Some("false".to_string())
    );
    assert_eq!(harness.host.session_store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_stored_payload_is_consumed_once() -> Result<()> {
    let mut harness = Harness::new()?;
    let page = harness.page(3).await?;

    let bridge = page.bridge.clone();
    let _call = tokio::spawn(async move { bridge.submit_transaction(json!("AAAA")).await });

    let opened = harness.next_window().await?;
    let first = ApprovalWindow::open(harness.dispatcher.clone(), &opened.url).await?;
    assert_eq!(first.payload(), Some(&json!("AAAA")));

    match ApprovalWindow::open(harness.dispatcher.clone(), &opened.url).await {
        Err(Error::PayloadMissing { key }) => assert!(key.as_str().starts_with(StorageKey::PREFIX)),
        Err(e) => bail!("unexpected error: {e}"),
        Ok(_) => bail!("payload read twice"),
    }
    Ok(())
}

#[tokio::test]
async fn test_concurrent_same_type_calls_resolve_once_each() -> Result<()> {
    const CALLS: usize = 8;

    let mut harness = Harness::new()?;
    let first = harness.page(4).await?;
    let second = harness.page(5).await?;

    let mut calls = Vec::new();
    for i in 0..CALLS {
        let bridge = if i % 2 == 0 {
            first.bridge.clone()
        } else {
            second.bridge.clone()
        };
        calls.push(tokio::spawn(async move { bridge.get_address().await }));
    }

    for answer in 0..CALLS {
        let (_, approval) = harness.approval_window().await?;
        assert!(approval.approve(json!(answer)).await);
    }

    let mut answers = Vec::new();
    for call in calls {
        let value = call.await??.context("rejected")?;
        answers.push(value.as_u64().context("numeric answer")?);
    }
    answers.sort_unstable();
    assert_eq!(answers, (0..CALLS as u64).collect::<Vec<_>>());
    assert_eq!(harness.host.windows.created_count(), CALLS);
    assert_eq!(first.relay.pending_count() + second.relay.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_second_approval_is_dropped_until_first_settles() -> Result<()> {
    let mut harness = Harness::new()?;
    let first = harness.page(6).await?;
    let second = harness.page(7).await?;

    let bridge = first.bridge.clone();
    let access = tokio::spawn(async move { bridge.request_access().await });
    let opened = harness.next_window().await?;
    assert!(harness.dispatcher.is_locked());

    let mut dropped = tokio_test::task::spawn(second.bridge.sign_message(json!("hello")));
    assert_pending!(dropped.poll());

    // The relay forwards in order and the dispatcher handles in order, so once
    // this answer arrives the sign request has been dispatched.
    second.bridge.send(RequestKind::IsConnected, None).await?;

    assert_pending!(dropped.poll());
    assert_eq!(harness.host.windows.created_count(), 1);

    harness.host.windows.user_close(opened.window_id);
    assert_eq!(access.await??, None);
    assert!(!harness.dispatcher.is_locked());

    // The lock is free again.
    let bridge = second.bridge.clone();
    let retry = tokio::spawn(async move { bridge.sign_message(json!("hello")).await });
    let (_, approval) = harness.approval_window().await?;
    assert_eq!(approval.payload(), Some(&json!("hello")));
    approval.approve(json!("signature")).await;
    assert_eq!(retry.await??, Some(json!("signature")));
    Ok(())
}

#[tokio::test]
async fn test_closing_window_rejects_in_callers_shape() -> Result<()> {
    let mut harness = Harness::new()?;
    let page = harness.page(8).await?;
    let mut raw = page.window.subscribe();

    let bridge = page.bridge.clone();
    let legacy = tokio::spawn(async move { bridge.legacy_public_address().await });
    let opened = harness.next_window().await?;
    harness.host.windows.user_close(opened.window_id);
    assert_eq!(legacy.await??, None);

    let bridge = page.bridge.clone();
    let current = tokio::spawn(async move { bridge.get_address().await });
    let opened = harness.next_window().await?;
    harness.host.windows.user_close(opened.window_id);
    assert_eq!(current.await??, None);

    let mut shapes = Vec::new();
    while shapes.len() < 2 {
        let message = raw.recv().await.context("page window closed")?;
        let Some(page) = PageMessage::parse(&message.data) else {
            continue;
        };
        if page.source == MessageSource::Response {
            shapes.push(page);
        }
    }

    assert_eq!(shapes[0].kind, "RESPONSE_PUBLIC_ADDRESS");
    assert_eq!(shapes[0].body.get("publicAddress"), Some(&Value::Null));
    assert!(!shapes[0].body.contains_key("result"));

    assert_eq!(shapes[1].kind, "RESPONSE_GET_ADDRESS");
    assert_eq!(shapes[1].body.get("result"), Some(&Value::Null));
    Ok(())
}

#[tokio::test]
async fn test_wallet_failure_reaches_page() -> Result<()> {
    let mut harness = Harness::new()?;
    let page = harness.page(9).await?;

    let bridge = page.bridge.clone();
    let call = tokio::spawn(async move { bridge.submit_transaction(json!("AAAA")).await });
    let (_, approval) = harness.approval_window().await?;
    assert!(
        approval
            .fail(wallet_bridge::ErrorPayload::new("SubmitError", "tx_bad_seq"))
            .await
    );

    match call.await? {
        Err(Error::Wallet { name, message, .. }) => {
            assert_eq!(name, "SubmitError");
            assert_eq!(message, "tx_bad_seq");
        }
        other => bail!("expected wallet error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_is_connected_without_extension_times_out() -> Result<()> {
    init_tracing();
    let window = PageWindow::new("https://dapp.example");
    let bridge = PageBridge::new(window, &WalletConfig::new());

    let started = tokio::time::Instant::now();
    assert!(!bridge.is_connected().await);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(1_100));

    assert!(matches!(bridge.get_address().await, Err(Error::NotInstalled)));
    Ok(())
}

#[tokio::test]
async fn test_is_connected_with_relay_is_immediate() -> Result<()> {
    let harness = Harness::new()?;
    let page = harness.page(10).await?;
    assert!(page.bridge.is_installed().await);

    let response = page.bridge.send(RequestKind::IsConnected, None).await?;
    assert_eq!(response.outcome.result(), Some(&json!({"isConnected": true})));
    Ok(())
}

#[tokio::test]
async fn test_login_and_logout_reach_every_tab() -> Result<()> {
    let harness = Harness::new()?;
    let first = harness.page(11).await?;
    let second = harness.page(12).await?;
    let mut first_events = first.bridge.events();
    let mut second_events = second.bridge.events();

    // Attach signals travel through the event loop.
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.dispatcher.tabs().len() < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await?;

    harness.dispatcher.unlock("correct horse").await;
    for events in [&mut first_events, &mut second_events] {
        assert_eq!(events.next().await.map(|e| e.kind), Some(EventKind::Login));
    }

    second.relay.detach().await;
    harness
        .dispatcher
        .broadcast(&BroadcastEvent::network_changed(json!({"network": "PUBLIC"})))
        .await;
    let event = first_events.next().await.context("event")?;
    assert_eq!(event.kind, EventKind::NetworkChanged);

    harness.dispatcher.lock().await;
    assert_eq!(first_events.next().await.map(|e| e.kind), Some(EventKind::Logout));
    assert!(harness.dispatcher.password().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_background_restart_restores_pending_approval() -> Result<()> {
    let mut harness = Harness::new()?;
    let page = harness.page(13).await?;

    let bridge = page.bridge.clone();
    let call = tokio::spawn(async move { bridge.request_access().await });
    let opened = harness.next_window().await?;
    assert!(harness.host.local_store.contains(APPROVAL_WINDOW_KEY));

    // The old background goes away with its window still open.
    harness.event_loop.abort();

    let revived = BackgroundDispatcher::new(harness.config.clone(), harness.host.background_host())?;
    let restored = revived.restore().await.context("nothing restored")?;
    assert_eq!(restored.window_id, opened.window_id);
    assert!(revived.is_locked());

    let approval = ApprovalWindow::open(revived.clone(), &opened.url).await?;
    assert!(approval.approve(json!(true)).await);
    assert_eq!(call.await??, Some(json!(true)));
    Ok(())
}
