//! Round-trip benchmark suite.
//!
//! Measures page → relay → background → relay → page latency over the
//! in-memory host:
//! - Immediate answers (`IS_CONNECTED`) at several concurrency levels
//! - Probe windows answered by an automatic approver
//!
//! Run with: cargo bench --bench round_trip
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use futures_util::future::join_all;
use serde_json::json;
use tokio::runtime::Runtime;

use wallet_bridge::host::memory::MemoryHost;
use wallet_bridge::{
    ApprovalWindow, BackgroundDispatcher, ContentRelay, PageBridge, PageWindow, RequestKind,
    TabId, WalletConfig,
};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const CONCURRENCY: &[usize] = &[1, 16, 128];
const PROBE_BATCHES: &[usize] = &[1, 8];

// ============================================================================
// Setup
// ============================================================================

struct Wired {
    bridge: PageBridge,
    _relay: ContentRelay,
    _host: MemoryHost,
}

/// Wires one tab to a running background with an approver that answers
/// every window as soon as it opens.
async fn wire() -> Wired {
    let config = WalletConfig::new();
    let (host, channels) = MemoryHost::new();
    let dispatcher = BackgroundDispatcher::new(config.clone(), host.background_host())
        .expect("valid config");

    let mut opened = host.windows.subscribe();
    let approver = dispatcher.clone();
    tokio::spawn(async move {
        while let Ok(window) = opened.recv().await {
            if let Ok(approval) = ApprovalWindow::open(approver.clone(), &window.url).await {
                approval.approve(json!({"network": "TESTNET"})).await;
            }
        }
    });
    dispatcher.spawn(channels.inbox, channels.window_events);

    let tab = TabId::new(1).expect("non-zero tab");
    let window: Arc<PageWindow> = PageWindow::new("https://bench.example");
    let bus_rx = host.bus.connect_tab(tab);
    let relay = ContentRelay::attach(&config, tab, window.clone(), host.bus.clone(), bus_rx).await;

    Wired {
        bridge: PageBridge::new(window, &config),
        _relay: relay,
        _host: host,
    }
}

// ============================================================================
// Benchmark: Immediate Round Trip
// ============================================================================

fn bench_immediate(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let wired = rt.block_on(wire());

    let mut group = c.benchmark_group("immediate_round_trip");
    group.measurement_time(Duration::from_secs(10));

    for &concurrency in CONCURRENCY {
        group.bench_with_input(
            BenchmarkId::new("is_connected", concurrency),
            &concurrency,
            |b, &count| {
                b.to_async(&rt).iter(|| async {
                    let calls = (0..count).map(|_| wired.bridge.send(RequestKind::IsConnected, None));
                    for result in join_all(calls).await {
                        result.expect("round trip");
                    }
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: Probe Window Round Trip
// ============================================================================

fn bench_probe(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let wired = rt.block_on(wire());

    let mut group = c.benchmark_group("probe_round_trip");
    group.sample_size(20);

    for &batch in PROBE_BATCHES {
        group.bench_with_input(
            BenchmarkId::new("get_network", batch),
            &batch,
            |b, &count| {
                b.to_async(&rt).iter(|| async {
                    let calls = (0..count).map(|_| wired.bridge.get_network());
                    for result in join_all(calls).await {
                        result.expect("probe answered");
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_immediate, bench_probe);
criterion_main!(benches);
