//! Wallet bridge - cross-context request orchestration for extension wallets.
//!
//! This library implements the non-UI core of a browser-extension wallet:
//! the protocol that lets untrusted pages request privileged operations
//! (read address, read network, sign, submit) from a background process
//! without ever touching secret material.
//!
//! # Architecture
//!
//! A call crosses four contexts and comes back:
//!
//! ```text
//! page (PageBridge) -> content relay (ContentRelay) -> background (BackgroundDispatcher)
//!   -> approval window (ApprovalWindow) -> background -> content relay -> page
//! ```
//!
//! Key design principles:
//!
//! - Exactly one response per correlation id, even with many concurrent calls
//! - One human-facing approval window at a time; silent probes overlap freely
//! - A window closed without an answer settles its call with a rejection
//! - Oversized payloads travel through the session store, consumed once
//! - Every host capability sits behind a trait in [`host`]
//!
//! # Quick Start
//!
//! ```ignore
//! use wallet_bridge::host::memory::MemoryHost;
//! use wallet_bridge::{BackgroundDispatcher, ContentRelay, PageBridge, PageWindow, WalletConfig};
//!
//! #[tokio::main]
//! async fn main() -> wallet_bridge::Result<()> {
//!     let config = WalletConfig::new();
//!     let (host, channels) = MemoryHost::new();
//!
//!     let dispatcher = BackgroundDispatcher::new(config.clone(), host.background_host())?;
//!     dispatcher.spawn(channels.inbox, channels.window_events);
//!
//!     let tab = wallet_bridge::TabId::new(1).expect("non-zero");
//!     let window = PageWindow::new("https://dapp.example");
//!     let bus_rx = host.bus.connect_tab(tab);
//!     let _relay = ContentRelay::attach(&config, tab, window.clone(), host.bus.clone(), bus_rx).await;
//!
//!     let bridge = PageBridge::new(window, &config);
//!     let network = bridge.get_network().await?;
//!     println!("network: {network:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`background`] | Dispatcher, window state, session, tabs, approval window |
//! | [`config`] | Shared configuration |
//! | [`content`] | Page ↔ background relay |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Host runtime traits and in-memory implementations |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`page`] | Page-side API and window channel |
//! | [`protocol`] | Envelopes, catalogue, wire framing, version adapter |

// ============================================================================
// Modules
// ============================================================================

/// Privileged background context.
///
/// - [`BackgroundDispatcher`] - routing node and event loop
/// - [`ApprovalWindow`] - the window side of an approval
pub mod background;

/// Configuration shared by every context.
pub mod config;

/// Content relay.
pub mod content;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Host runtime abstractions.
pub mod host;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Page context.
pub mod page;

/// Wallet protocol message types.
pub mod protocol;

// ============================================================================
// Re-exports
// ============================================================================

// Background types
pub use background::{
    ApprovalWindow, BackgroundDispatcher, Dispatch, PendingWindowState, PopupWindowManager,
    SessionManager, TabRegistry,
};

// Configuration types
pub use config::{BusyPolicy, WalletConfig, WindowGeometry};

// Context types
pub use content::ContentRelay;
pub use page::{PageBridge, PageWindow};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, StorageKey, TabId, WindowId};

// Protocol types
pub use protocol::{
    BroadcastEvent, ErrorPayload, EventKind, Outcome, RequestEnvelope, RequestKind,
    ResponseEnvelope, ResponseKind,
};
