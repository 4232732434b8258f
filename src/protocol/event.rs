//! Asynchronous broadcast events.
//!
//! Events are pushed from the background to every live tab and republished
//! into the page unconditionally. They carry no ordering guarantee relative
//! to request/response traffic.
//!
//! | Kind | Wire type |
//! |------|-----------|
//! | `NetworkChanged` | `EVENT_NETWORK_CHANGED` |
//! | `WalletChanged` | `EVENT_WALLET_CHANGED` |
//! | `Login` | `EVENT_LOGIN` |
//! | `Logout` | `EVENT_LOGOUT` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// EventKind
// ============================================================================

/// Broadcast event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Active network switched.
    #[serde(rename = "EVENT_NETWORK_CHANGED")]
    NetworkChanged,
    /// Active account switched.
    #[serde(rename = "EVENT_WALLET_CHANGED")]
    WalletChanged,
    /// Wallet unlocked.
    #[serde(rename = "EVENT_LOGIN")]
    Login,
    /// Wallet locked.
    #[serde(rename = "EVENT_LOGOUT")]
    Logout,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [Self; 4] = [
        Self::NetworkChanged,
        Self::WalletChanged,
        Self::Login,
        Self::Logout,
    ];

    /// Returns the wire type string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkChanged => "EVENT_NETWORK_CHANGED",
            Self::WalletChanged => "EVENT_WALLET_CHANGED",
            Self::Login => "EVENT_LOGIN",
            Self::Logout => "EVENT_LOGOUT",
        }
    }

    /// Parses a wire type string.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BroadcastEvent
// ============================================================================

/// A broadcast event with optional detail.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastEvent {
    /// Event type.
    pub kind: EventKind,
    /// Event-specific data.
    pub detail: Option<Value>,
}

impl BroadcastEvent {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(kind: EventKind, detail: Option<Value>) -> Self {
        Self { kind, detail }
    }

    /// Network switched to `network`.
    #[inline]
    #[must_use]
    pub fn network_changed(network: Value) -> Self {
        Self::new(EventKind::NetworkChanged, Some(network))
    }

    /// Active account switched to `wallet`.
    #[inline]
    #[must_use]
    pub fn wallet_changed(wallet: Value) -> Self {
        Self::new(EventKind::WalletChanged, Some(wallet))
    }

    /// Wallet unlocked.
    #[inline]
    #[must_use]
    pub fn login() -> Self {
        Self::new(EventKind::Login, None)
    }

    /// Wallet locked.
    #[inline]
    #[must_use]
    pub fn logout() -> Self {
        Self::new(EventKind::Logout, None)
    }
}

// ============================================================================
// Tests
// ============================================================================
