//! Error types for the wallet bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wallet_bridge::{Error, Result};
//!
//! async fn example(bridge: &PageBridge) -> Result<()> {
//!     let network = bridge.get_network().await?;
//!     println!("{network:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Protocol | [`Error::NotInstalled`], [`Error::BadRequest`], [`Error::UnknownKind`], [`Error::Protocol`], [`Error::Busy`] |
//! | Wallet | [`Error::Wallet`], [`Error::PayloadMissing`] |
//! | Host | [`Error::MessageBus`], [`Error::Window`], [`Error::Storage`], [`Error::TabNotFound`], [`Error::KeepAlive`] |
//! | Execution | [`Error::Timeout`], [`Error::ChannelClosed`] |
//! | External | [`Error::Json`], [`Error::Url`] |
//!
//! Errors never cross a context boundary as Rust values. At each boundary
//! they are folded into an [`ErrorPayload`](crate::protocol::ErrorPayload)
//! and rebuilt as [`Error::Wallet`] on the page side.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::{StorageKey, TabId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when [`WalletConfig`](crate::WalletConfig) validation fails.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The extension presence marker is absent from the page.
    ///
    /// Detected by the page bridge before any round-trip.
    #[error("Wallet extension is not installed")]
    NotInstalled,

    /// Malformed or incomplete request.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Description of what is missing or malformed.
        message: String,
    },

    /// Request or response type outside the catalogue.
    #[error("Unknown message type: {kind}")]
    UnknownKind {
        /// The unrecognised wire type.
        kind: String,
    },

    /// Protocol violation or unexpected message shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Another approval is already in flight.
    #[error("Another approval request is already pending")]
    Busy,

    // ========================================================================
    // Wallet Errors
    // ========================================================================
    /// Failure reported by the wallet through a response envelope.
    ///
    /// Rebuilt on the page side from an error payload.
    #[error("{name}: {message}")]
    Wallet {
        /// Error class name.
        name: String,
        /// Human readable message.
        message: String,
        /// Stack captured where the error was raised, if any.
        stack: Option<String>,
    },

    /// Stored payload was already consumed or never written.
    #[error("No stored payload under key {key}")]
    PayloadMissing {
        /// Key the approval window tried to read.
        key: StorageKey,
    },

    // ========================================================================
    // Host Errors
    // ========================================================================
    /// Host message bus failure.
    #[error("Message bus error: {message}")]
    MessageBus {
        /// Description of the bus failure.
        message: String,
    },

    /// Window creation, focus or close failure.
    #[error("Window error: {message}")]
    Window {
        /// Description of the window failure.
        message: String,
    },

    /// Session or local store failure.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Tab has no attached relay.
    #[error("Tab not found: {tab_id}")]
    TabNotFound {
        /// The missing tab ID.
        tab_id: TabId,
    },

    /// Keep-alive helper context could not be armed.
    #[error("Keep-alive error: {message}")]
    KeepAlive {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Approval route URL error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a bad request error.
    #[inline]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates an unknown kind error.
    #[inline]
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a wallet error from its transported parts.
    #[inline]
    pub fn wallet(
        name: impl Into<String>,
        message: impl Into<String>,
        stack: Option<String>,
    ) -> Self {
        Self::Wallet {
            name: name.into(),
            message: message.into(),
            stack,
        }
    }

    /// Creates a payload missing error.
    #[inline]
    pub fn payload_missing(key: StorageKey) -> Self {
        Self::PayloadMissing { key }
    }

    /// Creates a message bus error.
    #[inline]
    pub fn message_bus(message: impl Into<String>) -> Self {
        Self::MessageBus {
            message: message.into(),
        }
    }

    /// Creates a window error.
    #[inline]
    pub fn window(message: impl Into<String>) -> Self {
        Self::Window {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    #[inline]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a tab not found error.
    #[inline]
    pub fn tab_not_found(tab_id: TabId) -> Self {
        Self::TabNotFound { tab_id }
    }

    /// Creates a keep-alive error.
    #[inline]
    pub fn keep_alive(message: impl Into<String>) -> Self {
        Self::KeepAlive {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the failure came from the host runtime.
    ///
    /// These are logged and converted into a failed response envelope.
    #[inline]
    #[must_use]
    pub fn is_host_error(&self) -> bool {
        matches!(
            self,
            Self::MessageBus { .. }
                | Self::Window { .. }
                | Self::Storage { .. }
                | Self::TabNotFound { .. }
                | Self::KeepAlive { .. }
        )
    }

    /// Returns `true` if the request itself was at fault.
    #[inline]
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::BadRequest { .. } | Self::UnknownKind { .. } | Self::PayloadMissing { .. }
        )
    }

    /// Class name used when this error is carried in an error payload.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::NotInstalled => "NotInstalledError",
            Self::BadRequest { .. } | Self::UnknownKind { .. } => "BadRequestError",
            Self::Protocol { .. } => "ProtocolError",
            Self::Busy => "BusyError",
            Self::Wallet { name, .. } => name.as_str(),
            Self::PayloadMissing { .. } => "PayloadMissingError",
            Self::MessageBus { .. } => "MessageBusError",
            Self::Window { .. } => "WindowError",
            Self::Storage { .. } => "StorageError",
            Self::TabNotFound { .. } => "TabNotFoundError",
            Self::KeepAlive { .. } => "KeepAliveError",
            Self::Timeout { .. } => "TimeoutError",
            Self::ChannelClosed(_) => "ChannelClosedError",
            Self::Json(_) => "SerializationError",
            Self::Url(_) => "UrlError",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
