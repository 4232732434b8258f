//! Wallet protocol message types.
//!
//! This module defines the messages exchanged between the page, the content
//! relay, the background dispatcher and the approval window.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `RequestEnvelope` | Page → Background | Wallet operation request |
//! | `ResponseEnvelope` | Background → Page | Terminal outcome of a request |
//! | `BroadcastEvent` | Background → Page | Network/wallet/login/logout notification |
//! | `BusSignal` | Relay → Background | Relay attach/detach |
//!
//! # Type Naming
//!
//! Request types are `REQUEST_*`, responses `RESPONSE_*`, events `EVENT_*`.
//! Deprecated request types stay in the same catalogue.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `adapter` | Current/legacy page shapes ↔ canonical envelopes |
//! | `envelope` | Canonical request/response envelopes |
//! | `event` | Broadcast event types |
//! | `kind` | Request/response catalogue |
//! | `wire` | Page window and host bus framing |

// ============================================================================
// Submodules
// ============================================================================

/// Version-aware page adapter.
pub mod adapter;

/// Canonical envelopes.
pub mod envelope;

/// Broadcast event types.
pub mod event;

/// Request/response catalogue.
pub mod kind;

/// Page window and host bus framing.
pub mod wire;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{ErrorPayload, Outcome, RequestEnvelope, ResponseEnvelope};
pub use event::{BroadcastEvent, EventKind};
pub use kind::{ApiVersion, RequestClass, RequestKind, ResponseKind};
pub use wire::{
    BusEvent, BusMessage, BusRequest, BusResponse, BusResponsePayload, BusSignal, MessageSource,
    PageMessage, ResponseStatus, SignalKind,
};
