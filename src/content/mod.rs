//! Content-script context.
//!
//! The relay is the only component that sees both the page window and the
//! host message bus.

/// Page ↔ background relay.
pub mod relay;

pub use relay::ContentRelay;
