//! Privileged background context.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `approval` | Approval-window side: route parsing, payload, single reply |
//! | `dispatcher` | Routing node, transaction lock, event loop |
//! | `payload` | Consume-once large-payload handoff |
//! | `popup` | Approval slot and probe window state |
//! | `rejection` | Reject-on-close mapping |
//! | `session` | Password lifetime |
//! | `tabs` | Live-tab registry and event fan-out |

// ============================================================================
// Submodules
// ============================================================================

/// Approval-window side of the handshake.
pub mod approval;

/// Background dispatcher.
pub mod dispatcher;

/// Large-payload handoff.
pub mod payload;

/// Window state machine.
pub mod popup;

/// Reject-on-close mapping.
pub mod rejection;

/// Session lifetime.
pub mod session;

/// Tab registry.
pub mod tabs;

// ============================================================================
// Re-exports
// ============================================================================

pub use approval::ApprovalWindow;
pub use dispatcher::{BackgroundDispatcher, Dispatch, TRANSACTION_LOCK_KEY};
pub use payload::PayloadStore;
pub use popup::{
    APPROVAL_WINDOW_KEY, ApprovalRoute, PendingWindowState, PopupWindowManager, RoutePayload,
    WindowOpening,
};
pub use rejection::build_rejection;
pub use session::SessionManager;
pub use tabs::TabRegistry;
