//! Untrusted page context.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | Page-side wallet API and event listener |
//! | `window` | Same-origin page window message channel |

/// Page-side wallet API.
pub mod bridge;

/// Page window message channel.
pub mod window;

pub use bridge::{EventListener, PageBridge};
pub use window::{PageWindow, WindowMessage};
