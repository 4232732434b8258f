//! Session and password lifetime.
//!
//! The password lives only in memory, zeroized on drop, for a fixed
//! non-sliding duration from unlock.
//!
//! ```text
//! Locked --start(password)--> Unlocked(expires_at) --timeout | end--> Locked
//! ```
//!
//! Expiry is enforced twice: a timer task ends the session at the deadline,
//! and [`SessionManager::password`] re-checks the deadline on every read so
//! a suspended or late timer never extends the session.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::host::KeepAlive;

// ============================================================================
// Types
// ============================================================================

/// Mutable session state.
#[derive(Default)]
struct SessionState {
    password: Option<Zeroizing<String>>,
    expires_at: Option<Instant>,
    /// Bumped on every start and end; stale timers compare against it.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    /// Whether the keep-alive was armed for the current session.
    armed: bool,
}

struct SessionInner {
    duration: Duration,
    keep_alive: Arc<dyn KeepAlive>,
    state: Mutex<SessionState>,
}

// ============================================================================
// SessionManager
// ============================================================================

/// Owner of the unlocked session.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Creates a locked session manager.
    #[must_use]
    pub fn new(duration: Duration, keep_alive: Arc<dyn KeepAlive>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                duration,
                keep_alive,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Starts a session, ending any existing one first.
    ///
    /// Returns the deadline.
    pub async fn start(&self, password: impl Into<String>) -> Instant {
        self.end().await;

        let expires_at = Instant::now() + self.inner.duration;
        let generation = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.password = Some(Zeroizing::new(password.into()));
            state.expires_at = Some(expires_at);
            state.generation
        };

        let armed = match self.inner.keep_alive.arm().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to arm keep-alive");
                false
            }
        };

        let weak = Arc::downgrade(&self.inner);
        let timer = tokio::spawn(Self::expiry_timer(weak, generation, expires_at));

        let orphaned = {
            let mut state = self.inner.state.lock();
            if state.generation == generation {
                state.armed |= armed;
                state.timer = Some(timer);
                false
            } else {
                timer.abort();
                // Ended while arming. A newer session inherits the arm;
                // otherwise nobody is left to disarm it.
                if state.password.is_some() {
                    state.armed |= armed;
                    false
                } else {
                    armed
                }
            }
        };
        if orphaned {
            debug!("Session ended while arming keep-alive");
            self.inner.keep_alive.disarm().await;
        }

        info!(duration_ms = self.inner.duration.as_millis() as u64, "Session started");
        expires_at
    }

    /// Ends the session. Idempotent.
    pub async fn end(&self) {
        let (timer, was_armed, was_unlocked) = {
            let mut state = self.inner.state.lock();
            let was_unlocked = state.password.take().is_some();
            state.expires_at = None;
            state.generation += 1;
            (
                state.timer.take(),
                std::mem::take(&mut state.armed),
                was_unlocked,
            )
        };

        if let Some(timer) = timer {
            timer.abort();
        }
        if was_armed {
            self.inner.keep_alive.disarm().await;
        }
        if was_unlocked {
            info!("Session ended");
        }
    }

    /// Returns the password while the session is live.
    ///
    /// Checks the deadline on every call; an elapsed session is ended here
    /// even if its timer has not fired.
    pub async fn password(&self) -> Option<Zeroizing<String>> {
        {
            let state = self.inner.state.lock();
            match state.expires_at {
                Some(at) if Instant::now() < at => return state.password.clone(),
                Some(_) => {}
                None => return None,
            }
        }

        debug!("Session deadline passed before timer fired");
        self.end().await;
        None
    }

    /// Returns `true` while unlocked and before the deadline.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        let state = self.inner.state.lock();
        state.password.is_some() && state.expires_at.is_some_and(|at| Instant::now() < at)
    }

    /// Returns the deadline of the current session.
    #[inline]
    #[must_use]
    pub fn expires_at(&self) -> Option<Instant> {
        self.inner.state.lock().expires_at
    }

    /// Returns the fixed session duration.
    #[inline]
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    /// Timer task ending the session at its deadline.
    async fn expiry_timer(inner: Weak<SessionInner>, generation: u64, expires_at: Instant) {
        sleep_until(expires_at).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };

        let was_armed = {
            let mut state = inner.state.lock();
            if state.generation != generation {
                return;
            }
            state.password = None;
            state.expires_at = None;
            state.generation += 1;
            // Our own handle; dropping it detaches.
            state.timer = None;
            std::mem::take(&mut state.armed)
        };

        if was_armed {
            inner.keep_alive.disarm().await;
        }
        info!("Session expired");
    }
}

// ============================================================================
// Tests
// ============================================================================
