//! Wallet bridge configuration.
//!
//! Provides a type-safe description of the constants every context shares:
//! the identity tag, the extension id, the approval route, the session
//! duration, the probe timeout and window geometry.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use wallet_bridge::{BusyPolicy, WalletConfig};
//!
//! let config = WalletConfig::new()
//!     .with_app_tag("my-wallet")
//!     .with_extension_id("abcdefghijklmnop")
//!     .with_session_duration(Duration::from_secs(15 * 60))
//!     .with_busy_policy(BusyPolicy::Reject);
//!
//! config.validate()?;
//! ```
//!
//! The same structure deserialises from JSON with durations in
//! milliseconds, so a host can ship it alongside its manifest.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default identity tag carried by every wallet message.
pub const DEFAULT_APP_TAG: &str = "wallet-bridge";

/// Default extension id.
pub const DEFAULT_EXTENSION_ID: &str = "wallet-bridge-extension";

/// Default approval window route, relative to the extension root.
pub const DEFAULT_APPROVAL_ROUTE: &str = "popup.html";

/// Fixed session lifetime from unlock.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(30 * 60);

/// Deadline for `isConnected`/`isInstalled` without a presence marker.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// BusyPolicy
// ============================================================================

/// What the dispatcher does with an approval request that arrives while
/// another approval is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Drop silently. The caller's call never settles.
    #[default]
    Drop,
    /// Answer immediately with a failed response.
    Reject,
}

// ============================================================================
// WindowGeometry
// ============================================================================

/// Size and position of a window opened by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Left offset, host default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<i32>,
    /// Top offset, host default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<i32>,
}

impl WindowGeometry {
    /// Full-size approval window.
    pub const APPROVAL: Self = Self {
        width: 360,
        height: 640,
        left: None,
        top: None,
    };

    /// Near-invisible window for silent probes.
    pub const PROBE: Self = Self {
        width: 1,
        height: 1,
        left: Some(-10_000),
        top: Some(-10_000),
    };

    /// Creates a geometry without an explicit position.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            left: None,
            top: None,
        }
    }

    /// Sets an explicit position.
    #[inline]
    #[must_use]
    pub const fn at(mut self, left: i32, top: i32) -> Self {
        self.left = Some(left);
        self.top = Some(top);
        self
    }
}

// ============================================================================
// WalletConfig
// ============================================================================

/// Configuration shared by the page bridge, content relay and background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletConfig {
    /// Identity tag; messages without it are dropped.
    pub app_tag: String,

    /// Extension id; bus senders with another id are dropped.
    pub extension_id: String,

    /// Approval window route, relative to the extension root.
    pub approval_route: String,

    /// Fixed session lifetime from unlock.
    #[serde(with = "millis")]
    pub session_duration: Duration,

    /// Deadline for connectivity probes.
    #[serde(with = "millis")]
    pub probe_timeout: Duration,

    /// Handling of a second concurrent approval request.
    pub busy_policy: BusyPolicy,

    /// Geometry of approval windows.
    pub approval_geometry: WindowGeometry,

    /// Geometry of probe windows.
    pub probe_geometry: WindowGeometry,
}

// ============================================================================
// Constructors
// ============================================================================

impl WalletConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            app_tag: DEFAULT_APP_TAG.to_string(),
            extension_id: DEFAULT_EXTENSION_ID.to_string(),
            approval_route: DEFAULT_APPROVAL_ROUTE.to_string(),
            session_duration: DEFAULT_SESSION_DURATION,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            busy_policy: BusyPolicy::Drop,
            approval_geometry: WindowGeometry::APPROVAL,
            probe_geometry: WindowGeometry::PROBE,
        }
    }

    /// Parses and validates a JSON configuration.
    ///
    /// Missing fields take their default.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is not valid JSON
    /// - [`Error::Config`] if validation fails
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl WalletConfig {
    /// Sets the identity tag.
    #[inline]
    #[must_use]
    pub fn with_app_tag(mut self, app_tag: impl Into<String>) -> Self {
        self.app_tag = app_tag.into();
        self
    }

    /// Sets the extension id.
    #[inline]
    #[must_use]
    pub fn with_extension_id(mut self, extension_id: impl Into<String>) -> Self {
        self.extension_id = extension_id.into();
        self
    }

    /// Sets the session lifetime.
    #[inline]
    #[must_use]
    pub fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    /// Sets the busy policy.
    #[inline]
    #[must_use]
    pub fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.busy_policy = policy;
        self
    }

    /// Sets the approval window geometry.
    #[inline]
    #[must_use]
    pub fn with_approval_geometry(mut self, geometry: WindowGeometry) -> Self {
        self.approval_geometry = geometry;
        self
    }

    /// Sets the probe window geometry.
    #[inline]
    #[must_use]
    pub fn with_probe_geometry(mut self, geometry: WindowGeometry) -> Self {
        self.probe_geometry = geometry;
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl WalletConfig {
    /// Returns the extension root URL, `chrome-extension://{id}/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the extension id is not a valid host.
    pub fn extension_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!("chrome-extension://{}/", self.extension_id))?)
    }

    /// Returns the absolute approval route URL without parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the route cannot be joined.
    pub fn approval_url(&self) -> Result<Url> {
        Ok(self.extension_url()?.join(&self.approval_route)?)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.app_tag.trim().is_empty() {
            return Err(Error::config("app tag must not be empty"));
        }
        if self.extension_id.is_empty()
            || !self
                .extension_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::config(format!(
                "invalid extension id: {:?}",
                self.extension_id
            )));
        }
        if self.approval_route.is_empty() || self.approval_route.starts_with('/') {
            return Err(Error::config("approval route must be a relative path"));
        }
        if self.session_duration.is_zero() {
            return Err(Error::config("session duration must be greater than zero"));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::config("probe timeout must be greater than zero"));
        }
        for geometry in [self.approval_geometry, self.probe_geometry] {
            if geometry.width == 0 || geometry.height == 0 {
                return Err(Error::config(
                    "Window dimensions must be greater than zero",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Duration Serde
// ============================================================================

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
