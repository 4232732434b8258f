//! Request and response catalogue.
//!
//! Every wallet operation a page can ask for is a [`RequestKind`]. Current
//! and deprecated wire shapes coexist in the same catalogue; the content
//! relay's adapter is the only place that cares which is which.
//!
//! # Catalogue
//!
//! | Kind | Wire type | Version | Class | Payload |
//! |------|-----------|---------|-------|---------|
//! | `GetAddress` | `REQUEST_GET_ADDRESS` | current | probe | – |
//! | `GetNetwork` | `REQUEST_GET_NETWORK` | current | probe | – |
//! | `GetPublicKey` | `REQUEST_GET_PUBLIC_KEY` | current | probe | – |
//! | `IsConnected` | `REQUEST_IS_CONNECTED` | current | immediate | – |
//! | `RequestAccess` | `REQUEST_ACCESS` | current | approval | – |
//! | `SignMessage` | `REQUEST_SIGN_MESSAGE` | current | approval | inline |
//! | `SignTransaction` | `REQUEST_SIGN_TRANSACTION` | current | approval | large |
//! | `SubmitTransaction` | `REQUEST_SUBMIT_TRANSACTION` | current | approval | large |
//! | `LegacyPublicAddress` | `REQUEST_PUBLIC_ADDRESS` | legacy | probe | – |
//! | `LegacyNetwork` | `REQUEST_NETWORK` | legacy | probe | – |
//! | `LegacySignTransaction` | `REQUEST_SIGN_TX` | legacy | approval | large |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// ApiVersion
// ============================================================================

/// Which generation of the page API a kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    /// Standard `{result, error}` envelope.
    Current,
    /// Deprecated shape with a bare, kind-specific result field.
    Legacy,
}

// ============================================================================
// RequestClass
// ============================================================================

/// How the background handles a request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// Answered by the background itself, no window.
    Immediate,
    /// Silent read answered through a minimal window. Bypasses the
    /// transaction lock.
    Probe,
    /// Needs a human decision. Serialised by the transaction lock.
    Approval,
}

// ============================================================================
// RequestKind
// ============================================================================

/// Request types a page may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Read the active account address.
    #[serde(rename = "REQUEST_GET_ADDRESS")]
    GetAddress,
    /// Read the active network.
    #[serde(rename = "REQUEST_GET_NETWORK")]
    GetNetwork,
    /// Read the active account public key.
    #[serde(rename = "REQUEST_GET_PUBLIC_KEY")]
    GetPublicKey,
    /// Liveness check answered by the background.
    #[serde(rename = "REQUEST_IS_CONNECTED")]
    IsConnected,
    /// Ask the user to allow this origin.
    #[serde(rename = "REQUEST_ACCESS")]
    RequestAccess,
    /// Sign an arbitrary message.
    #[serde(rename = "REQUEST_SIGN_MESSAGE")]
    SignMessage,
    /// Sign a transaction without submitting it.
    #[serde(rename = "REQUEST_SIGN_TRANSACTION")]
    SignTransaction,
    /// Sign and submit a transaction.
    #[serde(rename = "REQUEST_SUBMIT_TRANSACTION")]
    SubmitTransaction,
    /// Deprecated address read.
    #[serde(rename = "REQUEST_PUBLIC_ADDRESS")]
    LegacyPublicAddress,
    /// Deprecated network read.
    #[serde(rename = "REQUEST_NETWORK")]
    LegacyNetwork,
    /// Deprecated transaction signing.
    #[serde(rename = "REQUEST_SIGN_TX")]
    LegacySignTransaction,
}

impl RequestKind {
    /// Every request kind in the catalogue.
    pub const ALL: [Self; 11] = [
        Self::GetAddress,
        Self::GetNetwork,
        Self::GetPublicKey,
        Self::IsConnected,
        Self::RequestAccess,
        Self::SignMessage,
        Self::SignTransaction,
        Self::SubmitTransaction,
        Self::LegacyPublicAddress,
        Self::LegacyNetwork,
        Self::LegacySignTransaction,
    ];

    /// Returns the wire type string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetAddress => "REQUEST_GET_ADDRESS",
            Self::GetNetwork => "REQUEST_GET_NETWORK",
            Self::GetPublicKey => "REQUEST_GET_PUBLIC_KEY",
            Self::IsConnected => "REQUEST_IS_CONNECTED",
            Self::RequestAccess => "REQUEST_ACCESS",
            Self::SignMessage => "REQUEST_SIGN_MESSAGE",
            Self::SignTransaction => "REQUEST_SIGN_TRANSACTION",
            Self::SubmitTransaction => "REQUEST_SUBMIT_TRANSACTION",
            Self::LegacyPublicAddress => "REQUEST_PUBLIC_ADDRESS",
            Self::LegacyNetwork => "REQUEST_NETWORK",
            Self::LegacySignTransaction => "REQUEST_SIGN_TX",
        }
    }

    /// Parses a wire type string.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Returns the paired response kind.
    #[must_use]
    pub const fn response(self) -> ResponseKind {
        match self {
            Self::GetAddress => ResponseKind::GetAddress,
            Self::GetNetwork => ResponseKind::GetNetwork,
            Self::GetPublicKey => ResponseKind::GetPublicKey,
            Self::IsConnected => ResponseKind::IsConnected,
            Self::RequestAccess => ResponseKind::RequestAccess,
            Self::SignMessage => ResponseKind::SignMessage,
            Self::SignTransaction => ResponseKind::SignTransaction,
            Self::SubmitTransaction => ResponseKind::SubmitTransaction,
            Self::LegacyPublicAddress => ResponseKind::LegacyPublicAddress,
            Self::LegacyNetwork => ResponseKind::LegacyNetwork,
            Self::LegacySignTransaction => ResponseKind::LegacySignTransaction,
        }
    }

    /// Returns how the background handles this kind.
    #[must_use]
    pub const fn class(self) -> RequestClass {
        match self {
            Self::IsConnected => RequestClass::Immediate,
            Self::GetAddress
            | Self::GetNetwork
            | Self::GetPublicKey
            | Self::LegacyPublicAddress
            | Self::LegacyNetwork => RequestClass::Probe,
            Self::RequestAccess
            | Self::SignMessage
            | Self::SignTransaction
            | Self::SubmitTransaction
            | Self::LegacySignTransaction => RequestClass::Approval,
        }
    }

    /// Returns the API generation.
    #[inline]
    #[must_use]
    pub const fn version(self) -> ApiVersion {
        self.response().version()
    }

    /// Returns `true` if this kind takes the transaction lock.
    #[inline]
    #[must_use]
    pub const fn requires_approval(self) -> bool {
        matches!(self.class(), RequestClass::Approval)
    }

    /// Returns `true` if the payload travels through the session store
    /// instead of the approval route.
    #[must_use]
    pub const fn is_large(self) -> bool {
        matches!(
            self,
            Self::SignTransaction | Self::SubmitTransaction | Self::LegacySignTransaction
        )
    }

    /// Returns `true` if a request without payload is malformed.
    #[must_use]
    pub const fn requires_payload(self) -> bool {
        matches!(
            self,
            Self::SignMessage
                | Self::SignTransaction
                | Self::SubmitTransaction
                | Self::LegacySignTransaction
        )
    }

    /// Page-side field carrying the payload of a legacy request.
    #[must_use]
    pub const fn legacy_payload_field(self) -> Option<&'static str> {
        match self {
            Self::LegacySignTransaction => Some("transactionXdr"),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ResponseKind
// ============================================================================

/// Response types, 1:1 with [`RequestKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    /// Answer to [`RequestKind::GetAddress`].
    #[serde(rename = "RESPONSE_GET_ADDRESS")]
    GetAddress,
    /// Answer to [`RequestKind::GetNetwork`].
    #[serde(rename = "RESPONSE_GET_NETWORK")]
    GetNetwork,
    /// Answer to [`RequestKind::GetPublicKey`].
    #[serde(rename = "RESPONSE_GET_PUBLIC_KEY")]
    GetPublicKey,
    /// Answer to [`RequestKind::IsConnected`].
    #[serde(rename = "RESPONSE_IS_CONNECTED")]
    IsConnected,
    /// Answer to [`RequestKind::RequestAccess`].
    #[serde(rename = "RESPONSE_ACCESS")]
    RequestAccess,
    /// Answer to [`RequestKind::SignMessage`].
    #[serde(rename = "RESPONSE_SIGN_MESSAGE")]
    SignMessage,
    /// Answer to [`RequestKind::SignTransaction`].
    #[serde(rename = "RESPONSE_SIGN_TRANSACTION")]
    SignTransaction,
    /// Answer to [`RequestKind::SubmitTransaction`].
    #[serde(rename = "RESPONSE_SUBMIT_TRANSACTION")]
    SubmitTransaction,
    /// Answer to [`RequestKind::LegacyPublicAddress`].
    #[serde(rename = "RESPONSE_PUBLIC_ADDRESS")]
    LegacyPublicAddress,
    /// Answer to [`RequestKind::LegacyNetwork`].
    #[serde(rename = "RESPONSE_NETWORK")]
    LegacyNetwork,
    /// Answer to [`RequestKind::LegacySignTransaction`].
    #[serde(rename = "RESPONSE_SIGN_TX")]
    LegacySignTransaction,
}

impl ResponseKind {
    /// Returns the wire type string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetAddress => "RESPONSE_GET_ADDRESS",
            Self::GetNetwork => "RESPONSE_GET_NETWORK",
            Self::GetPublicKey => "RESPONSE_GET_PUBLIC_KEY",
            Self::IsConnected => "RESPONSE_IS_CONNECTED",
            Self::RequestAccess => "RESPONSE_ACCESS",
            Self::SignMessage => "RESPONSE_SIGN_MESSAGE",
            Self::SignTransaction => "RESPONSE_SIGN_TRANSACTION",
            Self::SubmitTransaction => "RESPONSE_SUBMIT_TRANSACTION",
            Self::LegacyPublicAddress => "RESPONSE_PUBLIC_ADDRESS",
            Self::LegacyNetwork => "RESPONSE_NETWORK",
            Self::LegacySignTransaction => "RESPONSE_SIGN_TX",
        }
    }

    /// Parses a wire type string.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        RequestKind::ALL
            .into_iter()
            .map(RequestKind::response)
            .find(|kind| kind.as_str() == value)
    }

    /// Returns the API generation.
    #[must_use]
    pub const fn version(self) -> ApiVersion {
        match self.legacy_field() {
            Some(_) => ApiVersion::Legacy,
            None => ApiVersion::Current,
        }
    }

    /// Bare result field used by the deprecated shape.
    #[must_use]
    pub const fn legacy_field(self) -> Option<&'static str> {
        match self {
            Self::LegacyPublicAddress => Some("publicAddress"),
            Self::LegacyNetwork => Some("network"),
            Self::LegacySignTransaction => Some("signedTransaction"),
            _ => None,
        }
    }

    /// Page-side field that carries the result for this kind.
    #[inline]
    #[must_use]
    pub const fn result_field(self) -> &'static str {
        match self.legacy_field() {
            Some(field) => field,
            None => "result",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_wire_names_match_serde() {
        for kind in RequestKind::ALL {
            let json = serde_json::to_string(&kind).expect("serialize");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));

            let response = serde_json::to_string(&kind.response()).expect("serialize");
            assert_eq!(response, format!("\"{}\"", kind.response().as_str()));
        }
    }

    #[test]
    fn test_from_wire() {
        assert_eq!(
            RequestKind::from_wire("REQUEST_GET_NETWORK"),
            Some(RequestKind::GetNetwork)
        );
        assert_eq!(
            ResponseKind::from_wire("RESPONSE_PUBLIC_ADDRESS"),
            Some(ResponseKind::LegacyPublicAddress)
        );
        assert_eq!(RequestKind::from_wire("REQUEST_DELETE_WALLET"), None);
    }

    #[test]
    fn test_legacy_fields() {
        assert_eq!(
            ResponseKind::LegacyPublicAddress.result_field(),
            "publicAddress"
        );
        assert_eq!(ResponseKind::GetAddress.result_field(), "result");
        assert_eq!(RequestKind::LegacyNetwork.version(), ApiVersion::Legacy);
        assert_eq!(RequestKind::GetNetwork.version(), ApiVersion::Current);
    }

    #[test]
    fn test_probe_kinds_skip_lock() {
        assert!(!RequestKind::GetNetwork.requires_approval());
        assert!(!RequestKind::IsConnected.requires_approval());
        assert!(RequestKind::SubmitTransaction.requires_approval());
    }

    proptest! {
        #[test]
        fn large_kinds_always_need_approval_and_payload(index in 0usize..RequestKind::ALL.len()) {
            let kind = RequestKind::ALL[index];
            if kind.is_large() {
                prop_assert!(kind.requires_approval());
                prop_assert!(kind.requires_payload());
            }
        }

        #[test]
        fn response_pairing_is_injective(a in 0usize..11, b in 0usize..11) {
            let (ka, kb) = (RequestKind::ALL[a], RequestKind::ALL[b]);
            prop_assert_eq!(ka == kb, ka.response() == kb.response());
            prop_assert_eq!(ka.version(), ka.response().version());
        }
    }
}
