//! Decryption of workload credentials through Vault's transit secrets engine.
//!
//! Workload tokens are stored encrypted under a derived transit key. The derivation context is
//! supplied per request, so a ciphertext only decrypts for the context it was issued with.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod api;
mod client;
mod intermediary;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use self::{
    api::{DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, Transit},
    client::HttpTransit,
    intermediary::{chain_vault_transit, VaultTransitIntermediary, VaultTransitTransform},
};
use http::StatusCode;

/// Errors returned by a transit engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vault: {status}: {}", .errors.join("; "))]
    Api {
        status: StatusCode,
        errors: Vec<String>,
    },

    #[error("vault: invalid address {0:?}")]
    InvalidAddress(String),

    #[error("vault: failed to configure TLS: {0}")]
    Tls(#[source] rustls::Error),

    #[error("vault: failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("vault: failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("vault: request failed: {0}")]
    Http(#[source] hyper_util::client::legacy::Error),

    #[error("vault: failed to read response: {0}")]
    Body(#[source] hyper::Error),

    #[error("vault: invalid response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("vault: ciphertext is not valid UTF-8: {0}")]
    Ciphertext(#[source] std::str::Utf8Error),

    #[error("vault: plaintext is not valid base64: {0}")]
    Plaintext(#[source] base64::DecodeError),
}

// === impl Error ===

impl Error {
    /// Returns true if the engine may succeed when the request is repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => matches!(
                *status,
                StatusCode::TOO_MANY_REQUESTS
                    | StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ),
            Self::Http(e) => e.is_connect(),
            _ => false,
        }
    }

    #[cfg(any(test, feature = "test-util"))]
    pub(crate) fn api(status: StatusCode, error: impl Into<String>) -> Self {
        Self::Api {
            status,
            errors: vec![error.into()],
        }
    }
}

impl From<Error> for relay_metadata_auth_core::Error {
    fn from(error: Error) -> Self {
        if error.is_transient() {
            Self::transient(error)
        } else {
            Self::transport(error)
        }
    }
}
