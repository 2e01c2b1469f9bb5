use crate::Error;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The operations of a transit secrets engine used to protect workload tokens.
#[async_trait::async_trait]
pub trait Transit: Send + Sync {
    async fn encrypt(
        &self,
        mount: &str,
        key: &str,
        req: EncryptRequest,
    ) -> Result<EncryptResponse, Error>;

    async fn decrypt(
        &self,
        mount: &str,
        key: &str,
        req: DecryptRequest,
    ) -> Result<DecryptResponse, Error>;
}

/// Body of `POST /v1/{mount}/encrypt/{key}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// Base64-encoded plaintext.
    pub plaintext: String,

    /// Base64-encoded key derivation context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub ciphertext: String,
}

/// Body of `POST /v1/{mount}/decrypt/{key}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub ciphertext: String,

    /// Base64-encoded key derivation context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Base64-encoded plaintext.
    pub plaintext: String,
}

/// Vault wraps the result of every logical operation in a `data` field.
#[derive(Debug, Deserialize)]
pub(crate) struct Secret<T> {
    pub data: T,
}

/// Error bodies returned with non-2xx statuses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Errors {
    #[serde(default)]
    pub errors: Vec<String>,
}

// === impl EncryptRequest ===

impl EncryptRequest {
    pub fn new(plaintext: impl AsRef<[u8]>) -> Self {
        Self {
            plaintext: STANDARD.encode(plaintext),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl AsRef<[u8]>) -> Self {
        self.context = Some(STANDARD.encode(context));
        self
    }
}

// === impl DecryptRequest ===

impl DecryptRequest {
    pub fn new(ciphertext: impl Into<String>) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl AsRef<[u8]>) -> Self {
        self.context = Some(STANDARD.encode(context));
        self
    }
}

// === impl DecryptResponse ===

impl DecryptResponse {
    pub fn new(plaintext: impl AsRef<[u8]>) -> Self {
        Self {
            plaintext: STANDARD.encode(plaintext),
        }
    }

    /// Decodes the plaintext.
    pub fn into_bytes(self) -> Result<Bytes, Error> {
        STANDARD
            .decode(self.plaintext)
            .map(Bytes::from)
            .map_err(Error::Plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_format() {
        let req = EncryptRequest::new("my-auth-token").with_context("hello");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"plaintext": "bXktYXV0aC10b2tlbg==", "context": "aGVsbG8="}),
        );

        let req = DecryptRequest::new("vault:v1:abcd");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"ciphertext": "vault:v1:abcd"}),
        );

        let rsp: Secret<DecryptResponse> = serde_json::from_value(json!({
            "request_id": "b5b3c6ef-5a1f-4bbb-8d1c-5e7d5e0f6c4a",
            "lease_duration": 0,
            "renewable": false,
            "data": {"plaintext": "bXktYXV0aC10b2tlbg=="},
        }))
        .unwrap();
        assert_eq!(rsp.data.into_bytes().unwrap(), "my-auth-token");
    }

    #[test]
    fn invalid_plaintext() {
        let rsp = DecryptResponse {
            plaintext: "not base64!".to_string(),
        };
        assert!(matches!(rsp.into_bytes(), Err(Error::Plaintext(_))));
    }
}
