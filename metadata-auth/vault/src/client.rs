use crate::{
    api::{Errors, Secret},
    DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, Error, Transit,
};
use bytes::Bytes;
use http::{header, Method, Request};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use tracing::{debug, instrument};

type Body = Full<Bytes>;

/// A [`Transit`] engine reached over Vault's HTTP API.
#[derive(Clone)]
pub struct HttpTransit {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    addr: String,
    token: String,
    namespace: Option<String>,
}

// === impl HttpTransit ===

impl HttpTransit {
    /// Creates a client for the Vault server at `addr` (e.g. `https://vault:8200`), authenticating
    /// with `token`.
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Result<Self, Error> {
        let addr = addr.into().trim_end_matches('/').to_string();
        match addr.parse::<http::Uri>() {
            Ok(uri) if uri.scheme().is_some() && uri.host().is_some() => {}
            _ => return Err(Error::InvalidAddress(addr)),
        }

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::aws_lc_rs::default_provider())
            .map_err(Error::Tls)?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            addr,
            token: token.into(),
            namespace: None,
        })
    }

    /// Scopes requests to a Vault Enterprise namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    async fn write<Req, Rsp>(&self, path: &str, body: &Req) -> Result<Rsp, Error>
    where
        Req: Serialize,
        Rsp: DeserializeOwned,
    {
        let body = serde_json::to_vec(body).map_err(Error::Encode)?;
        let mut req = Request::builder()
            .method(Method::POST)
            .uri(format!("{}/v1/{path}", self.addr))
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Vault-Token", &self.token);
        if let Some(ns) = &self.namespace {
            req = req.header("X-Vault-Namespace", ns);
        }
        let req = req.body(Full::new(Bytes::from(body)))?;

        let rsp = self.client.request(req).await.map_err(Error::Http)?;
        let status = rsp.status();
        let body = rsp
            .into_body()
            .collect()
            .await
            .map_err(Error::Body)?
            .to_bytes();
        debug!(%status, bytes = body.len(), "Response");

        if !status.is_success() {
            let Errors { errors } = serde_json::from_slice(&body).unwrap_or_default();
            return Err(Error::Api { status, errors });
        }
        let Secret { data } = serde_json::from_slice(&body).map_err(Error::Decode)?;
        Ok(data)
    }
}

#[async_trait::async_trait]
impl Transit for HttpTransit {
    #[instrument(skip(self, req))]
    async fn encrypt(
        &self,
        mount: &str,
        key: &str,
        req: EncryptRequest,
    ) -> Result<EncryptResponse, Error> {
        self.write(&format!("{mount}/encrypt/{key}"), &req).await
    }

    #[instrument(skip(self, req))]
    async fn decrypt(
        &self,
        mount: &str,
        key: &str,
        req: DecryptRequest,
    ) -> Result<DecryptResponse, Error> {
        self.write(&format!("{mount}/decrypt/{key}"), &req).await
    }
}

impl fmt::Debug for HttpTransit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransit")
            .field("addr", &self.addr)
            .field("namespace", &self.namespace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[test]
    fn rejects_invalid_addresses() {
        for addr in ["", "vault", "/v1", "http://"] {
            assert!(
                matches!(HttpTransit::new(addr, "root"), Err(Error::InvalidAddress(_))),
                "{addr}"
            );
        }
    }

    #[tokio::test]
    async fn decrypt() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/transit-test/decrypt/metadata-api")
                    .header("x-vault-token", "root")
                    .header_missing("x-vault-namespace")
                    .json_body(json!({
                        "ciphertext": "vault:v1:abcd",
                        "context": "aGVsbG8=",
                    }));
                then.status(200).json_body(json!({
                    "data": {"plaintext": "bXktYXV0aC10b2tlbg=="},
                }));
            })
            .await;

        let transit = HttpTransit::new(server.base_url(), "root").unwrap();
        let rsp = transit
            .decrypt(
                "transit-test",
                "metadata-api",
                DecryptRequest::new("vault:v1:abcd").with_context("hello"),
            )
            .await
            .unwrap();
        assert_eq!(rsp.into_bytes().unwrap(), "my-auth-token");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn encrypt_in_namespace() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/transit-test/encrypt/metadata-api")
                    .header("x-vault-token", "root")
                    .header("x-vault-namespace", "relay")
                    .json_body(json!({"plaintext": "bXktYXV0aC10b2tlbg=="}));
                then.status(200).json_body(json!({
                    "data": {"ciphertext": "vault:v1:abcd", "key_version": 1},
                }));
            })
            .await;

        let transit = HttpTransit::new(format!("{}/", server.base_url()), "root")
            .unwrap()
            .with_namespace("relay");
        let rsp = transit
            .encrypt(
                "transit-test",
                "metadata-api",
                EncryptRequest::new("my-auth-token"),
            )
            .await
            .unwrap();
        assert_eq!(rsp.ciphertext, "vault:v1:abcd");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/transit-test/decrypt/metadata-api");
                then.status(400).json_body(json!({
                    "errors": ["cipher: message authentication failed"],
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/transit-test/decrypt/sealed");
                then.status(503).body("<html>unavailable</html>");
            })
            .await;

        let transit = HttpTransit::new(server.base_url(), "root").unwrap();
        let err = transit
            .decrypt(
                "transit-test",
                "metadata-api",
                DecryptRequest::new("vault:v1:abcd"),
            )
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        match err {
            Error::Api { status, errors } => {
                assert_eq!(status, http::StatusCode::BAD_REQUEST);
                assert_eq!(errors, vec!["cipher: message authentication failed"]);
            }
            err => panic!("unexpected error: {err}"),
        }

        let err = transit
            .decrypt("transit-test", "sealed", DecryptRequest::new("vault:v1:abcd"))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "{err}");
    }

    #[tokio::test]
    async fn connection_errors_are_transient() {
        // Nothing listens on the discard port.
        let transit = HttpTransit::new("http://127.0.0.1:9", "root").unwrap();
        let err = transit
            .decrypt("transit-test", "metadata-api", DecryptRequest::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "{err}");
        assert!(err.is_transient());
    }
}
