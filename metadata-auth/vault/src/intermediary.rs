use crate::{DecryptRequest, Transit};
use bytes::Bytes;
use relay_metadata_auth_core::{
    Authentication, Context, Error, Intermediary, Raw, Result, Transform,
};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};

/// Decrypts a ciphertext known ahead of time.
///
/// Used as the final step of a [`Chain`](relay_metadata_auth_core::Chain) continuation that
/// computes the ciphertext, or the derivation context, from an earlier stage's output.
#[derive(Clone)]
pub struct VaultTransitIntermediary {
    decrypt: Decrypt,
    ciphertext: Raw,
}

/// Decrypts the credential produced by the preceding stage.
#[derive(Clone)]
pub struct VaultTransitTransform {
    decrypt: Decrypt,
}

#[derive(Clone)]
struct Decrypt {
    transit: Arc<dyn Transit>,
    mount: String,
    key: String,
    context: Option<Bytes>,
}

/// Returns a stage that decrypts its predecessor's credential with `key` on the transit engine
/// mounted at `mount`.
pub fn chain_vault_transit(
    transit: Arc<dyn Transit>,
    mount: impl Into<String>,
    key: impl Into<String>,
) -> VaultTransitTransform {
    VaultTransitTransform::new(transit, mount, key)
}

// === impl VaultTransitIntermediary ===

impl VaultTransitIntermediary {
    pub fn new(
        transit: Arc<dyn Transit>,
        mount: impl Into<String>,
        key: impl Into<String>,
        ciphertext: impl Into<Raw>,
    ) -> Self {
        Self {
            decrypt: Decrypt::new(transit, mount.into(), key.into()),
            ciphertext: ciphertext.into(),
        }
    }

    /// Sets the key derivation context bound to the ciphertext.
    pub fn with_context(mut self, context: impl Into<Bytes>) -> Self {
        self.decrypt.context = Some(context.into());
        self
    }
}

#[async_trait::async_trait]
impl Intermediary for VaultTransitIntermediary {
    async fn next(&self, ctx: &Context, _: &mut Authentication) -> Result<Raw> {
        self.decrypt.run(ctx, &self.ciphertext).await
    }
}

impl fmt::Debug for VaultTransitIntermediary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultTransitIntermediary")
            .field("decrypt", &self.decrypt)
            .field("ciphertext", &self.ciphertext)
            .finish()
    }
}

// === impl VaultTransitTransform ===

impl VaultTransitTransform {
    pub fn new(transit: Arc<dyn Transit>, mount: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            decrypt: Decrypt::new(transit, mount.into(), key.into()),
        }
    }

    /// Sets the key derivation context bound to the ciphertext.
    pub fn with_context(mut self, context: impl Into<Bytes>) -> Self {
        self.decrypt.context = Some(context.into());
        self
    }
}

#[async_trait::async_trait]
impl Transform for VaultTransitTransform {
    async fn transform(&self, ctx: &Context, _: &mut Authentication, raw: Raw) -> Result<Raw> {
        self.decrypt.run(ctx, &raw).await
    }
}

impl fmt::Debug for VaultTransitTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VaultTransitTransform")
            .field(&self.decrypt)
            .finish()
    }
}

// === impl Decrypt ===

impl Decrypt {
    fn new(transit: Arc<dyn Transit>, mount: String, key: String) -> Self {
        Self {
            transit,
            mount,
            key,
            context: None,
        }
    }

    #[instrument(name = "vault_transit", skip_all, fields(mount = %self.mount, key = %self.key))]
    async fn run(&self, ctx: &Context, ciphertext: &Raw) -> Result<Raw> {
        let ciphertext = ciphertext
            .to_str()
            .map_err(|e| Error::from(crate::Error::Ciphertext(e)))?;
        let mut req = DecryptRequest::new(ciphertext);
        if let Some(context) = &self.context {
            req = req.with_context(context);
        }

        let rsp = ctx
            .run(self.transit.decrypt(&self.mount, &self.key, req))
            .await?;
        let plaintext = rsp.into_bytes()?;
        debug!(bytes = plaintext.len(), "Decrypted");
        Ok(Raw::from(plaintext))
    }
}

impl fmt::Debug for Decrypt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decrypt")
            .field("mount", &self.mount)
            .field("key", &self.key)
            .field("context", &self.context.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryTransit, EncryptRequest};
    use relay_metadata_auth_core::ChainIntermediary;

    const MOUNT: &str = "transit-test";
    const KEY: &str = "metadata-api";

    async fn encrypt(transit: &MemoryTransit, plaintext: &str, context: Option<&str>) -> String {
        let mut req = EncryptRequest::new(plaintext);
        if let Some(context) = context {
            req = req.with_context(context);
        }
        transit.encrypt(MOUNT, KEY, req).await.unwrap().ciphertext
    }

    #[tokio::test]
    async fn decrypts_held_ciphertext() {
        let transit = MemoryTransit::new().with_derived_key(MOUNT, KEY);
        let ciphertext = encrypt(&transit, "my-auth-token", Some("hello")).await;

        let im = VaultTransitIntermediary::new(Arc::new(transit), MOUNT, KEY, ciphertext)
            .with_context("hello");
        let raw = im
            .next(&Context::background(), &mut Authentication::new())
            .await
            .unwrap();
        assert_eq!(raw, Raw::from("my-auth-token"));
    }

    #[tokio::test]
    async fn decrypts_predecessor_output() {
        let transit = MemoryTransit::new().with_derived_key(MOUNT, KEY);
        let ciphertext = encrypt(&transit, "my-auth-token", Some("hello")).await;

        let im = ChainIntermediary::new(Raw::from(ciphertext))
            .then(chain_vault_transit(Arc::new(transit), MOUNT, KEY).with_context("hello"));
        let raw = im
            .next(&Context::background(), &mut Authentication::new())
            .await
            .unwrap();
        assert_eq!(raw, Raw::from("my-auth-token"));
    }

    #[tokio::test]
    async fn context_mismatch_fails_closed() {
        let transit = Arc::new(MemoryTransit::new().with_derived_key(MOUNT, KEY));
        let ciphertext = encrypt(&transit, "my-auth-token", Some("hello")).await;

        for stage in [
            chain_vault_transit(transit.clone(), MOUNT, KEY).with_context("goodbye"),
            chain_vault_transit(transit.clone(), MOUNT, KEY),
        ] {
            let err = stage
                .transform(
                    &Context::background(),
                    &mut Authentication::new(),
                    Raw::from(ciphertext.clone()),
                )
                .await
                .unwrap_err();
            assert!(!err.is_terminal(), "{err}");
            assert!(!err.is_transient(), "{err}");
            assert!(err
                .transport_error()
                .and_then(|e| e.downcast_ref::<crate::Error>())
                .is_some());
        }
    }

    #[tokio::test]
    async fn rejects_non_utf8_ciphertext() {
        let transit = Arc::new(MemoryTransit::new().with_derived_key(MOUNT, KEY));
        let err = chain_vault_transit(transit, MOUNT, KEY)
            .with_context("hello")
            .transform(
                &Context::background(),
                &mut Authentication::new(),
                Raw::from(vec![0xff, 0xfe]),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("UTF-8"), "{err}");
        assert!(matches!(
            err.transport_error()
                .and_then(|e| e.downcast_ref::<crate::Error>()),
            Some(crate::Error::Ciphertext(_))
        ));
    }

    /// A transit engine that never answers.
    struct Hung;

    #[async_trait::async_trait]
    impl Transit for Hung {
        async fn encrypt(
            &self,
            _: &str,
            _: &str,
            _: EncryptRequest,
        ) -> Result<crate::EncryptResponse, crate::Error> {
            std::future::pending().await
        }

        async fn decrypt(
            &self,
            _: &str,
            _: &str,
            _: DecryptRequest,
        ) -> Result<crate::DecryptResponse, crate::Error> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_bounds_decryption() {
        let ctx = Context::background().with_timeout(std::time::Duration::from_secs(5));
        let err = VaultTransitIntermediary::new(Arc::new(Hung), MOUNT, KEY, "vault:v1:abcd")
            .with_context("hello")
            .next(&ctx, &mut Authentication::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded), "{err}");
    }

    #[tokio::test]
    async fn cancellation_stops_decryption() {
        let ctx = Context::background();
        let stage = chain_vault_transit(Arc::new(Hung), MOUNT, KEY);
        let canceled = ctx.clone();
        let mut auth = Authentication::new();
        let (res, ()) = tokio::join!(
            stage.transform(&ctx, &mut auth, Raw::from("vault:v1:abcd")),
            async move {
                tokio::task::yield_now().await;
                canceled.cancel();
            }
        );
        assert!(matches!(res.unwrap_err(), Error::Canceled));
    }

    #[test]
    fn debug_omits_secrets() {
        let transit = Arc::new(MemoryTransit::new());
        let im = VaultTransitIntermediary::new(transit, MOUNT, KEY, "vault:v1:secret")
            .with_context("hello");
        let dbg = format!("{im:?}");
        assert!(!dbg.contains("secret"), "{dbg}");
        assert!(!dbg.contains("hello"), "{dbg}");
        assert!(dbg.contains(KEY), "{dbg}");
    }
}
