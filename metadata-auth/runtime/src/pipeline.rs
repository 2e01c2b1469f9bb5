use relay_metadata_auth_core::{
    authenticate, ClaimsDecoder, Context, Intermediary, Raw, Resolve, Step, Verdict,
};
use relay_metadata_auth_k8s_resolve::{
    Cluster, KubernetesIntermediary, KubernetesIntermediaryMetadata,
};
use relay_metadata_auth_vault::{Transit, VaultTransitIntermediary};
use std::{fmt, net::IpAddr, sync::Arc};
use tracing::{debug, instrument};

/// Selects the key derivation context used to decrypt a caller's token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitContext {
    /// The UID of the namespace the caller runs in.
    NamespaceUid,

    /// The same context for every caller.
    Fixed(String),
}

/// The standard authentication pipeline: the caller's IP is resolved to an encrypted token in
/// the cluster, which is then decrypted by the transit engine.
#[derive(Clone)]
pub struct Pipeline {
    cluster: Arc<dyn Cluster>,
    transit: Arc<dyn Transit>,
    mount: String,
    key: String,
    context: TransitContext,
}

// === impl Pipeline ===

impl Pipeline {
    pub fn new(
        cluster: Arc<dyn Cluster>,
        transit: Arc<dyn Transit>,
        mount: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            transit,
            mount: mount.into(),
            key: key.into(),
            context: TransitContext::NamespaceUid,
        }
    }

    pub fn with_context(mut self, context: TransitContext) -> Self {
        self.context = context;
        self
    }

    /// Builds the intermediary that yields the decrypted token of the caller at `ip`.
    pub fn intermediary(&self, ip: IpAddr) -> impl Intermediary {
        let transit = self.transit.clone();
        let mount = self.mount.clone();
        let key = self.key.clone();
        let context = self.context.clone();

        KubernetesIntermediary::new(self.cluster.clone(), ip).chain(
            move |_: &Context, ciphertext: Raw, md: KubernetesIntermediaryMetadata| {
                let context = match &context {
                    TransitContext::NamespaceUid => md.namespace_uid,
                    TransitContext::Fixed(context) => context.clone(),
                };
                debug!(pod = %md.pod_name, namespace = %md.namespace_name, "Decrypting token");
                let decrypt =
                    VaultTransitIntermediary::new(transit.clone(), &mount, &key, ciphertext)
                        .with_context(context);
                Ok(Step::intermediary(decrypt))
            },
        )
    }

    /// Authenticates a single request from `ip`.
    #[instrument(skip(self, ctx, decoder))]
    pub async fn authenticate<D>(&self, ctx: &Context, ip: IpAddr, decoder: &D) -> Verdict
    where
        D: ClaimsDecoder + ?Sized,
    {
        authenticate(ctx, &self.intermediary(ip), decoder).await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("mount", &self.mount)
            .field("key", &self.key)
            .field("context", &self.context)
            .finish()
    }
}
