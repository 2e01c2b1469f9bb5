use crate::{Pipeline, TransitContext};
use anyhow::{bail, Context as _, Result};
use clap::Parser;
use relay_metadata_auth_core::{jwt::JwtDecoder, Claims, Context, Verdict};
use relay_metadata_auth_k8s_resolve::KubeCluster;
use relay_metadata_auth_vault::HttpTransit;
use std::{net::IpAddr, sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[clap(
    name = "relay-metadata-auth",
    about = "Authenticates a metadata request by the IP of the pod that sent it"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "relay=info,warn",
        env = "RELAY_METADATA_AUTH_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(long, default_value = "http://127.0.0.1:8200", env = "VAULT_ADDR")]
    vault_addr: String,

    #[clap(long, env = "VAULT_TOKEN", hide_env_values = true)]
    vault_token: String,

    /// Vault Enterprise namespace of the transit engine.
    #[clap(long, env = "VAULT_NAMESPACE")]
    vault_namespace: Option<String>,

    #[clap(long, default_value = "transit-tenants")]
    transit_mount: String,

    #[clap(long, default_value = "metadata-api")]
    transit_key: String,

    /// Key derivation context for every caller.
    ///
    /// By default, the UID of the caller's namespace is used.
    #[clap(long)]
    transit_context: Option<String>,

    /// Key that metadata tokens are signed with (HS256).
    #[clap(
        long,
        env = "RELAY_METADATA_AUTH_JWT_SIGNING_KEY",
        hide_env_values = true
    )]
    jwt_signing_key: String,

    /// Seconds to wait for the cluster and Vault before giving up.
    #[clap(long, default_value = "10", value_name = "SECS")]
    timeout: u64,

    /// Source IP of the request to authenticate.
    ip: IpAddr,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            vault_addr,
            vault_token,
            vault_namespace,
            transit_mount,
            transit_key,
            transit_context,
            jwt_signing_key,
            timeout,
            ip,
        } = self;

        log_format.try_init(log_level)?;

        // The Kubernetes and Vault clients share one TLS stack.
        if rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .is_err()
        {
            debug!("Crypto provider already installed");
        }

        let client = client
            .try_client()
            .await
            .context("failed to configure Kubernetes client")?;
        let mut transit = HttpTransit::new(vault_addr, vault_token)?;
        if let Some(ns) = vault_namespace {
            transit = transit.with_namespace(ns);
        }

        let context = match transit_context {
            Some(context) => TransitContext::Fixed(context),
            None => TransitContext::NamespaceUid,
        };
        let pipeline = Pipeline::new(
            Arc::new(KubeCluster::new(client)),
            Arc::new(transit),
            transit_mount,
            transit_key,
        )
        .with_context(context);
        let decoder = JwtDecoder::hs256(jwt_signing_key.as_bytes());

        let ctx = Context::background().with_timeout(Duration::from_secs(timeout));
        tokio::spawn({
            let ctx = ctx.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted");
                    ctx.cancel();
                }
            }
        });

        match pipeline.authenticate(&ctx, ip, &decoder).await {
            Verdict::Admit { claims, .. } => {
                info!(%ip, "Admitted");
                println!("{}", describe(&claims));
                Ok(())
            }
            Verdict::Deny => {
                info!(%ip, "Denied");
                bail!("request from {ip} is not trusted")
            }
            Verdict::Fail(error) => {
                Err(error).with_context(|| format!("failed to authenticate request from {ip}"))
            }
        }
    }
}

/// Summarizes the identity of an admitted caller. The token itself is never printed.
fn describe(claims: &Claims) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    format!(
        "subject={} namespace={} namespace-uid={}",
        field(&claims.subject),
        field(&claims.kubernetes_namespace_name),
        field(&claims.kubernetes_namespace_uid),
    )
}
