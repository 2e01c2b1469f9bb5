use kube::api::{Api, ListParams};
use relay_metadata_auth_core::{Error, Result};
use relay_metadata_auth_k8s_api::{self as k8s, Client};
use std::net::IpAddr;
use tracing::{instrument, trace};

/// Read access to the cluster state needed to resolve a caller.
///
/// Implementations classify their own failures: errors are returned as
/// [`Error::Transport`] with the underlying error unmodified.
#[async_trait::async_trait]
pub trait Cluster: Send + Sync {
    /// Lists pods in all namespaces whose status reports `ip`.
    async fn list_pods_by_ip(&self, ip: IpAddr) -> Result<Vec<k8s::Pod>>;

    async fn get_namespace(&self, name: &str) -> Result<Option<k8s::Namespace>>;

    async fn get_condition(&self, namespace: &str, name: &str) -> Result<Option<k8s::Condition>>;
}

/// A [`Cluster`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

// === impl KubeCluster ===

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl From<Client> for KubeCluster {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

#[async_trait::async_trait]
impl Cluster for KubeCluster {
    #[instrument(skip(self))]
    async fn list_pods_by_ip(&self, ip: IpAddr) -> Result<Vec<k8s::Pod>> {
        let params = ListParams::default().fields(&format!("status.podIP={ip}"));
        let pods = Api::<k8s::Pod>::all(self.client.clone())
            .list(&params)
            .await
            .map_err(classify)?;
        trace!(pods = pods.items.len(), "Listed");
        Ok(pods.items)
    }

    #[instrument(skip(self))]
    async fn get_namespace(&self, name: &str) -> Result<Option<k8s::Namespace>> {
        Api::<k8s::Namespace>::all(self.client.clone())
            .get_opt(name)
            .await
            .map_err(classify)
    }

    #[instrument(skip(self))]
    async fn get_condition(&self, namespace: &str, name: &str) -> Result<Option<k8s::Condition>> {
        Api::<k8s::Condition>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .map_err(classify)
    }
}

/// Marks API errors that may clear up on their own as transient.
pub(crate) fn classify(error: kube::Error) -> Error {
    if is_transient(&error) {
        Error::transient(error)
    } else {
        Error::transport(error)
    }
}

fn is_transient(error: &kube::Error) -> bool {
    match error {
        kube::Error::Api(rsp) => {
            matches!(
                rsp.reason.as_str(),
                "Conflict" | "AlreadyExists" | "Timeout" | "ServerTimeout" | "TooManyRequests"
            ) || matches!(rsp.code, 409 | 429 | 504)
        }
        kube::Error::HyperError(_) | kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(reason: &str, code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{reason} happened"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn classifies_api_errors() {
        for (reason, code, transient) in [
            ("Conflict", 409, true),
            ("AlreadyExists", 409, true),
            ("Timeout", 504, true),
            ("ServerTimeout", 500, true),
            ("TooManyRequests", 429, true),
            ("Forbidden", 403, false),
            ("NotFound", 404, false),
            ("InternalError", 500, false),
        ] {
            let err = classify(api_error(reason, code));
            assert_eq!(err.is_transient(), transient, "{reason}");
            assert!(!err.is_terminal(), "{reason}");
        }
    }

    #[test]
    fn keeps_source_unmodified() {
        let err = classify(api_error("Forbidden", 403));
        let source = err
            .transport_error()
            .and_then(|e| e.downcast_ref::<kube::Error>())
            .expect("kube error must be preserved");
        assert!(matches!(source, kube::Error::Api(rsp) if rsp.code == 403));
    }
}
