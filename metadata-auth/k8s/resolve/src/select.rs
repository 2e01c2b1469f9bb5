use relay_metadata_auth_core::{Error, Result};
use relay_metadata_auth_k8s_api::{self as k8s, Phase, ResourceExt};
use std::net::IpAddr;
use tracing::trace;

/// Picks the pod that currently owns `ip`.
///
/// Terminal pods never own their IP; it may have been reassigned already. A single running pod
/// wins over any number of pods that have not started yet. When no pod is running, a single
/// pending (or unknown) pod is used. Any other tie is ambiguous.
///
/// Only the primary pod IP is matched. A dual-stack pod is not found by its secondary address.
pub(crate) fn pod_for_ip(ip: IpAddr, pods: Vec<k8s::Pod>) -> Result<k8s::Pod> {
    let (mut running, mut waiting) = (Vec::new(), Vec::new());
    for pod in pods {
        // The API server filters on this field already, but a stale cache or a custom cluster
        // implementation may not.
        if k8s::pod::ip(&pod) != Some(ip) {
            continue;
        }
        match Phase::of(&pod) {
            Phase::Running => running.push(pod),
            phase if phase.is_terminal() => {
                trace!(pod = %pod.name_any(), %phase, "Skipping terminated pod");
            }
            _ => waiting.push(pod),
        }
    }

    let candidates = if running.is_empty() {
        waiting
    } else {
        running
    };
    let mut candidates = candidates.into_iter();
    match (candidates.next(), candidates.next()) {
        (None, _) => Err(Error::not_found(format!(
            "kubernetes: no pod found with IP {ip}"
        ))),
        (Some(pod), None) => Ok(pod),
        (Some(a), Some(b)) => {
            let pods = [a, b]
                .into_iter()
                .chain(candidates)
                .map(|pod| qualified_name(&pod))
                .collect();
            Err(Error::Ambiguous { ip, pods })
        }
    }
}

fn qualified_name(pod: &k8s::Pod) -> String {
    match pod.namespace() {
        Some(ns) => format!("{ns}/{}", pod.name_any()),
        None => pod.name_any(),
    }
}
