//! Resolves the caller of a metadata request to a workload in the cluster.
//!
//! A request is attributed to the pod that currently holds its source IP. Task pods carry their
//! own credential in annotations:
//!
//! ```text
//! [ IP ] -> [ Pod (token, subject) ]
//! ```
//!
//! Tekton runs condition checks in pods that it creates itself, so these pods cannot be annotated
//! ahead of time. Their credential is instead attached to the `Condition` that the pod evaluates,
//! found through the pod's pipeline-task label:
//!
//! ```text
//! [ IP ] -> [ Pod (tekton.dev/pipelineTask=NAME) ] -> [ Condition NAME (token, subject) ]
//! ```
//!
//! In both cases the namespace reported for the caller is the pod's own namespace.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cluster;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
mod select;
mod validate;


pub use self::{
    cluster::{Cluster, KubeCluster},
    validate::{NamespaceUidValidator, SubjectValidator},
};
use relay_metadata_auth_core::{
    Authentication, Context, Error, Intermediary, Raw, Resolve, Result,
};
use relay_metadata_auth_k8s_api::{
    self as k8s, ResourceExt, PIPELINE_TASK_LABEL, SUBJECT_ANNOTATION, TOKEN_ANNOTATION,
};
use std::{collections::BTreeMap, fmt, net::IpAddr, sync::Arc};
use tracing::{debug, instrument};

/// Resolves a source IP to the credential advertised by the workload behind it.
#[derive(Clone)]
pub struct KubernetesIntermediary {
    cluster: Arc<dyn Cluster>,
    ip: IpAddr,
}

/// Identity discovered by a [`KubernetesIntermediary`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KubernetesIntermediaryMetadata {
    pub namespace_name: String,
    pub namespace_uid: String,
    pub pod_name: String,
    pub subject: String,
    pub source: Source,
}

/// The object whose annotations supplied the credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Pod,
    Condition { name: String },
}

/// A credential read from annotations.
struct Credential {
    token: String,
    subject: String,
}

// === impl KubernetesIntermediary ===

impl KubernetesIntermediary {
    pub fn new(cluster: Arc<dyn Cluster>, ip: IpAddr) -> Self {
        Self { cluster, ip }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    async fn condition_credential(
        &self,
        ctx: &Context,
        pod: &k8s::Pod,
        ns: &str,
    ) -> Result<(Credential, Source)> {
        let no_condition =
            || Error::not_found("kubernetes: Tekton condition of requesting pod does not exist");

        let name = pod
            .labels()
            .get(PIPELINE_TASK_LABEL)
            .ok_or_else(no_condition)?;
        let condition = ctx
            .run(self.cluster.get_condition(ns, name))
            .await?
            .ok_or_else(no_condition)?;

        let credential = Credential::from_annotations(condition.annotations()).map_err(|key| {
            Error::not_found(format!(
                "kubernetes: Tekton condition {ns}/{name} is missing annotation {key}"
            ))
        })?;
        debug!(condition = %name, "Using credential of Tekton condition");
        Ok((credential, Source::Condition { name: name.clone() }))
    }
}

#[async_trait::async_trait]
impl Resolve for KubernetesIntermediary {
    type Metadata = KubernetesIntermediaryMetadata;

    #[instrument(skip_all, fields(ip = %self.ip))]
    async fn resolve(
        &self,
        ctx: &Context,
        auth: &mut Authentication,
    ) -> Result<(Raw, KubernetesIntermediaryMetadata)> {
        let pods = ctx.run(self.cluster.list_pods_by_ip(self.ip)).await?;
        let pod = select::pod_for_ip(self.ip, pods)?;
        let pod_name = pod.name_any();
        let namespace_name = pod.namespace().ok_or_else(|| {
            Error::not_found(format!("kubernetes: pod {pod_name} has no namespace"))
        })?;
        debug!(pod = %pod_name, namespace = %namespace_name, "Found pod");

        let namespace = ctx
            .run(self.cluster.get_namespace(&namespace_name))
            .await?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "kubernetes: namespace {namespace_name} of requesting pod does not exist"
                ))
            })?;
        let namespace_uid = namespace.uid().ok_or_else(|| {
            Error::not_found(format!(
                "kubernetes: namespace {namespace_name} of requesting pod has no UID"
            ))
        })?;

        let (Credential { token, subject }, source) = if Credential::is_annotated(pod.annotations())
        {
            let credential = Credential::from_annotations(pod.annotations()).map_err(|key| {
                Error::not_found(format!(
                    "kubernetes: requesting pod is missing annotation {key}"
                ))
            })?;
            (credential, Source::Pod)
        } else {
            self.condition_credential(ctx, &pod, &namespace_name)
                .await?
        };

        auth.register_validator(SubjectValidator::new(subject.clone()));
        auth.register_validator(NamespaceUidValidator::new(namespace_uid.clone()));

        let metadata = KubernetesIntermediaryMetadata {
            namespace_name,
            namespace_uid,
            pod_name,
            subject,
            source,
        };
        Ok((Raw::from(token), metadata))
    }
}

#[async_trait::async_trait]
impl Intermediary for KubernetesIntermediary {
    async fn next(&self, ctx: &Context, auth: &mut Authentication) -> Result<Raw> {
        let (raw, _) = self.resolve(ctx, auth).await?;
        Ok(raw)
    }
}

impl fmt::Debug for KubernetesIntermediary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubernetesIntermediary")
            .field("ip", &self.ip)
            .finish()
    }
}

// === impl Credential ===

impl Credential {
    /// Returns true if either credential annotation is set.
    fn is_annotated(annotations: &BTreeMap<String, String>) -> bool {
        annotations.contains_key(TOKEN_ANNOTATION) || annotations.contains_key(SUBJECT_ANNOTATION)
    }

    /// Reads both credential annotations, failing with the key of the first one that is missing.
    fn from_annotations(annotations: &BTreeMap<String, String>) -> Result<Self, &'static str> {
        let token = annotations.get(TOKEN_ANNOTATION).ok_or(TOKEN_ANNOTATION)?;
        let subject = annotations
            .get(SUBJECT_ANNOTATION)
            .ok_or(SUBJECT_ANNOTATION)?;
        Ok(Self {
            token: token.clone(),
            subject: subject.clone(),
        })
    }
}
