//! An in-memory [`Cluster`] for tests.

use crate::Cluster;
use relay_metadata_auth_core::Result;
use relay_metadata_auth_k8s_api::{
    self as k8s, ConditionSpec, ResourceExt, PIPELINE_TASK_LABEL, SUBJECT_ANNOTATION,
    TOKEN_ANNOTATION,
};
use std::{collections::BTreeMap, net::IpAddr};

/// A fixed snapshot of pods, namespaces, and conditions.
#[derive(Clone, Debug, Default)]
pub struct MemoryCluster {
    pods: Vec<k8s::Pod>,
    namespaces: BTreeMap<String, k8s::Namespace>,
    conditions: BTreeMap<(String, String), k8s::Condition>,
}

// === impl MemoryCluster ===

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a namespace with a random UID.
    pub fn with_namespace(self, name: impl Into<String>) -> Self {
        self.with_namespace_uid(name, uuid::Uuid::new_v4().to_string())
    }

    pub fn with_namespace_uid(mut self, name: impl Into<String>, uid: impl Into<String>) -> Self {
        let name = name.into();
        let ns = k8s::Namespace {
            metadata: k8s::ObjectMeta {
                name: Some(name.clone()),
                uid: Some(uid.into()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.namespaces.insert(name, ns);
        self
    }

    pub fn with_pod(mut self, pod: k8s::Pod) -> Self {
        self.pods.push(pod);
        self
    }

    pub fn with_condition(mut self, condition: k8s::Condition) -> Self {
        let key = (
            condition.namespace().unwrap_or_default(),
            condition.name_any(),
        );
        self.conditions.insert(key, condition);
        self
    }

    pub fn namespace_uid(&self, name: &str) -> Option<String> {
        self.namespaces.get(name)?.uid()
    }
}

#[async_trait::async_trait]
impl Cluster for MemoryCluster {
    async fn list_pods_by_ip(&self, ip: IpAddr) -> Result<Vec<k8s::Pod>> {
        Ok(self
            .pods
            .iter()
            .filter(|pod| k8s::pod::ip(pod) == Some(ip))
            .cloned()
            .collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<k8s::Namespace>> {
        Ok(self.namespaces.get(name).cloned())
    }

    async fn get_condition(&self, namespace: &str, name: &str) -> Result<Option<k8s::Condition>> {
        Ok(self
            .conditions
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// Builds a pod holding `ip` in the given phase.
pub fn pod(namespace: &str, name: &str, ip: &str, phase: k8s::Phase) -> k8s::Pod {
    k8s::Pod {
        metadata: k8s::ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(k8s::PodStatus {
            pod_ip: Some(ip.to_string()),
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builds an empty Tekton condition.
pub fn condition(namespace: &str, name: &str) -> k8s::Condition {
    let mut condition = k8s::Condition::new(name, ConditionSpec::default());
    condition.metadata.namespace = Some(namespace.to_string());
    condition
}

/// Annotates an object with a metadata token and the subject it was issued to.
pub fn with_credential<K: ResourceExt>(mut obj: K, token: &str, subject: &str) -> K {
    obj.annotations_mut()
        .insert(TOKEN_ANNOTATION.to_string(), token.to_string());
    obj.annotations_mut()
        .insert(SUBJECT_ANNOTATION.to_string(), subject.to_string());
    obj
}

/// Labels a pod as running a check for the named pipeline task.
pub fn with_pipeline_task(mut pod: k8s::Pod, task: &str) -> k8s::Pod {
    pod.labels_mut()
        .insert(PIPELINE_TASK_LABEL.to_string(), task.to_string());
    pod
}
