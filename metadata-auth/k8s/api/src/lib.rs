#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod pod;
pub mod tekton;

pub use self::{
    pod::Phase,
    tekton::{Condition, ConditionSpec},
};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Namespace, Pod, PodStatus},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
pub use kube::{Client, ResourceExt};

/// Annotation holding the encrypted metadata token of a workload.
pub const TOKEN_ANNOTATION: &str = "relay.sh/token";

/// Annotation holding the subject that a workload's metadata token was issued to.
pub const SUBJECT_ANNOTATION: &str = "relay.sh/token-subject";

/// Label set by Tekton on the pods it runs for a pipeline task. Condition evaluation pods carry
/// the name of the `Condition` they check.
pub const PIPELINE_TASK_LABEL: &str = "tekton.dev/pipelineTask";
