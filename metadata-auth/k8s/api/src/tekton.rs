use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A check that gates the execution of a pipeline task.
///
/// Tekton evaluates a `Condition` in a dedicated pod. That pod is not annotated with a metadata
/// token itself; the token and subject issued for the check are carried by the `Condition`.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "tekton.dev",
    version = "v1alpha1",
    kind = "Condition",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSpec {
    /// The container step that evaluates the condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<ParamSpec>>,
}

/// Declares a parameter accepted by a condition check.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResourceExt, SUBJECT_ANNOTATION, TOKEN_ANNOTATION};
    use kube::Resource;
    use maplit::btreemap;

    #[test]
    fn resource_type() {
        assert_eq!(Condition::group(&()), "tekton.dev");
        assert_eq!(Condition::version(&()), "v1alpha1");
        assert_eq!(Condition::kind(&()), "Condition");
        assert_eq!(Condition::plural(&()), "conditions");
    }

    #[test]
    fn parses_annotated_condition() {
        let cond: Condition = serde_json::from_value(serde_json::json!({
            "apiVersion": "tekton.dev/v1alpha1",
            "kind": "Condition",
            "metadata": {
                "name": "my-task",
                "namespace": "my-condition-namespace",
                "annotations": {
                    "relay.sh/token": "my-tekton-auth-token",
                    "relay.sh/token-subject": "my-tekton-test-subject",
                },
            },
            "spec": {
                "check": {
                    "image": "alpine:latest",
                    "script": "exit 0",
                },
                "params": [{"name": "path", "type": "string"}],
            },
        }))
        .unwrap();

        assert_eq!(cond.name_any(), "my-task");
        assert_eq!(cond.namespace().as_deref(), Some("my-condition-namespace"));
        assert_eq!(
            cond.annotations(),
            &btreemap! {
                TOKEN_ANNOTATION.to_string() => "my-tekton-auth-token".to_string(),
                SUBJECT_ANNOTATION.to_string() => "my-tekton-test-subject".to_string(),
            }
        );
        let params = cond.spec.params.unwrap();
        assert_eq!(params[0].name, "path");
        assert_eq!(params[0].kind.as_deref(), Some("string"));
    }
}
