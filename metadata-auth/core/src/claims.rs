use serde::{Deserialize, Serialize};

/// The claims carried by a decrypted metadata token.
///
/// Registered JWT claims are extended with the identity of the Kubernetes namespace that the
/// token was issued for. The namespace's UID (rather than its name) binds the token to a single
/// incarnation of the namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claims {
    #[serde(rename = "iss", default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    #[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(rename = "aud", default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,

    /// Expiration time, in seconds since the epoch.
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,

    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<u64>,

    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<u64>,

    #[serde(rename = "jti", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(
        rename = "k8s.io/namespace-name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kubernetes_namespace_name: Option<String>,

    #[serde(
        rename = "k8s.io/namespace-uid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kubernetes_namespace_uid: Option<String>,
}

/// The `aud` claim may be a single string or a list of strings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

// === impl Claims ===

impl Claims {
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_kubernetes_namespace_uid(mut self, uid: impl Into<String>) -> Self {
        self.kubernetes_namespace_uid = Some(uid.into());
        self
    }

    pub fn with_kubernetes_namespace_name(mut self, name: impl Into<String>) -> Self {
        self.kubernetes_namespace_name = Some(name.into());
        self
    }
}

// === impl Audience ===

impl Audience {
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Self::One(one) => one == aud,
            Self::Many(many) => many.iter().any(|a| a == aud),
        }
    }
}
