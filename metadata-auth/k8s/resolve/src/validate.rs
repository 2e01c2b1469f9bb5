use relay_metadata_auth_core::{Claims, Context, Result, Validator};
use tracing::debug;

/// Requires the token's subject to match the subject annotated on the caller's pod or condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectValidator {
    subject: String,
}

/// Requires the token to have been issued for the namespace the caller runs in, as it existed at
/// resolution time. A namespace that is deleted and recreated under the same name gets a new UID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceUidValidator {
    uid: String,
}

// === impl SubjectValidator ===

impl SubjectValidator {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

#[async_trait::async_trait]
impl Validator for SubjectValidator {
    async fn validate(&self, _: &Context, claims: &Claims) -> Result<bool> {
        let ok = claims.subject.as_deref() == Some(self.subject.as_str());
        if !ok {
            debug!(claimed = ?claims.subject, "Subject mismatch");
        }
        Ok(ok)
    }
}

// === impl NamespaceUidValidator ===

impl NamespaceUidValidator {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

#[async_trait::async_trait]
impl Validator for NamespaceUidValidator {
    async fn validate(&self, _: &Context, claims: &Claims) -> Result<bool> {
        let ok = claims.kubernetes_namespace_uid.as_deref() == Some(self.uid.as_str());
        if !ok {
            debug!(claimed = ?claims.kubernetes_namespace_uid, "Namespace UID mismatch");
        }
        Ok(ok)
    }
}
