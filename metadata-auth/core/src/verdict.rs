use crate::{Authentication, Claims, Context, Error, Intermediary, Raw};
use tracing::{debug, instrument};

/// Extracts claims from a final, decrypted credential.
///
/// Any error means the credential cannot be trusted.
pub trait ClaimsDecoder: Send + Sync {
    fn decode(&self, raw: &Raw) -> anyhow::Result<Claims>;
}

/// The decision handed to the metadata service for a single request.
#[derive(Debug)]
pub enum Verdict {
    /// The credential resolved, decoded, and matched the caller's identity.
    Admit { raw: Raw, claims: Claims },

    /// The caller is not trusted.
    ///
    /// Unknown callers, ambiguous callers, undecodable tokens, and rejected claims all produce
    /// the same verdict so that responses cannot be used to probe which identities exist.
    Deny,

    /// Infrastructure failed before a decision could be made.
    Fail(Error),
}

/// Resolves, decodes, and validates a single request's credential.
#[instrument(skip_all)]
pub async fn authenticate<I, D>(ctx: &Context, intermediary: &I, decoder: &D) -> Verdict
where
    I: Intermediary + ?Sized,
    D: ClaimsDecoder + ?Sized,
{
    let mut auth = Authentication::new();
    let raw = match intermediary.next(ctx, &mut auth).await {
        Ok(raw) => raw,
        Err(error) if error.is_terminal() => {
            debug!(%error, "Identity not resolved");
            return Verdict::Deny;
        }
        Err(error) => return Verdict::Fail(error),
    };

    let claims = match decoder.decode(&raw) {
        Ok(claims) => claims,
        Err(error) => {
            debug!(%error, "Token not trusted");
            return Verdict::Deny;
        }
    };

    match auth.validate(ctx, &claims).await {
        Ok(true) => Verdict::Admit { raw, claims },
        Ok(false) => {
            debug!(validators = auth.validators().len(), "Claims rejected");
            Verdict::Deny
        }
        Err(error) => Verdict::Fail(error),
    }
}

// === impl Verdict ===

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny)
    }

    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Admit { claims, .. } => Some(claims),
            _ => None,
        }
    }
}
