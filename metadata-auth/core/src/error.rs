use std::{fmt, net::IpAddr};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while resolving a request's identity.
///
/// Callers distinguish three classes of failure:
///
/// - _terminal_ failures ([`Error::NotFound`], [`Error::Ambiguous`]) mean that the caller never
///   held a valid identity. They must not be retried.
/// - _transport_ failures ([`Error::Transport`]) come from the cluster API or the secrets engine.
///   The underlying error is kept as-is; `transient` hints whether retrying the whole resolution
///   may succeed.
/// - the request context ended ([`Error::Canceled`], [`Error::DeadlineExceeded`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("kubernetes: {} candidate pods found with IP {ip}: {}", .pods.len(), .pods.join(", "))]
    Ambiguous { ip: IpAddr, pods: Vec<String> },

    #[error("authentication canceled")]
    Canceled,

    #[error("authentication deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Transport(TransportError),
}

/// Indicates that an object required to establish identity does not exist.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct NotFoundError {
    pub reason: String,
}

/// A failure reported by the cluster API or the secrets engine.
///
/// Displays as the underlying error; its causes are exposed through `source()`.
#[derive(Debug)]
pub struct TransportError {
    error: anyhow::Error,
    transient: bool,
}

// === impl Error ===

impl Error {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(NotFoundError::new(reason))
    }

    /// Wraps a transport failure that should not be retried.
    pub fn transport(error: impl Into<anyhow::Error>) -> Self {
        Self::Transport(TransportError {
            error: error.into(),
            transient: false,
        })
    }

    /// Wraps a transport failure that may succeed if the resolution is retried.
    pub fn transient(error: impl Into<anyhow::Error>) -> Self {
        Self::Transport(TransportError {
            error: error.into(),
            transient: true,
        })
    }

    /// Returns the unmodified cluster or secrets-engine error, if this is a transport failure.
    pub fn transport_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Transport(e) => Some(&e.error),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(e) if e.transient)
    }

    /// Returns true when the failure reflects the caller's identity rather than the health of the
    /// infrastructure.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Ambiguous { .. })
    }
}

// === impl NotFoundError ===

impl NotFoundError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

// === impl TransportError ===

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let err = Error::not_found("kubernetes: no pod found with IP 10.20.30.43");
        assert!(err.is_not_found());
        assert!(err.is_terminal());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "kubernetes: no pod found with IP 10.20.30.43"
        );

        let err = Error::Ambiguous {
            ip: "10.20.30.40".parse().unwrap(),
            pods: vec!["ns/pod-a".to_string(), "ns/pod-b".to_string()],
        };
        assert!(err.is_terminal());
        assert_eq!(
            err.to_string(),
            "kubernetes: 2 candidate pods found with IP 10.20.30.40: ns/pod-a, ns/pod-b"
        );

        let err = Error::transient(anyhow::anyhow!("connection reset"));
        assert!(err.is_transient());
        assert!(!err.is_terminal());
        assert_eq!(err.to_string(), "connection reset");

        let err = Error::transport(anyhow::anyhow!("permission denied"));
        assert!(!err.is_transient());
        assert_eq!(
            err.transport_error().map(|e| e.to_string()).as_deref(),
            Some("permission denied")
        );
        assert!(!err.is_terminal());

        assert!(!Error::Canceled.is_terminal());
        assert!(!Error::DeadlineExceeded.is_transient());
    }

    #[test]
    fn transport_keeps_causes() {
        let err = Error::transient(
            anyhow::anyhow!("connection refused").context("failed to list pods"),
        );
        assert_eq!(err.to_string(), "failed to list pods");
        assert_eq!(
            std::error::Error::source(&err).map(|e| e.to_string()),
            Some("connection refused".to_string())
        );
        assert_eq!(
            format!("{:#}", anyhow::Error::from(err)),
            "failed to list pods: connection refused"
        );
    }
}
