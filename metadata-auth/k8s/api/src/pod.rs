use crate::Pod;
use std::{fmt, net::IpAddr, str::FromStr};

/// A pod's lifecycle phase, as reported in its status.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Returns the primary IP reported in a pod's status, if it is set and well-formed.
pub fn ip(pod: &Pod) -> Option<IpAddr> {
    pod.status.as_ref()?.pod_ip.as_deref()?.parse().ok()
}

// === impl Phase ===

impl Phase {
    pub fn of(pod: &Pod) -> Self {
        pod.status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            .map(Self::from_phase)
            .unwrap_or(Self::Unknown)
    }

    /// Terminal pods have stopped all of their containers. Their IPs may already have been handed
    /// to another pod.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn from_phase(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

impl FromStr for Phase {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_phase(s))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PodStatus;

    fn mk_pod(ip: Option<&str>, phase: Option<&str>) -> Pod {
        Pod {
            status: Some(PodStatus {
                pod_ip: ip.map(Into::into),
                phase: phase.map(Into::into),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn phases() {
        for (phase, expected, terminal) in [
            (Some("Pending"), Phase::Pending, false),
            (Some("Running"), Phase::Running, false),
            (Some("Succeeded"), Phase::Succeeded, true),
            (Some("Failed"), Phase::Failed, true),
            (Some("Evicted"), Phase::Unknown, false),
            (None, Phase::Unknown, false),
        ] {
            let p = Phase::of(&mk_pod(None, phase));
            assert_eq!(p, expected, "{phase:?}");
            assert_eq!(p.is_terminal(), terminal, "{phase:?}");
        }
        assert_eq!(Pod::default().status, None);
        assert_eq!(Phase::of(&Pod::default()), Phase::Unknown);
    }

    #[test]
    fn pod_ips() {
        assert_eq!(
            ip(&mk_pod(Some("10.20.30.40"), None)),
            Some("10.20.30.40".parse().unwrap())
        );
        assert_eq!(
            ip(&mk_pod(Some("fd00::1"), None)),
            Some("fd00::1".parse().unwrap())
        );
        assert_eq!(ip(&mk_pod(Some("not-an-ip"), None)), None);
        assert_eq!(ip(&mk_pod(None, Some("Running"))), None);
        assert_eq!(ip(&Pod::default()), None);
    }
}
