//! Defines the outcome types returned by a verification probe.

/// Structured outcome of probing one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub syntax_valid: bool,
    /// "yes", "no" or "unknown".
    pub reachable: String,
    pub deliverable: bool,
    pub host_exists: bool,
    pub has_mx_records: bool,
    pub disposable: bool,
    pub catch_all: bool,
    pub inbox_full: bool,
}

impl ProbeResult {
    /// A result for an address that failed structural validation.
    pub fn invalid_syntax() -> Self {
        Self {
            syntax_valid: false,
            reachable: "no".to_string(),
            ..Default::default()
        }
    }

    /// A result for a deliverable address on a domain with MX records.
    pub fn deliverable(catch_all: bool) -> Self {
        Self {
            syntax_valid: true,
            reachable: if catch_all { "unknown" } else { "yes" }.to_string(),
            deliverable: true,
            host_exists: true,
            has_mx_records: true,
            catch_all,
            ..Default::default()
        }
    }
}

/// How the orchestrator treats a probe failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The destination domain has no resolvable host. Not retried.
    HostNotFound,
    /// Timeouts and temporary unavailability. Retried.
    Transient,
    /// Anything else. Recorded with its message, not retried.
    Unclassified,
}

/// A failed probe carrying a machine-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub reason: String,
}

const HOST_NOT_FOUND_MARKERS: &[&str] = &["no such host"];
const TRANSIENT_MARKERS: &[&str] = &["has timed out", "i/o timeout", "temporarily unavailable"];

impl ProbeFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn host_not_found(domain: &str) -> Self {
        Self::new(format!("lookup {}: no such host", domain))
    }

    pub fn timeout(what: &str) -> Self {
        Self::new(format!("{}: i/o timeout", what))
    }

    pub fn class(&self) -> FailureClass {
        let reason = self.reason.to_ascii_lowercase();
        if HOST_NOT_FOUND_MARKERS.iter().any(|m| reason.contains(m)) {
            FailureClass::HostNotFound
        } else if TRANSIENT_MARKERS.iter().any(|m| reason.contains(m)) {
            FailureClass::Transient
        } else {
            FailureClass::Unclassified
        }
    }
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}
