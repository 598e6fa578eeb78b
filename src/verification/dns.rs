//! DNS-backed probe: syntax validation, MX lookup and host existence.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::net::IpAddr;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

use super::{ProbeFailure, ProbeResult, VerificationCapability};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("Email syntax regex failed to compile. This is a bug.")
});

static DISPOSABLE_DOMAINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "mailinator.com",
        "guerrillamail.com",
        "10minutemail.com",
        "tempmail.com",
        "temp-mail.org",
        "yopmail.com",
        "trashmail.com",
        "getnada.com",
        "dispostable.com",
        "sharklasers.com",
        "maildrop.cc",
        "throwawaymail.com",
    ]
    .into_iter()
    .collect()
});

/// Returns the lowercased domain part when `address` is syntactically valid.
pub fn parse_domain(address: &str) -> Option<String> {
    let address = address.trim();
    if !EMAIL_REGEX.is_match(address) {
        return None;
    }
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_ascii_lowercase())
}

pub fn is_disposable(domain: &str) -> bool {
    DISPOSABLE_DOMAINS.contains(domain)
}

/// Verifies addresses using MX and A/AAAA lookups.
pub struct DnsProbe {
    resolver: TokioAsyncResolver,
}

impl DnsProbe {
    pub fn new(config: &Config) -> Result<Self> {
        let ips = config
            .dns_servers
            .iter()
            .map(|s| s.parse::<IpAddr>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Initialization(format!("Invalid DNS server: {}", e)))?;

        let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
        let resolver_config = ResolverConfig::from_parts(None, vec![], group);
        let mut opts = ResolverOpts::default();
        opts.timeout = config.dns_timeout;
        opts.attempts = 1;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        })
    }

    async fn host_exists(&self, domain: &str) -> std::result::Result<bool, ProbeFailure> {
        match self.resolver.lookup_ip(domain).await {
            Ok(lookup) => Ok(lookup.iter().next().is_some()),
            Err(e) => match classify(domain, &e) {
                Some(failure) => Err(failure),
                None => Ok(false),
            },
        }
    }
}

/// Maps a resolver error onto the failure vocabulary the retry engine
/// understands. `None` means "resolved, but no records of that type".
fn classify(domain: &str, err: &ResolveError) -> Option<ProbeFailure> {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            if *response_code == ResponseCode::NXDomain {
                Some(ProbeFailure::host_not_found(domain))
            } else {
                None
            }
        }
        ResolveErrorKind::Timeout => Some(ProbeFailure::timeout(&format!("lookup {}", domain))),
        _ => {
            let msg = err.to_string();
            if msg.contains("timed out") {
                Some(ProbeFailure::timeout(&format!("lookup {}", domain)))
            } else {
                Some(ProbeFailure::new(msg))
            }
        }
    }
}

#[async_trait]
impl VerificationCapability for DnsProbe {
    async fn verify(
        &self,
        address: &str,
        proxy: Option<&str>,
    ) -> std::result::Result<Option<ProbeResult>, ProbeFailure> {
        let Some(domain) = parse_domain(address) else {
            return Ok(Some(ProbeResult::invalid_syntax()));
        };
        if let Some(proxy) = proxy {
            tracing::trace!(target: "probe", "[{}] DNS lookups bypass proxy {}", address, proxy);
        }

        let has_mx = match self.resolver.mx_lookup(domain.as_str()).await {
            Ok(lookup) => lookup.iter().next().is_some(),
            Err(e) => match classify(&domain, &e) {
                Some(failure) => return Err(failure),
                None => false,
            },
        };

        let host_exists = has_mx || self.host_exists(&domain).await?;
        if !host_exists {
            return Err(ProbeFailure::host_not_found(&domain));
        }

        tracing::debug!(target: "probe", "[{}] mx={} host={}", address, has_mx, host_exists);
        Ok(Some(ProbeResult {
            syntax_valid: true,
            reachable: "unknown".to_string(),
            deliverable: has_mx,
            host_exists,
            has_mx_records: has_mx,
            disposable: is_disposable(&domain),
            catch_all: false,
            inbox_full: false,
        }))
    }
}
