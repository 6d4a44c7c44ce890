//! # Scan Target Model
//!
//! A [`Target`] is a resolved address the prober sends datagrams to.
//! A [`TargetSpec`] is what the user typed before resolution:
//! * A single IP address (`192.168.1.5`, `::1`).
//! * A hostname (`ntp.example.org`), resolved through the system resolver.
//! * An IPv4 range (`192.168.1.1-100`, `10.0.0.1-10.0.1.20`).
//! * A CIDR block (`192.168.1.0/24`).
//! * A comma separated mix of the above.

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::TargetError;
use crate::network::range::{self, Ipv4Range};

/// Upper bound on the addresses a single range or CIDR block may expand to.
pub const MAX_RANGE_LEN: u64 = 1024;

/// A resolved address, optionally remembering the name it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub addr: IpAddr,
    pub hostname: Option<String>,
}

impl Target {
    pub fn new(addr: IpAddr) -> Self {
        Self {
            addr,
            hostname: None,
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

impl From<IpAddr> for Target {
    fn from(addr: IpAddr) -> Self {
        Self::new(addr)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hostname {
            Some(name) => write!(f, "{name} ({})", self.addr),
            None => write!(f, "{}", self.addr),
        }
    }
}

/// Unresolved target as written by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetSpec {
    /// A single literal address.
    Host { target_addr: IpAddr },
    /// A name that still needs a resolver lookup.
    Hostname { name: String },
    /// A span of IPv4 addresses.
    Range { ipv4_range: Ipv4Range },
    /// Holds a list of different specs
    Multi { specs: Vec<TargetSpec> },
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.contains(',') {
            return parse_commas(s);
        }

        if let Some(spec) = parse_host(s) {
            return Ok(spec);
        }

        if let Some(spec) = parse_cidr_range(s)? {
            return Ok(spec);
        }

        if let Some(spec) = parse_ip_range(s)? {
            return Ok(spec);
        }

        if is_hostname(s) {
            return Ok(TargetSpec::Hostname {
                name: s.to_string(),
            });
        }

        Err(TargetError::Invalid(s.to_string()))
    }
}

impl TargetSpec {
    /// Expands the spec into a deduplicated, order-preserving list of targets.
    pub fn resolve(self) -> Result<Vec<Target>, TargetError> {
        let mut targets: Vec<Target> = Vec::new();
        let mut seen: HashSet<IpAddr> = HashSet::new();
        resolve_into(self, &mut targets, &mut seen)?;
        debug!("{} target(s) resolved", targets.len());
        Ok(targets)
    }

    /// Reads one spec per line, ignoring blank lines and `#` comments.
    ///
    /// Lines that fail to parse are skipped with a warning.
    pub fn from_hosts_file(path: &Path) -> Result<Self, TargetError> {
        let content = std::fs::read_to_string(path).map_err(|e| TargetError::HostsFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut specs: Vec<TargetSpec> = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<TargetSpec>() {
                Ok(spec) => specs.push(spec),
                Err(e) => warn!("{}:{}: {e}", path.display(), line_num + 1),
            }
        }

        Ok(TargetSpec::Multi { specs })
    }
}

fn resolve_into(
    spec: TargetSpec,
    targets: &mut Vec<Target>,
    seen: &mut HashSet<IpAddr>,
) -> Result<(), TargetError> {
    match spec {
        TargetSpec::Host { target_addr } => {
            if seen.insert(target_addr) {
                targets.push(Target::new(target_addr));
            }
        }
        TargetSpec::Hostname { name } => {
            let addr = lookup_host(&name)?;
            if seen.insert(addr) {
                targets.push(Target::new(addr).with_hostname(name));
            }
        }
        TargetSpec::Range { ipv4_range } => {
            for addr in ipv4_range.to_iter() {
                if seen.insert(addr) {
                    targets.push(Target::new(addr));
                }
            }
        }
        TargetSpec::Multi { specs } => {
            for spec in specs {
                resolve_into(spec, targets, seen)?;
            }
        }
    }
    Ok(())
}

/// Prefers an IPv4 answer, since most legacy UDP services only listen there.
fn lookup_host(name: &str) -> Result<IpAddr, TargetError> {
    let addrs: Vec<IpAddr> = (name, 0)
        .to_socket_addrs()
        .map_err(|_| TargetError::Unresolved(name.to_string()))?
        .map(|sock_addr| sock_addr.ip())
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| TargetError::Unresolved(name.to_string()))
}

/// Parses a comma-separated list of specs (e.g., "192.168.1.5, 10.0.0.1-50").
fn parse_commas(s: &str) -> Result<TargetSpec, TargetError> {
    let mut specs = Vec::new();

    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        specs.push(TargetSpec::from_str(part)?);
    }

    Ok(TargetSpec::Multi { specs })
}

fn parse_host(s: &str) -> Option<TargetSpec> {
    s.parse::<IpAddr>()
        .ok()
        .map(|target_addr| TargetSpec::Host { target_addr })
}

/// Parses a range string like "1.1.1.1-2.2.2.2" or "1.1.1.1-50".
fn parse_ip_range(s: &str) -> Result<Option<TargetSpec>, TargetError> {
    let Some((start_str, end_str)) = s.split_once('-') else {
        return Ok(None);
    };

    // "my-host.example" is a hostname, not a range.
    let Ok(start_addr) = start_str.trim().parse::<Ipv4Addr>() else {
        return Ok(None);
    };

    let end_addr = parse_range_end_addr(end_str.trim(), &start_addr, s)?;

    let ipv4_range = Ipv4Range::new(start_addr, end_addr);
    check_range(&ipv4_range, s)?;
    Ok(Some(TargetSpec::Range { ipv4_range }))
}

/// Helper to parse the end address of a range.
///
/// Handles abbreviated forms like "192.168.1.1-50" (implies 192.168.1.50)
/// and full forms like "192.168.1.1-192.168.1.255".
fn parse_range_end_addr(
    end_str: &str,
    start_addr: &Ipv4Addr,
    original_s: &str,
) -> Result<Ipv4Addr, TargetError> {
    if let Ok(full_addr) = end_str.parse::<Ipv4Addr>() {
        return Ok(full_addr);
    }

    let range_err = |reason: String| TargetError::Range {
        spec: original_s.to_string(),
        reason,
    };

    if end_str.is_empty() {
        return Err(range_err("end of range is empty".into()));
    }

    let partial_octets: Vec<u8> = end_str
        .split('.')
        .map(|octet_str| octet_str.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| range_err(format!("invalid end '{end_str}': {e}")))?;

    if partial_octets.len() > 4 {
        return Err(range_err(format!("too many octets in '{end_str}'")));
    }

    let mut end_octets = start_addr.octets();
    let start_index = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

/// Parses CIDR notation like "192.168.1.0/24".
fn parse_cidr_range(s: &str) -> Result<Option<TargetSpec>, TargetError> {
    let Some((ip_str, prefix_str)) = s.split_once('/') else {
        return Ok(None);
    };

    let range_err = |reason: String| TargetError::Range {
        spec: s.to_string(),
        reason,
    };

    let ipv4_addr = ip_str
        .parse::<Ipv4Addr>()
        .map_err(|e| range_err(format!("invalid address '{ip_str}': {e}")))?;

    let prefix = prefix_str
        .parse::<u8>()
        .map_err(|e| range_err(format!("invalid prefix '{prefix_str}': {e}")))?;

    let ipv4_range = range::cidr_range(ipv4_addr, prefix).map_err(|e| range_err(e.to_string()))?;
    check_range(&ipv4_range, s)?;

    Ok(Some(TargetSpec::Range { ipv4_range }))
}

fn check_range(ipv4_range: &Ipv4Range, s: &str) -> Result<(), TargetError> {
    if ipv4_range.is_empty() {
        return Err(TargetError::Range {
            spec: s.to_string(),
            reason: "end address is before start address".into(),
        });
    }
    if ipv4_range.len() > MAX_RANGE_LEN {
        return Err(TargetError::TooLarge {
            spec: s.to_string(),
            len: ipv4_range.len(),
            max: MAX_RANGE_LEN,
        });
    }
    Ok(())
}

fn is_hostname(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 253
        && s.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && s
            .rsplit('.')
            .next()
            .is_some_and(|tld| !tld.chars().all(|c| c.is_ascii_digit()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
