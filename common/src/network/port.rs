//! # Port Specification
//!
//! Parses the port list of a scan. Accepted forms, comma separated:
//! * single ports (`53`)
//! * inclusive ranges (`160-162`)
//! * the keyword `common`, expanding to [`COMMON_UDP_PORTS`]

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::PortSpecError;

/// UDP ports where a service usually answers a well-formed request.
pub const COMMON_UDP_PORTS: &[u16] = &[
    7, 9, 13, 17, 19, 37, // legacy services
    53, // dns
    67, 68, // dhcp
    69, // tftp
    123, // ntp
    137, 138, // netbios
    161, 162, // snmp
    389, // cldap
    514, // syslog
    1812, 1813, // radius
    5060, // sip
    5353, // mdns
];

/// Sorted, deduplicated set of ports to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortList(Vec<u16>);

impl PortList {
    pub fn common() -> Self {
        Self(COMMON_UDP_PORTS.to_vec())
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }
}

impl From<Vec<u16>> for PortList {
    /// Sorts and deduplicates. Port 0 is dropped.
    fn from(ports: Vec<u16>) -> Self {
        let set: BTreeSet<u16> = ports.into_iter().filter(|port| *port != 0).collect();
        Self(set.into_iter().collect())
    }
}

impl FromStr for PortList {
    type Err = PortSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ports: BTreeSet<u16> = BTreeSet::new();

        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            if part.eq_ignore_ascii_case("common") {
                ports.extend(COMMON_UDP_PORTS);
                continue;
            }

            match part.split_once('-') {
                Some((start, end)) => {
                    let start: u16 = parse_port(start).map_err(|_| range_err(part))?;
                    let end: u16 = parse_port(end).map_err(|_| range_err(part))?;
                    if start > end {
                        return Err(range_err(part));
                    }
                    ports.extend(start..=end);
                }
                None => {
                    ports.insert(parse_port(part)?);
                }
            }
        }

        if ports.is_empty() {
            return Err(PortSpecError::Empty);
        }

        Ok(Self(ports.into_iter().collect()))
    }
}

fn parse_port(s: &str) -> Result<u16, PortSpecError> {
    let s = s.trim();
    match s.parse::<u16>() {
        Ok(0) | Err(_) => Err(PortSpecError::Invalid(s.to_string())),
        Ok(port) => Ok(port),
    }
}

fn range_err(part: &str) -> PortSpecError {
    PortSpecError::Range(part.to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
