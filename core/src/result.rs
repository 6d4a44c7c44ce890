use std::fmt;

use udprobe_common::network::target::Target;
use udprobe_protocols::{Details, Protocol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PortStatus {
    /// A reply passed protocol validation.
    Open,
    /// ICMP port unreachable.
    Closed,
    /// Silence, or bytes that no candidate probe accepted.
    Unknown,
    /// The attempt could not be carried out locally.
    Error,
}

impl PortStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortStatus::Open => "open",
            PortStatus::Closed => "closed",
            PortStatus::Unknown => "unknown",
            PortStatus::Error => "error",
        }
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one `(target, port)` job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResult {
    pub target: Target,
    pub port: u16,
    pub status: PortStatus,
    /// Probe that produced `details`, if any did.
    pub protocol: Option<Protocol>,
    pub details: Details,
    /// Size of the reply datagram behind this result.
    pub response_size: Option<usize>,
    /// Datagrams sent for this job across retries and candidates.
    pub attempts: u32,
}

impl ServiceResult {
    pub fn new(target: Target, port: u16, status: PortStatus) -> Self {
        Self {
            target,
            port,
            status,
            protocol: None,
            details: Details::default(),
            response_size: None,
            attempts: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }
}

/// Orders results by address, then port.
pub fn sort_results(results: &mut [ServiceResult]) {
    results.sort_by(|a, b| (a.target.addr, a.port).cmp(&(b.target.addr, b.port)));
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub open: usize,
    pub closed: usize,
    pub unknown: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.open + self.closed + self.unknown + self.error
    }
}

impl<'a> FromIterator<&'a ServiceResult> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = &'a ServiceResult>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for result in iter {
            match result.status {
                PortStatus::Open => counts.open += 1,
                PortStatus::Closed => counts.closed += 1,
                PortStatus::Unknown => counts.unknown += 1,
                PortStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn result(last_octet: u8, port: u16, status: PortStatus) -> ServiceResult {
        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet));
        ServiceResult::new(Target::new(addr), port, status)
    }

    #[test]
    fn sorts_by_address_then_port() {
        let mut results = vec![
            result(9, 53, PortStatus::Open),
            result(2, 161, PortStatus::Closed),
            result(2, 53, PortStatus::Unknown),
        ];
        sort_results(&mut results);
        let order: Vec<(u8, u16)> = results
            .iter()
            .map(|r| match r.target.addr {
                IpAddr::V4(v4) => (v4.octets()[3], r.port),
                IpAddr::V6(_) => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec![(2, 53), (2, 161), (9, 53)]);
    }

    #[test]
    fn counts_statuses() {
        let results = [
            result(1, 1, PortStatus::Open),
            result(1, 2, PortStatus::Open),
            result(1, 3, PortStatus::Closed),
            result(1, 4, PortStatus::Error),
        ];
        let counts: StatusCounts = results.iter().collect();
        assert_eq!(counts.open, 2);
        assert_eq!(counts.closed, 1);
        assert_eq!(counts.unknown, 0);
        assert_eq!(counts.total(), 4);
    }
}
