//! # UDP Service Probes
//!
//! Every supported service is a variant of [`Protocol`]. A variant knows how to
//! build the datagram that coaxes its service into answering and how to decide
//! whether a reply really came from that service.
//!
//! Both directions are pure: no sockets, no clocks beyond seeding per-request
//! correlation values. Decoders never panic on hostile input and report
//! anything they do not recognise as a [`Mismatch`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use udprobe_common::config::ProbeOptions;

pub mod chargen;
pub mod daytime;
pub mod dhcp;
pub mod dns;
pub mod echo;
pub mod netbios;
pub mod ntp;
pub mod probe;
pub mod registry;
pub mod snmp;
pub mod tftp;
pub mod time;

pub use probe::{Correlation, Details, Mismatch, ProbeRequest, Verdict};
pub use registry::ProbeRegistry;

/// Closed set of services the prober can fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Dns,
    Ntp,
    Tftp,
    Snmp,
    Dhcp,
    NetBios,
    Echo,
    Chargen,
    Daytime,
    Time,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown protocol '{0}'")]
pub struct UnknownProtocol(pub String);

impl Protocol {
    pub const ALL: [Protocol; 10] = [
        Protocol::Dns,
        Protocol::Ntp,
        Protocol::Tftp,
        Protocol::Snmp,
        Protocol::Dhcp,
        Protocol::NetBios,
        Protocol::Echo,
        Protocol::Chargen,
        Protocol::Daytime,
        Protocol::Time,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Dns => "DNS",
            Protocol::Ntp => "NTP",
            Protocol::Tftp => "TFTP",
            Protocol::Snmp => "SNMP",
            Protocol::Dhcp => "DHCP",
            Protocol::NetBios => "NetBIOS",
            Protocol::Echo => "Echo",
            Protocol::Chargen => "Chargen",
            Protocol::Daytime => "Daytime",
            Protocol::Time => "Time",
        }
    }

    /// Builds a fresh request. Protocols that correlate replies draw a new
    /// id or timestamp on every call.
    pub fn build_request(&self, options: &ProbeOptions) -> ProbeRequest {
        match self {
            Protocol::Dns => dns::build_request(options),
            Protocol::Ntp => ntp::build_request(),
            Protocol::Tftp => tftp::build_request(options),
            Protocol::Snmp => snmp::build_request(options),
            Protocol::Dhcp => dhcp::build_request(),
            Protocol::NetBios => netbios::build_request(),
            Protocol::Echo => echo::build_request(),
            Protocol::Chargen => chargen::build_request(),
            Protocol::Daytime => daytime::build_request(),
            Protocol::Time => time::build_request(),
        }
    }

    /// Classifies `raw` as a reply to `request`.
    ///
    /// A request built by another variant is always a mismatch.
    pub fn parse_response(&self, request: &ProbeRequest, raw: &[u8]) -> Verdict {
        if request.protocol != *self {
            return Verdict::Mismatch(Mismatch::new(*self, "request was built by another probe"));
        }

        match self {
            Protocol::Dns => dns::parse_response(request, raw),
            Protocol::Ntp => ntp::parse_response(request, raw),
            Protocol::Tftp => tftp::parse_response(raw),
            Protocol::Snmp => snmp::parse_response(request, raw),
            Protocol::Dhcp => dhcp::parse_response(request, raw),
            Protocol::NetBios => netbios::parse_response(request, raw),
            Protocol::Echo => echo::parse_response(request, raw),
            Protocol::Chargen => chargen::parse_response(raw),
            Protocol::Daytime => daytime::parse_response(raw),
            Protocol::Time => time::parse_response(raw),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Protocol::ALL
            .into_iter()
            .find(|protocol| protocol.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownProtocol(wanted.to_string()))
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
    use super::*;

    /// Deterministic byte soup, no extra crates needed.
    fn noise(seed: u32, len: usize) -> Vec<u8> {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for protocol in Protocol::ALL {
            assert_eq!(protocol.name().to_lowercase().parse::<Protocol>(), Ok(protocol));
        }
        assert!("gopher".parse::<Protocol>().is_err());
    }

    #[test]
    fn decoders_survive_arbitrary_input() {
        let options = ProbeOptions::default();
        for protocol in Protocol::ALL {
            let request = protocol.build_request(&options);
            for len in 0..600 {
                let raw = noise(len as u32, len);
                // Any verdict is fine, reaching the next iteration is the point.
                let _ = protocol.parse_response(&request, &raw);
            }
            let _ = protocol.parse_response(&request, &[0xFF; 1500]);
            let _ = protocol.parse_response(&request, &[0x00; 1500]);
        }
    }

    #[test]
    fn empty_reply_is_never_valid() {
        let options = ProbeOptions::default();
        for protocol in Protocol::ALL {
            let request = protocol.build_request(&options);
            assert!(
                matches!(protocol.parse_response(&request, &[]), Verdict::Mismatch(_)),
                "{protocol} accepted an empty datagram"
            );
        }
    }

    #[test]
    fn foreign_request_is_a_mismatch() {
        let options = ProbeOptions::default();
        let request = Protocol::Time.build_request(&options);
        let verdict = Protocol::Dns.parse_response(&request, &[0, 0, 0, 0]);
        assert!(matches!(verdict, Verdict::Mismatch(_)));
    }
}
