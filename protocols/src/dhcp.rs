//! DHCPDISCOVER from a throwaway client hardware address. Servers answer with
//! an OFFER, usually broadcast, so the transport lingers after the first
//! datagram.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::probe::{self, Correlation, Details, ProbeRequest, Verdict};
use crate::Protocol;

const OP_BOOTREQUEST: u8 = 1;
const OP_BOOTREPLY: u8 = 2;
const HTYPE_ETHERNET: u8 = 1;
const FLAG_BROADCAST: u16 = 0x8000;
const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

const OPT_PAD: u8 = 0;
const OPT_SUBNET_MASK: u8 = 1;
const OPT_ROUTER: u8 = 3;
const OPT_LEASE_TIME: u8 = 51;
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_SERVER_ID: u8 = 54;
const OPT_PARAMETER_LIST: u8 = 55;
const OPT_END: u8 = 255;

const MSG_DISCOVER: u8 = 1;

const FIXED_HEADER_LEN: usize = 236;
const OPTIONS_OFFSET: usize = FIXED_HEADER_LEN + MAGIC_COOKIE.len();
const MIN_PACKET_LEN: usize = 300;

const LINGER: Duration = Duration::from_millis(500);

pub fn build_request() -> ProbeRequest {
    let xid: u32 = rand::random();
    let mut mac: [u8; 6] = rand::random();
    // Locally administered unicast.
    mac[0] = (mac[0] | 0x02) & 0xFE;

    let mut packet = vec![0u8; FIXED_HEADER_LEN];
    packet[0] = OP_BOOTREQUEST;
    packet[1] = HTYPE_ETHERNET;
    packet[2] = mac.len() as u8;
    packet[4..8].copy_from_slice(&xid.to_be_bytes());
    packet[10..12].copy_from_slice(&FLAG_BROADCAST.to_be_bytes());
    packet[28..34].copy_from_slice(&mac);

    packet.extend_from_slice(&MAGIC_COOKIE);
    packet.extend_from_slice(&[OPT_MESSAGE_TYPE, 1, MSG_DISCOVER]);
    packet.extend_from_slice(&[
        OPT_PARAMETER_LIST,
        4,
        OPT_SUBNET_MASK,
        OPT_ROUTER,
        OPT_LEASE_TIME,
        OPT_SERVER_ID,
    ]);
    packet.push(OPT_END);
    packet.resize(MIN_PACKET_LEN, OPT_PAD);

    ProbeRequest::new(Protocol::Dhcp, packet)
        .with_correlation(Correlation::DhcpXid(xid))
        .with_broadcast()
        .with_linger(LINGER)
}

pub fn parse_response(request: &ProbeRequest, raw: &[u8]) -> Verdict {
    if raw.len() < OPTIONS_OFFSET {
        return Verdict::mismatch(Protocol::Dhcp, "shorter than a BOOTP header");
    }
    if raw[0] != OP_BOOTREPLY {
        return Verdict::mismatch(Protocol::Dhcp, format!("op {} is not BOOTREPLY", raw[0]));
    }
    let Some(xid) = probe::be_u32(raw, 4) else {
        return Verdict::mismatch(Protocol::Dhcp, "missing transaction id");
    };

    let mut details = Details::new(Protocol::Dhcp)
        .with("offered_ip", ipv4_at(raw, 16))
        .with("xid", format!("0x{xid:08x}"));

    let next_server = ipv4_at(raw, 20);
    if !next_server.is_unspecified() {
        details.insert("server_ip", next_server);
    }

    if raw[FIXED_HEADER_LEN..OPTIONS_OFFSET] == MAGIC_COOKIE {
        for (code, value) in Options::new(&raw[OPTIONS_OFFSET..]) {
            match (code, value.len()) {
                (OPT_MESSAGE_TYPE, 1) => {
                    details.insert("message_type", message_type_name(value[0]));
                }
                (OPT_SERVER_ID, 4) => details.insert("server_ip", ipv4_from(value)),
                (OPT_LEASE_TIME, 4) => {
                    if let Some(lease) = probe::be_u32(value, 0) {
                        details.insert("lease_time", lease);
                    }
                }
                (OPT_SUBNET_MASK, 4) => details.insert("subnet_mask", ipv4_from(value)),
                (OPT_ROUTER, len) if len >= 4 => details.insert("router", ipv4_from(&value[..4])),
                _ => {}
            }
        }
    }

    let correlated = match request.correlation {
        Correlation::DhcpXid(sent) => sent == xid,
        _ => true,
    };
    Verdict::correlated(details, correlated)
}

fn message_type_name(code: u8) -> &'static str {
    match code {
        MSG_DISCOVER => "DISCOVER",
        2 => "OFFER",
        3 => "REQUEST",
        4 => "DECLINE",
        5 => "ACK",
        6 => "NAK",
        7 => "RELEASE",
        8 => "INFORM",
        _ => "unknown",
    }
}

/// Walks code/length/value options, stopping at END or a truncated option.
struct Options<'a> {
    buf: &'a [u8],
}

impl<'a> Options<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for Options<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (&code, rest) = self.buf.split_first()?;
            match code {
                OPT_PAD => self.buf = rest,
                OPT_END => {
                    self.buf = &[];
                    return None;
                }
                _ => {
                    let (&len, rest) = rest.split_first()?;
                    let Some(value) = rest.get(..len as usize) else {
                        self.buf = &[];
                        return None;
                    };
                    self.buf = &rest[len as usize..];
                    return Some((code, value));
                }
            }
        }
    }
}

fn ipv4_at(raw: &[u8], offset: usize) -> Ipv4Addr {
    probe::be_u32(raw, offset)
        .map(Ipv4Addr::from)
        .unwrap_or(Ipv4Addr::UNSPECIFIED)
}

fn ipv4_from(value: &[u8]) -> Ipv4Addr {
    ipv4_at(value, 0)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
