use anyhow::Context;
use dns_parser::{Packet, RData};
use pnet::packet::dns::{DnsClass, DnsType, DnsTypes, MutableDnsPacket, Opcode, Retcode};
use tracing::trace;

use udprobe_common::config::ProbeOptions;

use crate::probe::{self, Correlation, Details, ProbeRequest, Verdict};
use crate::Protocol;

pub const DNS_HDR_LEN: usize = 12;

const VERSION_BIND: &str = "version.bind";
const CLASS_IN: DnsClass = DnsClass(1);
const CLASS_CHAOS: DnsClass = DnsClass(3);
const FLAG_RESPONSE: u16 = 0x8000;

/// Asks for `version.bind` (CHAOS/TXT), or an IN/A record when a name is set.
pub fn build_request(options: &ProbeOptions) -> ProbeRequest {
    let id: u16 = rand::random();
    let (qname, qtype, qclass) = match &options.dns_name {
        Some(name) => (name.as_str(), DnsTypes::A, CLASS_IN),
        None => (VERSION_BIND, DnsTypes::TXT, CLASS_CHAOS),
    };

    ProbeRequest::new(Protocol::Dns, create_query_packet(qname, qtype, qclass, id))
        .with_correlation(Correlation::DnsId(id))
}

pub fn parse_response(request: &ProbeRequest, raw: &[u8]) -> Verdict {
    let (Some(id), Some(flags), Some(questions), Some(answers)) = (
        probe::be_u16(raw, 0),
        probe::be_u16(raw, 2),
        probe::be_u16(raw, 4),
        probe::be_u16(raw, 6),
    ) else {
        return Verdict::mismatch(Protocol::Dns, "shorter than a DNS header");
    };

    if flags & FLAG_RESPONSE == 0 {
        return Verdict::mismatch(Protocol::Dns, "response bit not set");
    }
    if questions == 0 && answers == 0 {
        return Verdict::mismatch(Protocol::Dns, "no question or answer records");
    }

    let rcode = flags & 0x000F;
    let mut details = Details::new(Protocol::Dns)
        .with("response_code", rcode)
        .with("response_code_name", rcode_name(rcode))
        .with("questions", questions)
        .with("answers", answers);

    if let Some(query) = request.payload.get(DNS_HDR_LEN..).and_then(decode_dns_name) {
        details.insert("query", query);
    }

    if answers > 0 {
        match extract_answers(raw) {
            Ok(found) => {
                if let Some(version) = found.version {
                    details.insert("version", probe::sample(&version, 120));
                }
                if let Some(address) = found.address {
                    details.insert("address", address);
                }
            }
            Err(e) => trace!("DNS answers not decodable: {e:#}"),
        }
    }

    let expected = match request.correlation {
        Correlation::DnsId(expected) => expected,
        _ => id,
    };
    Verdict::correlated(details, id == expected)
}

#[derive(Debug, Default)]
struct Answers {
    version: Option<String>,
    address: Option<String>,
}

fn extract_answers(raw: &[u8]) -> anyhow::Result<Answers> {
    let packet = Packet::parse(raw).context("failed to parse DNS answers")?;
    let mut found = Answers::default();

    for record in &packet.answers {
        match &record.data {
            RData::TXT(txt) if found.version.is_none() => {
                let text: String = txt.iter().map(String::from_utf8_lossy).collect();
                found.version = Some(text);
            }
            RData::A(a) if found.address.is_none() => {
                found.address = Some(a.0.to_string());
            }
            _ => {}
        }
    }

    Ok(found)
}

fn rcode_name(rcode: u16) -> &'static str {
    match rcode {
        0 => "NOERROR",
        1 => "FORMERR",
        2 => "SERVFAIL",
        3 => "NXDOMAIN",
        4 => "NOTIMP",
        5 => "REFUSED",
        _ => "UNKNOWN",
    }
}

fn create_query_packet(qname: &str, qtype: DnsType, qclass: DnsClass, id: u16) -> Vec<u8> {
    let qname: Vec<u8> = encode_dns_name(qname);
    let q_fixed_len: usize = 4;
    let total: usize = DNS_HDR_LEN + qname.len() + q_fixed_len;
    let mut buffer: Vec<u8> = vec![0u8; total];

    if let Some(mut dns) = MutableDnsPacket::new(&mut buffer) {
        dns.set_id(id);
        dns.set_is_response(0);
        dns.set_opcode(Opcode::StandardQuery);
        dns.set_is_authoriative(0);
        dns.set_is_truncated(0);
        dns.set_is_recursion_desirable(1);
        dns.set_is_recursion_available(0);
        dns.set_zero_reserved(0);
        dns.set_is_non_authenticated_data(0);
        dns.set_rcode(Retcode::NoError);
        dns.set_query_count(1);
        dns.set_response_count(0);
        dns.set_authority_rr_count(0);
        dns.set_additional_rr_count(0);
    }

    // Manually Write the Query Bytes into the buffer
    let mut cursor: usize = DNS_HDR_LEN;

    buffer[cursor..cursor + qname.len()].copy_from_slice(&qname);
    cursor += qname.len();

    buffer[cursor..cursor + 2].copy_from_slice(&qtype.0.to_be_bytes());
    cursor += 2;

    buffer[cursor..cursor + 2].copy_from_slice(&qclass.0.to_be_bytes());

    buffer
}

/// Labels longer than 63 bytes are cut to fit the wire format.
fn encode_dns_name(name: &str) -> Vec<u8> {
    let mut encoded: Vec<u8> = Vec::new();
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        let bytes = &label.as_bytes()[..label.len().min(63)];
        encoded.push(bytes.len() as u8);
        encoded.extend_from_slice(bytes);
    }
    encoded.push(0);
    encoded
}

/// Reads uncompressed labels up to the root label.
pub(crate) fn decode_dns_name(data: &[u8]) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    let mut cursor: usize = 0;
    loop {
        let len: usize = *data.get(cursor)? as usize;
        if len == 0 {
            break;
        }
        cursor += 1;
        let label_bytes: &[u8] = data.get(cursor..cursor + len)?;
        parts.push(std::str::from_utf8(label_bytes).ok()?);
        cursor += len;
    }
    Some(parts.join("."))
}

/// Offset just past the (possibly compressed) name starting at `offset`.
pub(crate) fn skip_name(raw: &[u8], mut offset: usize) -> Option<usize> {
    loop {
        let len = *raw.get(offset)?;
        match len {
            0 => return Some(offset + 1),
            l if l & 0xC0 == 0xC0 => {
                raw.get(offset + 1)?;
                return Some(offset + 2);
            }
            l => offset += 1 + l as usize,
        }
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
