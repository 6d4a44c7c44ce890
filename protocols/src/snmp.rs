//! SNMPv2c GetRequest for `sysDescr.0`, with just enough BER to build the
//! request and walk the reply.

use tracing::trace;
use udprobe_common::config::ProbeOptions;

use crate::probe::{self, Correlation, Details, ProbeRequest, Verdict};
use crate::Protocol;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const PDU_GET_REQUEST: u8 = 0xA0;
const PDU_GET_RESPONSE: u8 = 0xA2;

const VERSION_2C: i64 = 1;
/// 1.3.6.1.2.1.1.1.0
const OID_SYS_DESCR: &[u8] = &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00];

pub fn build_request(options: &ProbeOptions) -> ProbeRequest {
    let request_id: i64 = rand::random_range(1..i64::from(i32::MAX));

    let varbind = encode_tlv(
        TAG_SEQUENCE,
        &[encode_tlv(TAG_OID, OID_SYS_DESCR), encode_tlv(TAG_NULL, &[])].concat(),
    );
    let pdu = encode_tlv(
        PDU_GET_REQUEST,
        &[
            encode_integer(request_id),
            encode_integer(0),
            encode_integer(0),
            encode_tlv(TAG_SEQUENCE, &varbind),
        ]
        .concat(),
    );
    let message = encode_tlv(
        TAG_SEQUENCE,
        &[
            encode_integer(VERSION_2C),
            encode_tlv(TAG_OCTET_STRING, options.snmp_community.as_bytes()),
            pdu,
        ]
        .concat(),
    );

    ProbeRequest::new(Protocol::Snmp, message)
        .with_correlation(Correlation::SnmpRequestId(request_id))
}

/// A reply must echo the request's version and community and carry a
/// GetResponse PDU. Anything past the PDU tag is best effort.
pub fn parse_response(request: &ProbeRequest, raw: &[u8]) -> Verdict {
    let Some(reply) = Message::parse(raw) else {
        return Verdict::mismatch(Protocol::Snmp, "not an SNMP message");
    };
    let Some(sent) = Message::parse(&request.payload) else {
        return Verdict::mismatch(Protocol::Snmp, "request is not an SNMP message");
    };

    if reply.version != sent.version {
        return Verdict::mismatch(
            Protocol::Snmp,
            format!("version {} does not match request", reply.version),
        );
    }
    if reply.community != sent.community {
        return Verdict::mismatch(Protocol::Snmp, "community does not match request");
    }
    if reply.pdu_tag != PDU_GET_RESPONSE {
        return Verdict::mismatch(
            Protocol::Snmp,
            format!("PDU 0x{:02X} is not a GetResponse", reply.pdu_tag),
        );
    }

    let mut details = Details::new(Protocol::Snmp)
        .with("snmp_version", version_name(reply.version))
        .with("community", String::from_utf8_lossy(reply.community))
        .with("pdu", "GetResponse");

    let Some(pdu) = Pdu::parse(reply.pdu) else {
        trace!("SNMP PDU body not decodable");
        return Verdict::Valid(details.with("payload", "opaque"));
    };

    details.insert("request_id", pdu.request_id);
    if pdu.error_status != 0 {
        details.insert("error_status", pdu.error_status);
    }
    match pdu.first_value.and_then(printable) {
        Some(text) => details.insert("sys_descr", probe::sample(&text, 160)),
        None => details.insert("payload", "opaque"),
    }

    let correlated = match request.correlation {
        Correlation::SnmpRequestId(id) => id == pdu.request_id,
        _ => true,
    };
    Verdict::correlated(details, correlated)
}

struct Message<'a> {
    version: i64,
    community: &'a [u8],
    pdu_tag: u8,
    pdu: &'a [u8],
}

impl<'a> Message<'a> {
    fn parse(raw: &'a [u8]) -> Option<Self> {
        let (outer, _) = Tlv::read(raw)?;
        if outer.tag != TAG_SEQUENCE {
            return None;
        }
        let (version, rest) = Tlv::read_tagged(outer.value, TAG_INTEGER)?;
        let (community, rest) = Tlv::read_tagged(rest, TAG_OCTET_STRING)?;
        let (pdu, _) = Tlv::read(rest)?;
        Some(Self {
            version: decode_integer(version)?,
            community,
            pdu_tag: pdu.tag,
            pdu: pdu.value,
        })
    }
}

struct Pdu<'a> {
    request_id: i64,
    error_status: i64,
    first_value: Option<Tlv<'a>>,
}

impl<'a> Pdu<'a> {
    fn parse(body: &'a [u8]) -> Option<Self> {
        let (request_id, rest) = Tlv::read_tagged(body, TAG_INTEGER)?;
        let (error_status, rest) = Tlv::read_tagged(rest, TAG_INTEGER)?;
        let (_error_index, rest) = Tlv::read_tagged(rest, TAG_INTEGER)?;
        let (varbinds, _) = Tlv::read_tagged(rest, TAG_SEQUENCE)?;

        let first_value = Tlv::read_tagged(varbinds, TAG_SEQUENCE)
            .and_then(|(varbind, _)| Tlv::read_tagged(varbind, TAG_OID))
            .and_then(|(_oid, rest)| Tlv::read(rest))
            .map(|(value, _)| value);

        Some(Self {
            request_id: decode_integer(request_id)?,
            error_status: decode_integer(error_status)?,
            first_value,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Tlv<'a> {
    tag: u8,
    value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Reads one definite-length element, returning it and the bytes after it.
    fn read(buf: &'a [u8]) -> Option<(Self, &'a [u8])> {
        let tag = *buf.first()?;
        let first_len = *buf.get(1)?;
        let (len, header) = if first_len & 0x80 == 0 {
            (first_len as usize, 2)
        } else {
            let count = (first_len & 0x7F) as usize;
            // Indefinite lengths and absurd widths are not SNMP.
            if count == 0 || count > 4 {
                return None;
            }
            let len = buf
                .get(2..2 + count)?
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | *b as usize);
            (len, 2 + count)
        };
        let value = buf.get(header..header.checked_add(len)?)?;
        Some((Self { tag, value }, &buf[header + len..]))
    }

    fn read_tagged(buf: &'a [u8], tag: u8) -> Option<(&'a [u8], &'a [u8])> {
        let (tlv, rest) = Self::read(buf)?;
        (tlv.tag == tag).then_some((tlv.value, rest))
    }
}

fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes: Vec<u8> = len
        .to_be_bytes()
        .into_iter()
        .skip_while(|b| *b == 0)
        .collect();
    let mut out = vec![0x80 | bytes.len() as u8];
    out.extend(bytes);
    out
}

fn encode_tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend(encode_length(value.len()));
    out.extend_from_slice(value);
    out
}

/// Minimal two's complement encoding.
fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    encode_tlv(TAG_INTEGER, &bytes[start..])
}

fn decode_integer(value: &[u8]) -> Option<i64> {
    if value.is_empty() || value.len() > 8 {
        return None;
    }
    let sign_fill: i64 = if value[0] & 0x80 != 0 { -1 } else { 0 };
    Some(value.iter().fold(sign_fill, |acc, b| (acc << 8) | i64::from(*b)))
}

fn printable(tlv: Tlv<'_>) -> Option<String> {
    if tlv.tag != TAG_OCTET_STRING {
        return None;
    }
    let text = std::str::from_utf8(tlv.value).ok()?.trim();
    (!text.is_empty() && !text.chars().any(|c| c.is_control() && !c.is_whitespace()))
        .then(|| text.to_string())
}

fn version_name(version: i64) -> String {
    match version {
        0 => String::from("v1"),
        1 => String::from("v2c"),
        3 => String::from("v3"),
        other => format!("unknown ({other})"),
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
