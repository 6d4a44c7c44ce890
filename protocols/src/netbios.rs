//! NetBIOS Name Service node status (NBSTAT) query for the wildcard name.

use crate::dns::{self, DNS_HDR_LEN};
use crate::probe::{self, Correlation, Details, ProbeRequest, Verdict};
use crate::Protocol;

const FLAG_RESPONSE: u16 = 0x8000;
const FLAG_BROADCAST: u16 = 0x0010;
const TYPE_NBSTAT: u16 = 0x0021;
const CLASS_IN: u16 = 0x0001;
const NAME_ENTRY_LEN: usize = 18;
const MAX_REPORTED_NAMES: usize = 5;

pub fn build_request() -> ProbeRequest {
    let id: u16 = rand::random();
    let mut packet = Vec::with_capacity(50);
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&FLAG_BROADCAST.to_be_bytes());
    packet.extend_from_slice(&1u16.to_be_bytes()); // questions
    packet.extend_from_slice(&[0; 6]); // answer, authority, additional
    packet.extend_from_slice(&encode_netbios_name(b"*"));
    packet.extend_from_slice(&TYPE_NBSTAT.to_be_bytes());
    packet.extend_from_slice(&CLASS_IN.to_be_bytes());

    ProbeRequest::new(Protocol::NetBios, packet).with_correlation(Correlation::DnsId(id))
}

pub fn parse_response(request: &ProbeRequest, raw: &[u8]) -> Verdict {
    let (Some(id), Some(flags), Some(questions), Some(answers)) = (
        probe::be_u16(raw, 0),
        probe::be_u16(raw, 2),
        probe::be_u16(raw, 4),
        probe::be_u16(raw, 6),
    ) else {
        return Verdict::mismatch(Protocol::NetBios, "shorter than a name service header");
    };

    if flags & FLAG_RESPONSE == 0 {
        return Verdict::mismatch(Protocol::NetBios, "response bit not set");
    }
    if answers == 0 {
        return Verdict::mismatch(Protocol::NetBios, "no answer records");
    }

    let mut details = Details::new(Protocol::NetBios).with("answers", answers);

    if let Some(table) = first_answer_rdata(raw, questions) {
        let names = node_names(table);
        if !names.is_empty() {
            details.insert("name_count", names.len());
            details.insert(
                "names",
                names
                    .iter()
                    .take(MAX_REPORTED_NAMES)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        if let Some(mac) = unit_id(table) {
            details.insert("mac", mac);
        }
    }

    let correlated = match request.correlation {
        Correlation::DnsId(sent) => sent == id,
        _ => true,
    };
    Verdict::correlated(details, correlated)
}

/// First-level encoding (RFC 1001 section 14.1): pad to 16 bytes, split each
/// byte into nibbles offset from 'A'.
fn encode_netbios_name(name: &[u8]) -> Vec<u8> {
    let mut padded = [0u8; 16];
    let len = name.len().min(padded.len());
    padded[..len].copy_from_slice(&name[..len]);

    let mut encoded = vec![32];
    for byte in padded {
        encoded.push(b'A' + (byte >> 4));
        encoded.push(b'A' + (byte & 0x0F));
    }
    encoded.push(0);
    encoded
}

fn first_answer_rdata(raw: &[u8], questions: u16) -> Option<&[u8]> {
    let mut offset = DNS_HDR_LEN;
    for _ in 0..questions {
        offset = dns::skip_name(raw, offset)? + 4;
    }
    offset = dns::skip_name(raw, offset)?;
    // type, class, ttl
    let rdlength = probe::be_u16(raw, offset + 8)? as usize;
    let start = offset + 10;
    raw.get(start..start + rdlength)
}

fn node_names(table: &[u8]) -> Vec<String> {
    let Some((&count, entries)) = table.split_first() else {
        return Vec::new();
    };
    entries
        .chunks_exact(NAME_ENTRY_LEN)
        .take(count as usize)
        .map(|entry| {
            let name = String::from_utf8_lossy(&entry[..15]);
            format!("{}<{:02X}>", name.trim_end(), entry[15])
        })
        .collect()
}

/// Six byte unit id after the name table, usually the adapter MAC.
fn unit_id(table: &[u8]) -> Option<String> {
    let count = *table.first()? as usize;
    let start = 1 + count * NAME_ENTRY_LEN;
    let mac = table.get(start..start + 6)?;
    if mac.iter().all(|b| *b == 0) {
        return None;
    }
    Some(
        mac.iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
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

    fn entry(name: &str, suffix: u8) -> Vec<u8> {
        let mut out = format!("{name:<15}").into_bytes();
        out.push(suffix);
        out.extend_from_slice(&[0x04, 0x00]);
        out
    }

    fn node_status_reply(request: &ProbeRequest) -> Vec<u8> {
        let mut reply = request.payload[..2].to_vec();
        reply.extend_from_slice(&[0x84, 0x00, 0, 0, 0, 1, 0, 0, 0, 0]);
        reply.extend_from_slice(&encode_netbios_name(b"*"));
        reply.extend_from_slice(&TYPE_NBSTAT.to_be_bytes());
        reply.extend_from_slice(&CLASS_IN.to_be_bytes());
        reply.extend_from_slice(&[0, 0, 0, 0]);

        let mut table = vec![2];
        table.extend(entry("FILESERVER", 0x00));
        table.extend(entry("WORKGROUP", 0x1E));
        table.extend_from_slice(&[0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);

        reply.extend_from_slice(&(table.len() as u16).to_be_bytes());
        reply.extend(table);
        reply
    }

    #[test]
    fn wildcard_name_encoding() {
        let encoded = encode_netbios_name(b"*");
        assert_eq!(encoded.len(), 34);
        assert_eq!(&encoded[1..3], b"CK");
        assert!(encoded[3..33].iter().all(|b| *b == b'A'));
    }

    #[test]
    fn query_layout() {
        let request = build_request();
        let raw = &request.payload;
        assert_eq!(raw.len(), DNS_HDR_LEN + 34 + 4);
        assert_eq!(probe::be_u16(raw, 2), Some(FLAG_BROADCAST));
        assert_eq!(probe::be_u16(raw, 4), Some(1));
        assert_eq!(probe::be_u16(raw, DNS_HDR_LEN + 34), Some(TYPE_NBSTAT));
    }

    #[test]
    fn node_status_names_are_listed() {
        let request = build_request();
        let Verdict::Valid(details) = parse_response(&request, &node_status_reply(&request)) else {
            panic!("node status reply should validate");
        };
        assert_eq!(details.get("names"), Some("FILESERVER<00>, WORKGROUP<1E>"));
        assert_eq!(details.get("name_count"), Some("2"));
        assert_eq!(details.get("mac"), Some("52:54:00:12:34:56"));
    }

    #[test]
    fn foreign_transaction_id_is_weak() {
        let request = build_request();
        let mut reply = node_status_reply(&request);
        reply[1] = reply[1].wrapping_add(1);
        assert!(matches!(parse_response(&request, &reply), Verdict::Weak(_)));
    }

    #[test]
    fn query_echo_is_a_mismatch() {
        let request = build_request();
        assert!(matches!(parse_response(&request, &request.payload), Verdict::Mismatch(_)));
    }

    #[test]
    fn truncated_table_keeps_header_facts() {
        let request = build_request();
        let mut reply = node_status_reply(&request);
        reply.truncate(reply.len() - 30);
        let Verdict::Valid(details) = parse_response(&request, &reply) else {
            panic!("header alone should validate");
        };
        assert!(!details.contains("names"));
        assert_eq!(details.get("answers"), Some("1"));
    }
}
