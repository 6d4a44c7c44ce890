use udprobe_common::config::ProbeOptions;

use crate::probe::{self, Details, ProbeRequest, Verdict};
use crate::Protocol;

const OPCODE_RRQ: u16 = 1;
const OPCODE_DATA: u16 = 3;
const OPCODE_ERROR: u16 = 5;

/// Read request (RRQ) for the configured file in octet mode.
pub fn build_request(options: &ProbeOptions) -> ProbeRequest {
    let mut packet: Vec<u8> = OPCODE_RRQ.to_be_bytes().to_vec();
    packet.extend_from_slice(options.tftp_filename.as_bytes());
    packet.push(0);
    packet.extend_from_slice(b"octet");
    packet.push(0);
    ProbeRequest::new(Protocol::Tftp, packet)
}

/// Servers answer an RRQ with the first DATA block or an ERROR packet.
pub fn parse_response(raw: &[u8]) -> Verdict {
    let (Some(opcode), Some(field)) = (probe::be_u16(raw, 0), probe::be_u16(raw, 2)) else {
        return Verdict::mismatch(Protocol::Tftp, "shorter than a TFTP header");
    };
    let body = &raw[4..];

    let details = match opcode {
        OPCODE_DATA => Details::new(Protocol::Tftp)
            .with("response_type", "DATA")
            .with("block", field)
            .with("data_size", body.len()),
        OPCODE_ERROR => {
            let message = body.split(|b| *b == 0).next().unwrap_or_default();
            let mut details = Details::new(Protocol::Tftp)
                .with("response_type", "ERROR")
                .with("error_code", field);
            if !message.is_empty() {
                details.insert("error_message", probe::sample(&String::from_utf8_lossy(message), 80));
            }
            details
        }
        other => {
            return Verdict::mismatch(Protocol::Tftp, format!("unexpected opcode {other}"));
        }
    };

    Verdict::Valid(details)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
