//! Character generator (RFC 864). Any datagram draws a line of rotating
//! printable characters. Quote-of-the-day style services answer the same way
//! and are told apart by the shape of the text.

use crate::probe::{self, Details, ProbeRequest, Verdict};
use crate::Protocol;

/// Chargen lines are short, a full read is never needed.
pub const MAX_RESPONSE: usize = 512;
const SAMPLE_LEN: usize = 50;

pub fn build_request() -> ProbeRequest {
    ProbeRequest::new(Protocol::Chargen, vec![0x00]).with_max_response_size(MAX_RESPONSE)
}

pub fn parse_response(raw: &[u8]) -> Verdict {
    if raw.is_empty() {
        return Verdict::mismatch(Protocol::Chargen, "empty datagram");
    }
    if let Some(bad) = raw.iter().find(|b| !is_text(**b)) {
        return Verdict::mismatch(Protocol::Chargen, format!("non-printable byte 0x{bad:02X}"));
    }

    // Every byte is ASCII at this point.
    let text = String::from_utf8_lossy(raw);
    Verdict::Valid(
        Details::new(Protocol::Chargen)
            .with("data_size", raw.len())
            .with("service_type", classify(raw))
            .with("sample", probe::sample(&text, SAMPLE_LEN)),
    )
}

fn is_text(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E | b'\r' | b'\n' | b'\t')
}

/// `chargen` when most neighbouring printable characters step up by one,
/// `qotd` for sentence-like text ending in a newline, `text` otherwise.
fn classify(raw: &[u8]) -> &'static str {
    let printable: Vec<u8> = raw.iter().copied().filter(u8::is_ascii_graphic).collect();
    if printable.len() >= 8 {
        let ascending = printable
            .windows(2)
            .filter(|pair| pair[1] == pair[0].wrapping_add(1) || (pair[0] == b'~' && pair[1] == b'!'))
            .count();
        if ascending * 2 > printable.len() {
            return "chargen";
        }
    }

    let spaces = raw.iter().filter(|b| **b == b' ').count();
    if raw.ends_with(b"\n") && spaces >= 3 {
        "qotd"
    } else {
        "text"
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
