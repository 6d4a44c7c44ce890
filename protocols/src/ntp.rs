//! NTP client/server exchange (RFC 5905), reduced to what identifies a server.

use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::probe::{self, Correlation, Details, ProbeRequest, Verdict};
use crate::time::{from_1900_seconds, TIMESTAMP_FORMAT};
use crate::Protocol;

pub const NTP_PACKET_LEN: usize = 48;

/// Seconds between 1900-01-01 and 1970-01-01.
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;
const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;
const MODE_BROADCAST: u8 = 5;
const ORIGINATE_OFFSET: usize = 24;
const TRANSMIT_OFFSET: usize = 40;

/// Version 4 client packet carrying the current time as transmit timestamp.
pub fn build_request() -> ProbeRequest {
    let transmit = ntp_now();
    let mut packet = vec![0u8; NTP_PACKET_LEN];
    packet[0] = (4 << 3) | MODE_CLIENT;
    packet[TRANSMIT_OFFSET..].copy_from_slice(&transmit.to_be_bytes());

    ProbeRequest::new(Protocol::Ntp, packet).with_correlation(Correlation::NtpTransmit(transmit))
}

pub fn parse_response(request: &ProbeRequest, raw: &[u8]) -> Verdict {
    if raw.len() < NTP_PACKET_LEN {
        return Verdict::mismatch(
            Protocol::Ntp,
            format!("{} bytes is shorter than an NTP packet", raw.len()),
        );
    }

    let li_vn_mode = raw[0];
    let version = (li_vn_mode >> 3) & 0x07;
    let mode = li_vn_mode & 0x07;
    let stratum = raw[1];
    let poll = raw[2];
    let precision = raw[3] as i8;
    let ref_id: [u8; 4] = [raw[12], raw[13], raw[14], raw[15]];
    let kiss_code = kiss_code(stratum, &ref_id);

    if !(1..=4).contains(&version) {
        return Verdict::mismatch(Protocol::Ntp, format!("unsupported version {version}"));
    }
    if mode != MODE_SERVER && mode != MODE_BROADCAST && kiss_code.is_none() {
        return Verdict::mismatch(
            Protocol::Ntp,
            format!("mode {} is not a server reply", mode_name(mode)),
        );
    }

    let mut details = Details::new(Protocol::Ntp)
        .with("version", format!("NTPv{version}"))
        .with("mode", mode_name(mode))
        .with("stratum", stratum)
        .with("stratum_type", stratum_type(stratum))
        .with("precision", precision)
        .with("poll", poll);

    match &kiss_code {
        Some(code) => details.insert("kiss_code", code),
        None => {
            if let Some(reference) = reference_id(stratum, &ref_id) {
                details.insert("reference", reference);
            }
        }
    }

    if let Some(server_time) = probe::be_u64(raw, TRANSMIT_OFFSET)
        .filter(|ts| *ts != 0)
        .and_then(|ts| from_1900_seconds(ts >> 32))
    {
        details.insert("server_time", server_time.format(TIMESTAMP_FORMAT));
    }

    // Broadcast packets are unsolicited and carry no originate timestamp.
    let correlated = match (mode, request.correlation) {
        (MODE_BROADCAST, _) => true,
        (_, Correlation::NtpTransmit(sent)) => probe::be_u64(raw, ORIGINATE_OFFSET) == Some(sent),
        _ => true,
    };

    Verdict::correlated(details, correlated)
}

/// 64-bit NTP timestamp: seconds since 1900 in the high half, fraction below.
fn ntp_now() -> u64 {
    let since_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let seconds = since_unix.as_secs() + NTP_UNIX_OFFSET;
    let fraction = (u64::from(since_unix.subsec_nanos()) << 32) / 1_000_000_000;
    (seconds << 32) | fraction
}

/// A Kiss-o'-Death packet has stratum 0 and four printable ASCII letters as
/// reference id (`RATE`, `DENY`, `RSTR`, ...).
fn kiss_code(stratum: u8, ref_id: &[u8; 4]) -> Option<String> {
    if stratum != 0 || !ref_id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
        return None;
    }
    Some(String::from_utf8_lossy(ref_id).into_owned())
}

fn reference_id(stratum: u8, ref_id: &[u8; 4]) -> Option<String> {
    if *ref_id == [0; 4] {
        return None;
    }
    if stratum <= 1 {
        let text: String = ref_id
            .iter()
            .take_while(|b| **b != 0)
            .filter(|b| b.is_ascii_graphic())
            .map(|b| *b as char)
            .collect();
        return (!text.is_empty()).then_some(text);
    }
    Some(Ipv4Addr::from(*ref_id).to_string())
}

fn stratum_type(stratum: u8) -> String {
    match stratum {
        0 => String::from("Kiss-of-Death"),
        1 => String::from("Primary reference"),
        2..=15 => format!("Secondary reference (stratum {stratum})"),
        _ => String::from("Unsynchronized"),
    }
}

fn mode_name(mode: u8) -> &'static str {
    match mode {
        1 => "Symmetric active",
        2 => "Symmetric passive",
        3 => "Client",
        4 => "Server",
        5 => "Broadcast",
        6 => "Control",
        7 => "Private",
        _ => "Reserved",
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

    fn server_reply(request: &ProbeRequest, mode: u8, stratum: u8, ref_id: &[u8; 4]) -> Vec<u8> {
        let mut reply = vec![0u8; NTP_PACKET_LEN];
        reply[0] = (4 << 3) | mode;
        reply[1] = stratum;
        reply[2] = 6;
        reply[3] = (-20i8) as u8;
        reply[12..16].copy_from_slice(ref_id);
        // Originate = client transmit.
        reply[ORIGINATE_OFFSET..ORIGINATE_OFFSET + 8]
            .copy_from_slice(&request.payload[TRANSMIT_OFFSET..]);
        reply[TRANSMIT_OFFSET..].copy_from_slice(&(0xE8F0_0000u64 << 32).to_be_bytes());
        reply
    }

    #[test]
    fn request_is_a_v4_client_packet() {
        let request = build_request();
        assert_eq!(request.payload.len(), NTP_PACKET_LEN);
        assert_eq!(request.payload[0], 0x23);
        let Correlation::NtpTransmit(sent) = request.correlation else {
            panic!("NTP request without transmit timestamp");
        };
        assert_eq!(probe::be_u64(&request.payload, TRANSMIT_OFFSET), Some(sent));
        assert!(sent >> 32 > NTP_UNIX_OFFSET);
    }

    #[test]
    fn stratum_one_server_reply_validates() {
        let request = build_request();
        let reply = server_reply(&request, MODE_SERVER, 1, b"GPS\0");

        let Verdict::Valid(details) = parse_response(&request, &reply) else {
            panic!("server reply should validate");
        };
        assert_eq!(details.get("mode"), Some("Server"));
        assert_eq!(details.get("stratum"), Some("1"));
        assert_eq!(details.get("version"), Some("NTPv4"));
        assert_eq!(details.get("reference"), Some("GPS"));
        assert_eq!(details.get("precision"), Some("-20"));
        assert_eq!(details.get("server_time"), Some("2023-11-03T23:25:52"));
    }

    #[test]
    fn secondary_reference_is_an_address() {
        let request = build_request();
        let reply = server_reply(&request, MODE_SERVER, 3, &[10, 0, 0, 1]);
        let verdict = parse_response(&request, &reply);
        assert_eq!(verdict.details().unwrap().get("reference"), Some("10.0.0.1"));
        assert!(verdict.is_valid());
    }

    #[test]
    fn kiss_of_death_is_reported() {
        let request = build_request();
        let reply = server_reply(&request, MODE_SERVER, 0, b"RATE");

        let Verdict::Valid(details) = parse_response(&request, &reply) else {
            panic!("KoD is still an NTP server");
        };
        assert_eq!(details.get("kiss_code"), Some("RATE"));
        assert_eq!(details.get("stratum_type"), Some("Kiss-of-Death"));
    }

    #[test]
    fn wrong_originate_is_weak() {
        let request = build_request();
        let mut reply = server_reply(&request, MODE_SERVER, 2, &[192, 0, 2, 1]);
        reply[ORIGINATE_OFFSET] ^= 0xFF;
        assert!(matches!(parse_response(&request, &reply), Verdict::Weak(_)));
    }

    #[test]
    fn client_mode_and_short_packets_are_mismatches() {
        let request = build_request();
        // An echo service hands our own client packet back.
        assert!(matches!(
            parse_response(&request, &request.payload),
            Verdict::Mismatch(_)
        ));
        assert!(matches!(parse_response(&request, &[0x24; 47]), Verdict::Mismatch(_)));
    }
}
