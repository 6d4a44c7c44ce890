//! RFC 868 Time protocol: any datagram is answered with a 32-bit big-endian
//! count of seconds since 1900-01-01T00:00:00 UTC.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::probe::{Details, ProbeRequest, Verdict};
use crate::Protocol;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// An empty datagram is the request.
pub fn build_request() -> ProbeRequest {
    ProbeRequest::new(Protocol::Time, Vec::new())
}

pub fn parse_response(raw: &[u8]) -> Verdict {
    let Ok(bytes) = <[u8; 4]>::try_from(raw) else {
        return Verdict::mismatch(
            Protocol::Time,
            format!("expected exactly 4 bytes, got {}", raw.len()),
        );
    };

    let seconds = u32::from_be_bytes(bytes);
    let Some(timestamp) = from_1900_seconds(u64::from(seconds)) else {
        return Verdict::mismatch(Protocol::Time, "timestamp out of range");
    };

    Verdict::Valid(
        Details::new(Protocol::Time)
            .with("seconds_since_1900", seconds)
            .with("timestamp", timestamp.format(TIMESTAMP_FORMAT)),
    )
}

/// Converts a 1900-epoch second count (RFC 868 and NTP era 0) to a UTC date.
pub fn from_1900_seconds(seconds: u64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let delta = TimeDelta::try_seconds(i64::try_from(seconds).ok()?)?;
    epoch.checked_add_signed(delta)
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

    fn timestamp_of(raw: &[u8]) -> String {
        match parse_response(raw) {
            Verdict::Valid(details) => details.get("timestamp").unwrap().to_string(),
            other => panic!("expected a valid verdict, got {other:?}"),
        }
    }

    #[test]
    fn unix_epoch_offset_decodes_to_1970() {
        assert_eq!(timestamp_of(&[0x83, 0xAA, 0x7E, 0x80]), "1970-01-01T00:00:00");
    }

    #[test]
    fn zero_is_the_1900_epoch() {
        assert_eq!(timestamp_of(&[0, 0, 0, 0]), "1900-01-01T00:00:00");
    }

    #[test]
    fn later_timestamp_decodes() {
        assert_eq!(timestamp_of(&[0xE8, 0xF0, 0x00, 0x00]), "2023-11-03T23:25:52");
    }

    #[test]
    fn any_other_length_is_a_mismatch() {
        for len in [0usize, 1, 3, 5, 8, 48] {
            let raw = vec![0u8; len];
            assert!(matches!(parse_response(&raw), Verdict::Mismatch(_)), "len {len}");
        }
    }

    #[test]
    fn request_is_empty() {
        assert!(build_request().payload.is_empty());
    }
}
