//! Daytime (RFC 867). The reply format is not standardised, so a handful of
//! common layouts are tried before falling back to a loose heuristic.

use chrono::{DateTime, NaiveDateTime};

use crate::probe::{self, Details, ProbeRequest, Verdict};
use crate::time::TIMESTAMP_FORMAT;
use crate::Protocol;

const MAX_TEXT_LEN: usize = 256;

/// Layouts seen in the wild, tried in order after RFC 2822 and RFC 3339.
const LAYOUTS: &[&str] = &[
    "%A, %B %d, %Y %H:%M:%S",
    "%a %b %d %H:%M:%S %Y",
    "%d %b %Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%H:%M:%S %m/%d/%Y",
];

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

pub fn build_request() -> ProbeRequest {
    ProbeRequest::new(Protocol::Daytime, vec![0x00])
}

pub fn parse_response(raw: &[u8]) -> Verdict {
    let Ok(text) = std::str::from_utf8(raw) else {
        return Verdict::mismatch(Protocol::Daytime, "not UTF-8 text");
    };
    let text = text.trim();
    if text.is_empty() {
        return Verdict::mismatch(Protocol::Daytime, "empty reply");
    }
    if text.len() > MAX_TEXT_LEN {
        return Verdict::mismatch(Protocol::Daytime, "too long for a date line");
    }

    let details = Details::new(Protocol::Daytime).with("timestamp", probe::sample(text, 80));
    if let Some(parsed) = parse_datetime(text) {
        return Verdict::Valid(details.with("parsed", parsed.format(TIMESTAMP_FORMAT)));
    }
    if looks_like_date(text) {
        return Verdict::Valid(details);
    }
    Verdict::mismatch(Protocol::Daytime, "no recognisable date or time")
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.naive_local());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_local());
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(&collapsed, layout).ok())
}

/// A month or weekday name next to something shaped like `HH:MM`.
fn looks_like_date(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    let named = MONTHS.iter().chain(WEEKDAYS.iter()).any(|name| lower.contains(name));
    let clock = lower.as_bytes().windows(5).any(|w| {
        w[0].is_ascii_digit() && w[1].is_ascii_digit() && w[2] == b':' && w[3].is_ascii_digit() && w[4].is_ascii_digit()
    });
    named && clock
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
