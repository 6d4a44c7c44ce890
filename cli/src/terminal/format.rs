use std::net::IpAddr;

use colored::*;
use udprobe_core::{PortStatus, ServiceResult};

use crate::terminal::colors;

pub type Detail = (String, ColoredString);

/// Detail keys shown first, in this order. Everything else follows sorted.
const LEADING_KEYS: &[&str] = &["version", "sys_descr", "timestamp", "service_type"];

pub fn status_to_colored(status: PortStatus) -> ColoredString {
    let color = match status {
        PortStatus::Open => colors::STATUS_OPEN,
        PortStatus::Closed => colors::STATUS_CLOSED,
        PortStatus::Unknown => colors::STATUS_UNKNOWN,
        PortStatus::Error => colors::STATUS_ERROR,
    };
    status.as_str().color(color).bold()
}

pub fn addr_to_colored(addr: &IpAddr) -> ColoredString {
    match addr {
        IpAddr::V4(v4) => v4.to_string().color(colors::IPV4_ADDR),
        IpAddr::V6(v6) => v6.to_string().color(colors::IPV6_ADDR),
    }
}

/// Tree title, e.g. `ntp.example.org (192.0.2.1):123/udp`.
pub fn result_title(result: &ServiceResult) -> String {
    format!("{}:{}/udp", result.target, result.port)
}

pub fn result_to_details(result: &ServiceResult) -> Vec<Detail> {
    let mut details: Vec<Detail> = vec![("Status".to_string(), status_to_colored(result.status))];

    if let Some(protocol) = result.protocol {
        details.push(("Protocol".to_string(), protocol.name().color(colors::PROTOCOL)));
    }

    let (mut leading, mut rest): (Vec<(&str, &str)>, Vec<(&str, &str)>) = result
        .details
        .iter()
        .filter(|(key, _)| *key != "protocol" && *key != "response_size")
        .partition(|(key, _)| LEADING_KEYS.contains(key));
    leading.sort_by_key(|(key, _)| LEADING_KEYS.iter().position(|k| k == key));
    rest.sort();

    for (key, value) in leading.into_iter().chain(rest) {
        details.push((key_to_label(key), value.normal()));
    }

    if let Some(size) = result.response_size {
        details.push(("Size".to_string(), format!("{size} bytes").normal()));
    }
    details.push(("Attempts".to_string(), result.attempts.to_string().normal()));
    details
}

/// `stratum_type` becomes `Stratum type`.
fn key_to_label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
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
    use std::net::Ipv4Addr;

    use udprobe_common::network::target::Target;
    use udprobe_protocols::{Details, Protocol};

    use super::*;

    fn labels(details: &[Detail]) -> Vec<&str> {
        details.iter().map(|(key, _)| key.as_str()).collect()
    }

    #[test]
    fn labels_are_readable() {
        assert_eq!(key_to_label("stratum_type"), "Stratum type");
        assert_eq!(key_to_label("mode"), "Mode");
        assert_eq!(key_to_label(""), "");
    }

    #[test]
    fn open_result_lists_details_in_order() {
        let target = Target::new(IpAddr::V4(Ipv4Addr::LOCALHOST)).with_hostname("ntp.local");
        let mut result = ServiceResult::new(target, 123, PortStatus::Open);
        result.protocol = Some(Protocol::Ntp);
        result.details = Details::new(Protocol::Ntp)
            .with("stratum", 2)
            .with("mode", "server")
            .with("version", "NTPv4");
        result.response_size = Some(48);
        result.attempts = 1;

        assert_eq!(result_title(&result), "ntp.local (127.0.0.1):123/udp");
        assert_eq!(
            labels(&result_to_details(&result)),
            vec!["Status", "Protocol", "Version", "Mode", "Stratum", "Size", "Attempts"]
        );
    }

    #[test]
    fn silent_result_is_short() {
        let target = Target::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let mut result = ServiceResult::new(target, 9999, PortStatus::Unknown);
        result.attempts = 2;
        assert_eq!(labels(&result_to_details(&result)), vec!["Status", "Attempts"]);
    }
}
