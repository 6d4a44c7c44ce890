use rand::distr::{Alphanumeric, SampleString};

use crate::probe::{Details, ProbeRequest, Verdict};
use crate::Protocol;

const PAYLOAD_LEN: usize = 16;

/// Random token, so a reflected datagram cannot be confused with the
/// previous probe's.
pub fn build_request() -> ProbeRequest {
    let token = Alphanumeric.sample_string(&mut rand::rng(), PAYLOAD_LEN);
    ProbeRequest::new(Protocol::Echo, token.into_bytes())
}

pub fn parse_response(request: &ProbeRequest, raw: &[u8]) -> Verdict {
    if raw != request.payload.as_slice() {
        return Verdict::mismatch(Protocol::Echo, "reply does not reflect the request");
    }
    Verdict::Valid(
        Details::new(Protocol::Echo)
            .with("echo_verified", true)
            .with("data_size", raw.len()),
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

    #[test]
    fn payload_is_alphanumeric_and_fresh() {
        let first = build_request();
        let second = build_request();
        assert_eq!(first.payload.len(), PAYLOAD_LEN);
        assert!(first.payload.iter().all(u8::is_ascii_alphanumeric));
        assert_ne!(first.payload, second.payload);
    }

    #[test]
    fn exact_reflection_is_valid() {
        let request = build_request();
        let Verdict::Valid(details) = parse_response(&request, &request.payload) else {
            panic!("reflected payload should validate");
        };
        assert_eq!(details.get("echo_verified"), Some("true"));
        assert_eq!(details.get("data_size"), Some("16"));
    }

    #[test]
    fn altered_reflection_is_a_mismatch() {
        let request = build_request();
        let mut reply = request.payload.clone();
        reply.push(b'\n');
        assert!(matches!(parse_response(&request, &reply), Verdict::Mismatch(_)));
        assert!(matches!(parse_response(&request, &reply[..8]), Verdict::Mismatch(_)));
    }
}
