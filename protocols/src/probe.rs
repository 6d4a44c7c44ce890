use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::Protocol;

/// Largest datagram accepted from a peer unless a probe asks for less.
pub const DEFAULT_MAX_RESPONSE: usize = 4096;

/// Value drawn when a request is built, checked against the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    None,
    DnsId(u16),
    NtpTransmit(u64),
    SnmpRequestId(i64),
    DhcpXid(u32),
}

/// An immutable datagram plus what the transport needs to know to wait for
/// its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub protocol: Protocol,
    pub payload: Vec<u8>,
    pub correlation: Correlation,
    /// Read cap per datagram. Longer datagrams are truncated by the socket.
    pub max_response_size: usize,
    /// Keep listening this long after the first datagram for further replies.
    pub linger: Option<Duration>,
    /// Needs `SO_BROADCAST` on the sending socket.
    pub broadcast: bool,
}

impl ProbeRequest {
    pub fn new(protocol: Protocol, payload: Vec<u8>) -> Self {
        Self {
            protocol,
            payload,
            correlation: Correlation::None,
            max_response_size: DEFAULT_MAX_RESPONSE,
            linger: None,
            broadcast: false,
        }
    }

    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = Some(linger);
        self
    }

    pub fn with_broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }
}

/// Protocol facts extracted from a reply, keyed by conventional field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Details(BTreeMap<String, String>);

impl Details {
    /// Starts a mapping tagged with the protocol that produced it.
    pub fn new(protocol: Protocol) -> Self {
        let mut details = Self::default();
        details.insert("protocol", protocol.name());
        details
    }

    pub fn insert(&mut self, key: &str, value: impl ToString) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Bytes arrived but are not a reply of the probed protocol.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("not a {protocol} reply: {reason}")]
pub struct Mismatch {
    pub protocol: Protocol,
    pub reason: String,
}

impl Mismatch {
    pub fn new(protocol: Protocol, reason: impl Into<String>) -> Self {
        Self {
            protocol,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Reply is well formed and belongs to the request.
    Valid(Details),
    /// Reply is well formed, but its correlation value does not match the
    /// request. Kept as evidence, never reported as open.
    Weak(Details),
    Mismatch(Mismatch),
}

impl Verdict {
    pub(crate) fn mismatch(protocol: Protocol, reason: impl Into<String>) -> Self {
        Verdict::Mismatch(Mismatch::new(protocol, reason))
    }

    /// Downgrades a valid verdict when the correlation check failed.
    pub(crate) fn correlated(details: Details, matches: bool) -> Self {
        if matches {
            Verdict::Valid(details)
        } else {
            Verdict::Weak(details.with("correlation", "mismatch"))
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid(_))
    }

    pub fn details(&self) -> Option<&Details> {
        match self {
            Verdict::Valid(details) | Verdict::Weak(details) => Some(details),
            Verdict::Mismatch(_) => None,
        }
    }
}

pub(crate) fn be_u16(raw: &[u8], offset: usize) -> Option<u16> {
    let bytes = raw.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn be_u32(raw: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = raw.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

pub(crate) fn be_u64(raw: &[u8], offset: usize) -> Option<u64> {
    let bytes: [u8; 8] = raw.get(offset..offset.checked_add(8)?)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Text shown to users, cut at `max` chars with control bytes escaped.
pub(crate) fn sample(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).flat_map(char::escape_default).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}
