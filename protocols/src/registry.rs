use std::collections::HashMap;

use crate::Protocol;

/// Maps a port to the probes worth trying on it, most likely first.
#[derive(Debug, Clone)]
pub struct ProbeRegistry {
    by_port: HashMap<u16, Vec<Protocol>>,
    fallback: Vec<Protocol>,
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        let entries: &[(&[u16], &[Protocol])] = &[
            (&[7], &[Protocol::Echo]),
            (&[9, 17, 19], &[Protocol::Chargen]),
            (&[13], &[Protocol::Daytime, Protocol::Chargen]),
            (&[37], &[Protocol::Time]),
            (&[53, 5353], &[Protocol::Dns]),
            (&[67, 68], &[Protocol::Dhcp]),
            (&[69], &[Protocol::Tftp]),
            (&[123], &[Protocol::Ntp]),
            (&[137, 138], &[Protocol::NetBios]),
            (&[161, 162], &[Protocol::Snmp]),
            (&[1812, 1813, 5060], &[Protocol::Chargen]),
        ];

        let by_port = entries
            .iter()
            .flat_map(|(ports, protocols)| ports.iter().map(move |port| (*port, protocols.to_vec())))
            .collect();

        Self {
            by_port,
            fallback: vec![Protocol::Chargen],
        }
    }
}

impl ProbeRegistry {
    /// Registry with no port mappings, only the given fallback.
    pub fn empty(fallback: Vec<Protocol>) -> Self {
        Self {
            by_port: HashMap::new(),
            fallback,
        }
    }

    pub fn with_port(mut self, port: u16, protocols: Vec<Protocol>) -> Self {
        self.by_port.insert(port, protocols);
        self
    }

    pub fn with_fallback(mut self, fallback: Vec<Protocol>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Ordered candidates for `port`.
    ///
    /// A forced protocol replaces the lookup. Unregistered ports get the
    /// fallback list. Duplicates are dropped, keeping the first occurrence.
    pub fn candidates(&self, port: u16, forced: Option<Protocol>) -> Vec<Protocol> {
        if let Some(protocol) = forced {
            return vec![protocol];
        }

        let listed = self.by_port.get(&port).unwrap_or(&self.fallback);
        let mut out: Vec<Protocol> = Vec::with_capacity(listed.len());
        for protocol in listed {
            if !out.contains(protocol) {
                out.push(*protocol);
            }
        }
        out
    }

    /// Whether `port` has its own entry rather than the fallback.
    pub fn is_registered(&self, port: u16) -> bool {
        self.by_port.contains_key(&port)
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
