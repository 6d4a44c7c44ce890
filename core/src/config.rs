use std::time::Duration;

use thiserror::Error;
use udprobe_common::config::ProbeOptions;
use udprobe_common::network::port::PortList;
use udprobe_protocols::Protocol;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_CONCURRENCY: usize = 100;
pub const DEFAULT_SENDS_PER_SECOND: u32 = 100;
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("no ports to probe")]
    NoPorts,
}

/// Delay inserted before a retry of the same probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `step * n` before the n-th retry.
    Linear(Duration),
}

impl Backoff {
    /// Delay before retry number `retry` (1-based). The first attempt never
    /// waits.
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Linear(step) => step.saturating_mul(retry),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Linear(DEFAULT_BACKOFF_STEP)
    }
}

/// Everything the engine needs to know about a run. Built by the caller, the
/// engine never looks at command line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Wait for the first reply datagram of a single attempt.
    pub timeout: Duration,
    /// Extra attempts of the same probe after a timeout.
    pub max_retries: u32,
    pub max_concurrency: usize,
    /// Global send budget. `0` disables pacing.
    pub max_sends_per_second: u32,
    pub ports: PortList,
    /// Probe every port with this protocol instead of the registry's choice.
    pub protocol_override: Option<Protocol>,
    pub backoff: Backoff,
    pub probe_options: ProbeOptions,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_RETRIES,
            max_concurrency: DEFAULT_CONCURRENCY,
            max_sends_per_second: DEFAULT_SENDS_PER_SECOND,
            ports: PortList::common(),
            protocol_override: None,
            backoff: Backoff::default(),
            probe_options: ProbeOptions::default(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.ports.as_slice().is_empty() {
            return Err(ConfigError::NoPorts);
        }
        Ok(())
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

    #[test]
    fn defaults_are_valid() {
        let config = ScanConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn rejects_degenerate_settings() {
        let zero_timeout = ScanConfig {
            timeout: Duration::ZERO,
            ..ScanConfig::default()
        };
        assert_eq!(zero_timeout.validate(), Err(ConfigError::ZeroTimeout));

        let zero_workers = ScanConfig {
            max_concurrency: 0,
            ..ScanConfig::default()
        };
        assert_eq!(zero_workers.validate(), Err(ConfigError::ZeroConcurrency));

        let no_ports = ScanConfig {
            ports: PortList::from(Vec::new()),
            ..ScanConfig::default()
        };
        assert_eq!(no_ports.validate(), Err(ConfigError::NoPorts));

        let unlimited = ScanConfig {
            max_sends_per_second: 0,
            ..ScanConfig::default()
        };
        assert_eq!(unlimited.validate(), Ok(()));
    }

    #[test]
    fn backoff_delays() {
        let step = Duration::from_millis(100);
        assert_eq!(Backoff::Linear(step).delay(0), Duration::ZERO);
        assert_eq!(Backoff::Linear(step).delay(1), step);
        assert_eq!(Backoff::Linear(step).delay(3), Duration::from_millis(300));
        assert_eq!(Backoff::Fixed(step).delay(3), step);
    }
}
