pub mod probe;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use udprobe_common::config::ProbeOptions;
use udprobe_common::network::port::PortList;
use udprobe_common::network::target::TargetSpec;
use udprobe_core::{ScanConfig, config};
use udprobe_protocols::Protocol;

#[derive(Parser, Debug)]
#[command(name = "udprobe", version)]
#[command(about = "Identify UDP services by eliciting protocol-correct replies.")]
pub struct CommandLine {
    /// IPs, hostnames, ranges (10.0.0.1-20) or CIDR blocks, comma separated
    #[arg(required_unless_present = "hosts_file")]
    pub target: Option<TargetSpec>,

    /// Ports to probe: `53,123`, `160-162` or `common`
    #[arg(short, long, default_value = "common")]
    pub ports: PortList,

    /// Read additional targets from a file, one spec per line
    #[arg(long, value_name = "FILE")]
    pub hosts_file: Option<PathBuf>,

    /// Seconds to wait for a reply to each datagram
    #[arg(short, long, default_value_t = 2.0, value_name = "SECS")]
    pub timeout: f64,

    /// Retries of the same probe after a timeout
    #[arg(short, long, default_value_t = config::DEFAULT_RETRIES)]
    pub retries: u32,

    /// Jobs probed in parallel
    #[arg(short, long, default_value_t = config::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Datagrams per second across all jobs, 0 for no limit
    #[arg(long, default_value_t = config::DEFAULT_SENDS_PER_SECOND)]
    pub rate: u32,

    /// Probe every port with this protocol only
    #[arg(long, value_name = "NAME")]
    pub protocol: Option<Protocol>,

    /// Ask DNS servers for this name instead of version.bind
    #[arg(long, value_name = "NAME")]
    pub dns_name: Option<String>,

    /// SNMP community string
    #[arg(long, default_value = "public")]
    pub community: String,

    /// Also list closed, silent and failed ports
    #[arg(short, long)]
    pub all: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less output (-q no headers and warnings only, -qq summary only)
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn scan_config(&self) -> anyhow::Result<ScanConfig> {
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .with_context(|| format!("invalid timeout '{}'", self.timeout))?;

        let config = ScanConfig {
            timeout,
            max_retries: self.retries,
            max_concurrency: self.concurrency,
            max_sends_per_second: self.rate,
            ports: self.ports.clone(),
            protocol_override: self.protocol,
            probe_options: ProbeOptions {
                dns_name: self.dns_name.clone(),
                snmp_community: self.community.clone(),
                ..ProbeOptions::default()
            },
            ..ScanConfig::default()
        };
        config.validate()?;
        Ok(config)
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
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        CommandLine::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_scan_config() {
        let args = CommandLine::try_parse_from([
            "udprobe", "127.0.0.1", "-p", "53,123", "-t", "0.5", "-r", "3", "--rate", "0",
            "--protocol", "ntp", "--community", "private",
        ])
        .unwrap();
        let config = args.scan_config().unwrap();

        assert_eq!(config.ports.as_slice(), &[53, 123]);
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_sends_per_second, 0);
        assert_eq!(config.protocol_override, Some(Protocol::Ntp));
        assert_eq!(config.probe_options.snmp_community, "private");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(CommandLine::try_parse_from(["udprobe"]).is_err());
        assert!(CommandLine::try_parse_from(["udprobe", "127.0.0.1", "--protocol", "gopher"]).is_err());
        assert!(CommandLine::try_parse_from(["udprobe", "127.0.0.1", "-p", "0"]).is_err());

        let negative = CommandLine::try_parse_from(["udprobe", "127.0.0.1", "-t", "-1"]);
        if let Ok(args) = negative {
            assert!(args.scan_config().is_err());
        }
        let no_workers = CommandLine::try_parse_from(["udprobe", "127.0.0.1", "-c", "0"]).unwrap();
        assert!(no_workers.scan_config().is_err());
    }

    #[test]
    fn hosts_file_replaces_positional_target() {
        let args = CommandLine::try_parse_from(["udprobe", "--hosts-file", "hosts.txt"]).unwrap();
        assert!(args.target.is_none());
        assert_eq!(args.hosts_file, Some(PathBuf::from("hosts.txt")));
    }
}
