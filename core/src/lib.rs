//! # Probing Engine
//!
//! Drives protocol probes against `(target, port)` jobs: a fixed pool of
//! workers pulls jobs from a bounded queue, asks the [`ProbeRegistry`] which
//! probes to try, paces every datagram through one shared [`RateLimiter`] and
//! walks each job through an explicit retry state machine until it reaches a
//! terminal [`ServiceResult`].
//!
//! [`ProbeRegistry`]: udprobe_protocols::ProbeRegistry

pub mod config;
pub mod network;
pub mod ratelimit;
pub mod result;
pub mod scheduler;

pub use config::{Backoff, ConfigError, ScanConfig};
pub use network::transport::{ProbeResponse, Reply, Transport, TransportError, UdpTransport};
pub use ratelimit::RateLimiter;
pub use result::{PortStatus, ServiceResult, StatusCounts, sort_results};
pub use scheduler::{ProbeJob, ResultCallback, Scheduler, StopSignal};
