//! Per-job retry state machine.
//!
//! ```text
//! Pending ──send──▶ Sent ──┬─ Succeeded ───────────────▶ Done (open)
//!    ▲                     ├─ Unreachable ─────────────▶ Done (closed)
//!    │                     ├─ Fault ───────────────────▶ Done (error)
//!    │                     ├─ TimedOut, exhausted ─────▶ Done (unknown)
//!    ├──── retry ──────────┤  TimedOut, retries left
//!    └──── next probe ─────┴─ Mismatch │ Weak
//! ```
//!
//! Only a reply that fails validation moves on to the next candidate. Silence
//! ends the job once its retries are spent. Either way the job ends as
//! `unknown` with the best evidence seen on the way, and an ICMP refusal that
//! follows an earlier reply does not override that reply.

use std::net::SocketAddr;

use tokio::time::Instant;
use tracing::{debug, trace, warn};
use udprobe_common::network::target::Target;
use udprobe_protocols::{Details, Protocol, Verdict};

use super::WorkerContext;
use crate::network::transport::{ProbeResponse, TransportError};
use crate::result::{PortStatus, ServiceResult};

/// One `(target, port)` pair of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeJob {
    pub target: Target,
    pub port: u16,
    pub protocol_hint: Option<Protocol>,
}

impl ProbeJob {
    pub fn new(target: Target, port: u16) -> Self {
        Self {
            target,
            port,
            protocol_hint: None,
        }
    }

    pub fn with_protocol_hint(mut self, protocol: Option<Protocol>) -> Self {
        self.protocol_hint = protocol;
        self
    }

    fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.target.addr, self.port)
    }
}

/// What a single datagram exchange amounted to.
#[derive(Debug)]
pub(crate) enum Outcome {
    Succeeded { details: Details, size: usize },
    TimedOut,
    Unreachable,
    Mismatch { size: usize, weak: Option<Details> },
    Fault(TransportError),
}

#[derive(Debug)]
pub(crate) enum JobState {
    Pending { candidate: usize, retry: u32 },
    Sent { candidate: usize, retry: u32, outcome: Outcome },
    Done(ServiceResult),
}

/// Best non-validated reply seen so far. A weak reply beats raw bytes.
#[derive(Debug, Default)]
struct Evidence {
    weak: Option<(Protocol, Details, usize)>,
    raw_size: Option<usize>,
}

pub(crate) struct JobRun<'a> {
    job: ProbeJob,
    candidates: Vec<Protocol>,
    ctx: &'a WorkerContext,
    attempts: u32,
    evidence: Evidence,
}

impl<'a> JobRun<'a> {
    pub(crate) fn new(job: ProbeJob, ctx: &'a WorkerContext) -> Self {
        if job.protocol_hint.is_none() && !ctx.registry.is_registered(job.port) {
            trace!("Port {} has no registered probe, using fallback", job.port);
        }
        let candidates = ctx.registry.candidates(job.port, job.protocol_hint);
        Self {
            job,
            candidates,
            ctx,
            attempts: 0,
            evidence: Evidence::default(),
        }
    }

    /// Drives the job to a terminal result. Always returns exactly one.
    pub(crate) async fn run(mut self) -> ServiceResult {
        let mut state = JobState::Pending {
            candidate: 0,
            retry: 0,
        };
        loop {
            state = match state {
                JobState::Pending { candidate, retry } => self.send(candidate, retry).await,
                JobState::Sent {
                    candidate,
                    retry,
                    outcome,
                } => self.advance(candidate, retry, outcome),
                JobState::Done(result) => return result,
            };
        }
    }

    async fn send(&mut self, candidate: usize, retry: u32) -> JobState {
        let Some(protocol) = self.candidates.get(candidate).copied() else {
            return JobState::Done(self.exhausted());
        };

        if self.attempts > 0 && self.ctx.stop.is_stopped() {
            return JobState::Done(self.cancelled());
        }
        if retry > 0 {
            tokio::time::sleep(self.ctx.config.backoff.delay(retry)).await;
            if self.ctx.stop.is_stopped() {
                return JobState::Done(self.cancelled());
            }
        }

        let request = protocol.build_request(&self.ctx.config.probe_options);
        let addr = self.job.socket_addr();

        self.ctx.limiter.acquire().await;
        self.attempts += 1;
        let sent_at = Instant::now();
        trace!("{addr} {protocol} attempt {} (retry {retry})", self.attempts);

        let outcome = match self
            .ctx
            .transport
            .send_and_wait(&request, addr, self.ctx.config.timeout)
            .await
        {
            Ok(ProbeResponse::TimedOut) => Outcome::TimedOut,
            Ok(ProbeResponse::Unreachable) => Outcome::Unreachable,
            Ok(ProbeResponse::Data(reply)) => {
                let size = reply.payload.len();
                trace!(
                    "{addr} answered {size} bytes after {:?}",
                    reply.received_at.duration_since(sent_at)
                );
                match protocol.parse_response(&request, &reply.payload) {
                    Verdict::Valid(mut details) => {
                        if reply.datagrams > 1 {
                            details.insert("datagrams", reply.datagrams);
                        }
                        Outcome::Succeeded { details, size }
                    }
                    Verdict::Weak(details) => Outcome::Mismatch {
                        size,
                        weak: Some(details),
                    },
                    Verdict::Mismatch(mismatch) => {
                        debug!("{addr}: {mismatch}");
                        Outcome::Mismatch { size, weak: None }
                    }
                }
            }
            Err(e) => Outcome::Fault(e),
        };

        JobState::Sent {
            candidate,
            retry,
            outcome,
        }
    }

    fn advance(&mut self, candidate: usize, retry: u32, outcome: Outcome) -> JobState {
        let protocol = self.candidates.get(candidate).copied();

        match outcome {
            Outcome::Succeeded { details, size } => {
                let mut result = self.result(PortStatus::Open);
                result.protocol = protocol;
                result.details = details;
                result.response_size = Some(size);
                JobState::Done(result)
            }
            Outcome::Unreachable if self.evidence.raw_size.is_some() => {
                debug!("{}: refused after an earlier reply", self.job.socket_addr());
                JobState::Done(self.exhausted())
            }
            Outcome::Unreachable => JobState::Done(self.result(PortStatus::Closed)),
            Outcome::Fault(e) => {
                warn!("{}: {e}", self.job.socket_addr());
                let mut result = self.result(PortStatus::Error);
                result.details.insert("error", e);
                JobState::Done(result)
            }
            Outcome::TimedOut if retry < self.ctx.config.max_retries => JobState::Pending {
                candidate,
                retry: retry + 1,
            },
            Outcome::TimedOut => JobState::Done(self.exhausted()),
            Outcome::Mismatch { size, weak } => {
                match (weak, protocol) {
                    (Some(details), Some(protocol)) if self.evidence.weak.is_none() => {
                        self.evidence.weak = Some((protocol, details, size));
                    }
                    _ => {}
                }
                self.evidence.raw_size.get_or_insert(size);
                JobState::Pending {
                    candidate: candidate + 1,
                    retry: 0,
                }
            }
        }
    }

    /// Every candidate was tried without a validated reply.
    fn exhausted(&mut self) -> ServiceResult {
        let mut result = self.result(PortStatus::Unknown);
        if let Some((protocol, details, size)) = self.evidence.weak.take() {
            result.protocol = Some(protocol);
            result.details = details;
            result.response_size = Some(size);
        } else if let Some(size) = self.evidence.raw_size {
            result.details.insert("response_size", size);
            result.response_size = Some(size);
        }
        result
    }

    fn cancelled(&mut self) -> ServiceResult {
        let mut result = self.exhausted();
        result.details.insert("cancelled", true);
        result
    }

    fn result(&self, status: PortStatus) -> ServiceResult {
        let mut result = ServiceResult::new(self.job.target.clone(), self.job.port, status);
        result.attempts = self.attempts;
        result
    }
}
