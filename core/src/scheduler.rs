//! # Scheduler
//!
//! Fans `(target, port)` jobs out across a fixed pool of workers.
//!
//! Jobs travel through a bounded queue shared by all workers. Each worker
//! keeps the results it produced and hands them back when it exits; the
//! merge after joining every worker is the only synchronisation point the
//! caller sees. Result order is unspecified, see
//! [`sort_results`](crate::result::sort_results).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use udprobe_common::network::target::Target;
use udprobe_protocols::ProbeRegistry;

use crate::config::{ConfigError, ScanConfig};
use crate::network::transport::Transport;
use crate::ratelimit::RateLimiter;
use crate::result::ServiceResult;

mod job;

pub use job::ProbeJob;
use job::JobRun;

/// Called once per finished job, from the worker that finished it.
pub type ResultCallback = Arc<dyn Fn(&ServiceResult) + Send + Sync>;

/// Run-wide cancellation flag. Cheap to clone, all clones share the flag.
///
/// Checked before a worker takes up a job and before every retry or
/// fallback probe. A socket wait in progress is left to run out.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared, read-only state every worker sees.
pub(crate) struct WorkerContext {
    pub(crate) config: ScanConfig,
    pub(crate) registry: ProbeRegistry,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) stop: StopSignal,
    on_result: Option<ResultCallback>,
}

pub struct Scheduler {
    config: ScanConfig,
    registry: ProbeRegistry,
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    stop: StopSignal,
    on_result: Option<ResultCallback>,
}

impl Scheduler {
    /// Validates `config` and sets up a limiter for its send rate.
    pub fn new(config: ScanConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;
        let limiter = Arc::new(RateLimiter::new(config.max_sends_per_second));
        Ok(Self {
            config,
            registry: ProbeRegistry::default(),
            transport,
            limiter,
            stop: StopSignal::new(),
            on_result: None,
        })
    }

    pub fn with_registry(mut self, registry: ProbeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Shares a limiter with other schedulers instead of the private one.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn on_result(mut self, callback: ResultCallback) -> Self {
        self.on_result = Some(callback);
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Probes every configured port on every target.
    ///
    /// Returns one result per job a worker took up. Jobs still queued when
    /// the stop signal trips produce nothing.
    pub async fn run(self, targets: Vec<Target>) -> Vec<ServiceResult> {
        let jobs: Vec<ProbeJob> = targets
            .into_iter()
            .flat_map(|target| {
                self.config
                    .ports
                    .as_slice()
                    .iter()
                    .map(move |port| ProbeJob::new(target.clone(), *port))
            })
            .map(|job| job.with_protocol_hint(self.config.protocol_override))
            .collect();

        if jobs.is_empty() {
            return Vec::new();
        }

        let worker_count = self.config.max_concurrency.min(jobs.len());
        info!("Probing {} jobs with {worker_count} workers", jobs.len());

        let ctx = Arc::new(WorkerContext {
            config: self.config,
            registry: self.registry,
            transport: self.transport,
            limiter: self.limiter,
            stop: self.stop,
            on_result: self.on_result,
        });

        let (job_tx, job_rx) = mpsc::channel::<ProbeJob>(worker_count * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            workers.spawn(worker(id, ctx.clone(), job_rx.clone()));
        }

        for job in jobs {
            if ctx.stop.is_stopped() {
                debug!("Stop requested, not dispatching remaining jobs");
                break;
            }
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let mut results = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(batch) => results.extend(batch),
                Err(e) => error!("Probe worker failed: {e}"),
            }
        }
        results
    }
}

async fn worker(
    id: usize,
    ctx: Arc<WorkerContext>,
    jobs: Arc<Mutex<mpsc::Receiver<ProbeJob>>>,
) -> Vec<ServiceResult> {
    let mut results = Vec::new();
    loop {
        let next = { jobs.lock().await.recv().await };
        let Some(job) = next else {
            break;
        };
        if ctx.stop.is_stopped() {
            continue;
        }

        let result = JobRun::new(job, &ctx).run().await;
        if let Some(callback) = &ctx.on_result {
            callback(&result);
        }
        results.push(result);
    }
    debug!("Worker {id} done after {} jobs", results.len());
    results
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
