use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use colored::*;
use tracing::{Instrument, info, info_span};
use udprobe_common::network::target::{Target, TargetSpec};
use udprobe_core::{
    ResultCallback, Scheduler, ServiceResult, StatusCounts, StopSignal, UdpTransport, sort_results,
};

use super::CommandLine;
use crate::mprint;
use crate::terminal::input::InputHandle;
use crate::terminal::{colors, format, print, spinner};

pub async fn probe(args: &CommandLine) -> anyhow::Result<()> {
    let config = args.scan_config()?;
    let targets = resolve_targets(args).await?;
    if targets.is_empty() {
        anyhow::bail!("no targets to probe");
    }

    let total_jobs = targets.len() * config.ports.as_slice().len();
    print::header("probing udp services", args.quiet);
    info!(
        "{} targets x {} ports, {} workers",
        targets.len(),
        config.ports.as_slice().len(),
        config.max_concurrency
    );

    let stop = StopSignal::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.stop();
        }
    });
    let input = InputHandle::start(stop.clone());

    let span = info_span!("probe", indicatif.pb_show = true);
    spinner::start_probe_spinner(&span, input.is_interactive());

    let scheduler = Scheduler::new(config, Arc::new(UdpTransport::new()))?
        .with_stop_signal(stop.clone())
        .on_result(progress_callback(span.clone(), total_jobs));

    let start_time = Instant::now();
    let mut results = scheduler.run(targets).instrument(span).await;
    drop(input);

    if stop.is_stopped() {
        info!("Stopped early, {} of {total_jobs} jobs finished", results.len());
    }

    sort_results(&mut results);
    probe_ends(&results, start_time.elapsed(), args);
    Ok(())
}

async fn resolve_targets(args: &CommandLine) -> anyhow::Result<Vec<Target>> {
    let mut specs: Vec<TargetSpec> = args.target.iter().cloned().collect();
    if let Some(path) = &args.hosts_file {
        specs.push(TargetSpec::from_hosts_file(path)?);
    }
    let spec = TargetSpec::Multi { specs };

    // Hostname lookups block.
    let targets = tokio::task::spawn_blocking(move || spec.resolve())
        .await
        .context("target resolution panicked")??;
    Ok(targets)
}

fn progress_callback(span: tracing::Span, total: usize) -> ResultCallback {
    let done = Arc::new(AtomicUsize::new(0));
    let open = Arc::new(AtomicUsize::new(0));

    Arc::new(move |result: &ServiceResult| {
        let done = done.fetch_add(1, Ordering::Relaxed) + 1;
        let open = if result.is_open() {
            let protocol = result.protocol.map(|p| p.name()).unwrap_or("?");
            info!(
                "{}:{} answers as {}",
                format::addr_to_colored(&result.target.addr),
                result.port,
                protocol.color(colors::PROTOCOL)
            );
            open.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            open.load(Ordering::Relaxed)
        };
        spinner::report_probe_progress(&span, done, total, open);
    })
}

fn probe_ends(results: &[ServiceResult], total_time: Duration, args: &CommandLine) {
    let shown: Vec<&ServiceResult> = results
        .iter()
        .filter(|result| args.all || result.is_open())
        .collect();

    if shown.is_empty() {
        print::header("nothing answered", args.quiet);
        print::no_results();
    } else {
        if args.quiet > 0 {
            mprint!();
        }
        print::header("udp services", args.quiet);
        print_results(&shown, args.quiet);
    }

    print_summary(results.iter().collect(), total_time, args.quiet);
}

fn print_results(results: &[&ServiceResult], q_level: u8) {
    if q_level > 1 {
        return;
    }
    for (idx, result) in results.iter().enumerate() {
        print::tree_head(idx, &format::result_title(result));
        print::as_tree_one_level(format::result_to_details(result));
        if idx + 1 != results.len() {
            mprint!();
        }
    }
}

fn print_summary(counts: StatusCounts, total_time: Duration, q_level: u8) {
    let open: ColoredString = format!("{} open", counts.open).bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let rest = format!(
        "{} closed, {} unknown, {} errors",
        counts.closed, counts.unknown, counts.error
    );
    let output: ColoredString = format!(
        "Probe Complete: {open} of {} ports ({rest}) in {total_time}",
        counts.total()
    )
    .color(colors::TEXT_DEFAULT);

    match q_level {
        0 => {
            print::fat_separator();
            print::centerln(&output.to_string());
        }
        _ => {
            mprint!();
            info!("{}", output);
        }
    }
}
