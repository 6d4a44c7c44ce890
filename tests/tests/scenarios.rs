use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use udprobe_common::network::target::Target;
use udprobe_core::{PortStatus, Scheduler, ServiceResult, UdpTransport};
use udprobe_integration_tests::{Behaviour, Fixture, closed_port, fast_config};
use udprobe_protocols::{ProbeRegistry, Protocol};

fn localhost() -> Target {
    Target::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Probes `ports` on loopback, treating each as the well-known port it
/// stands in for.
async fn probe(ports: &[(u16, u16)]) -> anyhow::Result<Vec<ServiceResult>> {
    let defaults = ProbeRegistry::default();
    let registry = ports.iter().fold(ProbeRegistry::default(), |registry, (port, like)| {
        registry.with_port(*port, defaults.candidates(*like, None))
    });
    let config = fast_config(ports.iter().map(|(port, _)| *port).collect());

    let results = Scheduler::new(config, Arc::new(UdpTransport::new()))?
        .with_registry(registry)
        .run(vec![localhost()])
        .await;
    Ok(results)
}

async fn probe_one(port: u16, like: u16) -> anyhow::Result<ServiceResult> {
    let mut results = probe(&[(port, like)]).await?;
    assert_eq!(results.len(), 1);
    Ok(results.remove(0))
}

#[tokio::test]
async fn time_server_reports_1900_epoch() -> anyhow::Result<()> {
    let fixture = Fixture::spawn(Behaviour::Fixed(vec![0, 0, 0, 0])).await?;
    let result = probe_one(fixture.port(), 37).await?;

    assert_eq!(result.status, PortStatus::Open);
    assert_eq!(result.protocol, Some(Protocol::Time));
    assert_eq!(result.details.get("timestamp"), Some("1900-01-01T00:00:00"));
    assert_eq!(result.response_size, Some(4));
    Ok(())
}

#[tokio::test]
async fn icmp_unreachable_is_closed_without_retries() -> anyhow::Result<()> {
    let addr = closed_port().await?;
    let result = probe_one(addr.port(), 37).await?;

    assert_eq!(result.status, PortStatus::Closed);
    assert_eq!(result.attempts, 1);
    Ok(())
}

#[tokio::test]
async fn silence_is_unknown_after_all_retries() -> anyhow::Result<()> {
    let fixture = Fixture::spawn(Behaviour::Silent).await?;
    let started = Instant::now();
    let result = probe_one(fixture.port(), 37).await?;

    assert_eq!(result.status, PortStatus::Unknown);
    assert_eq!(result.attempts, 2);
    assert!(started.elapsed() >= Duration::from_millis(600));
    Ok(())
}

#[tokio::test]
async fn silence_does_not_walk_the_candidate_list() -> anyhow::Result<()> {
    // Port 13 lists Daytime and Chargen; only Daytime gets sent.
    let fixture = Fixture::spawn(Behaviour::Silent).await?;
    let started = Instant::now();
    let result = probe_one(fixture.port(), 13).await?;

    assert_eq!(result.status, PortStatus::Unknown);
    assert_eq!(result.attempts, 2);
    assert!(started.elapsed() < Duration::from_millis(1200));
    Ok(())
}

#[tokio::test]
async fn ntp_server_round_trip() -> anyhow::Result<()> {
    let fixture = Fixture::spawn(Behaviour::NtpServer { stratum: 1 }).await?;
    let result = probe_one(fixture.port(), 123).await?;

    assert_eq!(result.status, PortStatus::Open);
    assert_eq!(result.protocol, Some(Protocol::Ntp));
    assert_eq!(result.details.get("mode"), Some("Server"));
    assert_eq!(result.details.get("stratum"), Some("1"));
    assert_eq!(result.details.get("reference"), Some("GPS"));
    Ok(())
}

#[tokio::test]
async fn echo_server_is_verified() -> anyhow::Result<()> {
    let fixture = Fixture::spawn(Behaviour::Echo).await?;
    let result = probe_one(fixture.port(), 7).await?;

    assert_eq!(result.status, PortStatus::Open);
    assert_eq!(result.details.get("echo_verified"), Some("true"));
    Ok(())
}

#[tokio::test]
async fn uncorrelated_dns_reply_stays_unknown() -> anyhow::Result<()> {
    let fixture = Fixture::spawn(Behaviour::DnsWrongId).await?;
    let result = probe_one(fixture.port(), 53).await?;

    assert_eq!(result.status, PortStatus::Unknown);
    assert_eq!(result.protocol, Some(Protocol::Dns));
    assert_eq!(result.details.get("correlation"), Some("mismatch"));
    Ok(())
}

#[tokio::test]
async fn garbage_falls_back_then_stays_unknown() -> anyhow::Result<()> {
    // Daytime then Chargen, neither accepts binary bytes.
    let fixture = Fixture::spawn(Behaviour::Fixed(vec![0x00, 0xFF, 0x10])).await?;
    let result = probe_one(fixture.port(), 13).await?;

    assert_eq!(result.status, PortStatus::Unknown);
    assert_eq!(result.protocol, None);
    assert_eq!(result.response_size, Some(3));
    assert_eq!(result.attempts, 2);
    Ok(())
}

#[tokio::test]
async fn one_result_per_port_in_a_mixed_run() -> anyhow::Result<()> {
    let time = Fixture::spawn(Behaviour::Fixed(vec![0x83, 0xAA, 0x7E, 0x80])).await?;
    let echo = Fixture::spawn(Behaviour::Echo).await?;
    let silent = Fixture::spawn(Behaviour::Silent).await?;
    let closed = closed_port().await?;

    let results = probe(&[
        (time.port(), 37),
        (echo.port(), 7),
        (silent.port(), 37),
        (closed.port(), 9),
    ])
    .await?;

    assert_eq!(results.len(), 4);
    let ports: HashSet<u16> = results.iter().map(|r| r.port).collect();
    assert_eq!(ports.len(), 4);

    let status_of = |port: u16| results.iter().find(|r| r.port == port).map(|r| r.status);
    assert_eq!(status_of(time.port()), Some(PortStatus::Open));
    assert_eq!(status_of(echo.port()), Some(PortStatus::Open));
    assert_eq!(status_of(silent.port()), Some(PortStatus::Unknown));
    assert_eq!(status_of(closed.port()), Some(PortStatus::Closed));

    let time_result = results.iter().find(|r| r.port == time.port());
    assert_eq!(
        time_result.and_then(|r| r.details.get("timestamp")),
        Some("1970-01-01T00:00:00")
    );
    Ok(())
}
