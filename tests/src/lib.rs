//! Loopback UDP fixtures standing in for real services.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use udprobe_common::network::port::PortList;
use udprobe_core::{Backoff, ScanConfig};

/// How a fixture answers each datagram it receives.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Always sends these bytes.
    Fixed(Vec<u8>),
    /// Reflects the request.
    Echo,
    /// Server-mode NTP reply echoing the client's transmit timestamp.
    NtpServer { stratum: u8 },
    /// DNS reply to the query, with the transaction id flipped.
    DnsWrongId,
    /// Reads and never answers.
    Silent,
}

pub struct Fixture {
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Fixture {
    pub async fn spawn(behaviour: Behaviour) -> anyhow::Result<Self> {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await?);
        let addr = socket.local_addr()?;

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    continue;
                };
                if let Some(reply) = answer(&behaviour, &buf[..len]) {
                    let _ = socket.send_to(&reply, peer).await;
                }
            }
        });

        Ok(Self { addr, task })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn answer(behaviour: &Behaviour, request: &[u8]) -> Option<Vec<u8>> {
    match behaviour {
        Behaviour::Fixed(bytes) => Some(bytes.clone()),
        Behaviour::Echo => Some(request.to_vec()),
        Behaviour::Silent => None,
        Behaviour::NtpServer { stratum } => {
            let transmit = request.get(40..48)?;
            let mut reply = vec![0u8; 48];
            reply[0] = (4 << 3) | 4;
            reply[1] = *stratum;
            reply[2] = 6;
            reply[3] = 0xEC;
            reply[12..16].copy_from_slice(b"GPS\0");
            reply[24..32].copy_from_slice(transmit);
            reply[40..48].copy_from_slice(transmit);
            Some(reply)
        }
        Behaviour::DnsWrongId => {
            let mut reply = request.to_vec();
            *reply.first_mut()? ^= 0xFF;
            *reply.get_mut(2)? |= 0x80;
            Some(reply)
        }
    }
}

/// A port on loopback with nothing bound to it.
pub async fn closed_port() -> anyhow::Result<SocketAddr> {
    let socket = UdpSocket::bind("127.0.0.1:0").await?;
    let addr = socket.local_addr()?;
    drop(socket);
    Ok(addr)
}

/// Short timeouts, no pacing.
pub fn fast_config(ports: Vec<u16>) -> ScanConfig {
    ScanConfig {
        timeout: Duration::from_millis(300),
        max_retries: 1,
        max_concurrency: 8,
        max_sends_per_second: 0,
        ports: PortList::from(ports),
        backoff: Backoff::Fixed(Duration::from_millis(20)),
        ..ScanConfig::default()
    }
}
