//! One UDP socket per attempt: send the request, wait for the first reply,
//! optionally linger for more.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{self, Instant};
use tracing::trace;
use udprobe_protocols::ProbeRequest;

/// Upper bound on datagrams collected during a linger window.
const MAX_LINGER_DATAGRAMS: usize = 32;

/// Socket level failure of a single attempt. Never fatal for the run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to configure socket for {target}: {source}")]
    Configure {
        target: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to send to {target}: {source}")]
    Send {
        target: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to receive from {target}: {source}")]
    Receive {
        target: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// First datagram of an answered attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub payload: Vec<u8>,
    pub source: SocketAddr,
    pub received_at: Instant,
    /// Datagrams seen in total, including ones collected while lingering.
    pub datagrams: usize,
}

impl Reply {
    pub fn new(payload: Vec<u8>, source: SocketAddr) -> Self {
        Self {
            payload,
            source,
            received_at: Instant::now(),
            datagrams: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResponse {
    Data(Reply),
    /// Nothing arrived in time. Open and filtered look the same.
    TimedOut,
    /// The peer's stack answered with ICMP port unreachable.
    Unreachable,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` to `target` and waits up to `timeout` for the first
    /// reply.
    async fn send_and_wait(
        &self,
        request: &ProbeRequest,
        target: SocketAddr,
        timeout: Duration,
    ) -> Result<ProbeResponse, TransportError>;
}

/// Kernel UDP sockets through tokio.
///
/// Unicast requests use a connected socket so that ICMP port unreachable is
/// reported back as `ECONNREFUSED` and stray datagrams from other peers are
/// filtered by the kernel. Broadcast requests stay unconnected, since the
/// answer may come from any server.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpTransport;

impl UdpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_and_wait(
        &self,
        request: &ProbeRequest,
        target: SocketAddr,
        timeout: Duration,
    ) -> Result<ProbeResponse, TransportError> {
        let socket = open_socket(request, target).await?;
        let connected = !request.broadcast;

        let sent = if connected {
            socket.send(&request.payload).await
        } else {
            socket.send_to(&request.payload, target).await
        };
        match sent {
            Ok(_) => {}
            Err(e) if is_unreachable(&e) => return Ok(ProbeResponse::Unreachable),
            Err(source) => return Err(TransportError::Send { target, source }),
        }

        let mut buf = vec![0u8; request.max_response_size.max(1)];
        let first = match time::timeout(timeout, receive(&socket, connected, &mut buf)).await {
            Err(_elapsed) => return Ok(ProbeResponse::TimedOut),
            Ok(Err(e)) if is_unreachable(&e) => return Ok(ProbeResponse::Unreachable),
            Ok(Err(source)) => return Err(TransportError::Receive { target, source }),
            Ok(Ok((len, source))) => Reply::new(buf[..len].to_vec(), source),
        };
        trace!(
            "{} bytes from {} for {}",
            first.payload.len(),
            first.source,
            request.protocol
        );

        let Some(linger) = request.linger else {
            return Ok(ProbeResponse::Data(first));
        };

        let mut reply = first;
        let deadline = Instant::now() + linger;
        while reply.datagrams < MAX_LINGER_DATAGRAMS {
            match time::timeout_at(deadline, receive(&socket, connected, &mut buf)).await {
                Ok(Ok(_)) => reply.datagrams += 1,
                Ok(Err(_)) | Err(_) => break,
            }
        }
        Ok(ProbeResponse::Data(reply))
    }
}

async fn open_socket(request: &ProbeRequest, target: SocketAddr) -> Result<UdpSocket, TransportError> {
    let addr = unspecified_for(target.ip());
    let socket = UdpSocket::bind(addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })?;

    if request.broadcast {
        socket
            .set_broadcast(true)
            .map_err(|source| TransportError::Configure { target, source })?;
    } else {
        socket
            .connect(target)
            .await
            .map_err(|source| TransportError::Configure { target, source })?;
    }
    Ok(socket)
}

async fn receive(socket: &UdpSocket, connected: bool, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
    if connected {
        let len = socket.recv(buf).await?;
        Ok((len, socket.peer_addr()?))
    } else {
        socket.recv_from(buf).await
    }
}

fn unspecified_for(ip: IpAddr) -> SocketAddr {
    match ip {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
}

/// Linux reports ICMP port unreachable as `ECONNREFUSED`, Windows as
/// `WSAECONNRESET`.
fn is_unreachable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
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
    use udprobe_protocols::Protocol;

    async fn loopback_server() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[tokio::test]
    async fn reply_is_capped_at_max_response_size() {
        let (server, addr) = loopback_server().await;
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(&[b'x'; 2048], peer).await.unwrap();
        });

        let request = ProbeRequest::new(Protocol::Chargen, vec![0]).with_max_response_size(512);
        let response = UdpTransport::new()
            .send_and_wait(&request, addr, Duration::from_secs(2))
            .await
            .unwrap();
        let ProbeResponse::Data(reply) = response else {
            panic!("expected data, got {response:?}");
        };
        assert_eq!(reply.payload.len(), 512);
        assert_eq!(reply.source, addr);
        assert_eq!(reply.datagrams, 1);
    }

    #[tokio::test]
    async fn silence_times_out() {
        let (_server, addr) = loopback_server().await;
        let request = ProbeRequest::new(Protocol::Time, Vec::new());
        let response = UdpTransport::new()
            .send_and_wait(&request, addr, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(response, ProbeResponse::TimedOut);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let addr = {
            let (socket, addr) = loopback_server().await;
            drop(socket);
            addr
        };
        let request = ProbeRequest::new(Protocol::Echo, b"ping".to_vec());
        let response = UdpTransport::new()
            .send_and_wait(&request, addr, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response, ProbeResponse::Unreachable);
    }

    #[tokio::test]
    async fn linger_counts_extra_datagrams() {
        let (server, addr) = loopback_server().await;
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            for i in 0..3u8 {
                server.send_to(&[i], peer).await.unwrap();
            }
        });

        let request = ProbeRequest::new(Protocol::Echo, b"ping".to_vec())
            .with_linger(Duration::from_millis(200));
        let response = UdpTransport::new()
            .send_and_wait(&request, addr, Duration::from_secs(2))
            .await
            .unwrap();
        let ProbeResponse::Data(reply) = response else {
            panic!("expected data, got {response:?}");
        };
        assert_eq!(reply.payload, vec![0]);
        assert_eq!(reply.datagrams, 3);
    }
}
