use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::trace;

/// Largest datagram either side will send or accept. The protocol does not fragment:
///  a message that does not fit is not expressible.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// The client's socket-like send/receive capability. This trait decouples the retry state
///  machine from UDP so the state machine can be driven by a scripted transport in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, buf: &[u8]) -> anyhow::Result<()>;

    /// receives one datagram into `buf`, returning its length
    async fn recv(&self, buf: &mut [u8]) -> anyhow::Result<usize>;
}

/// One UDP socket bound to an ephemeral port and connected to the server address.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn connect(server_addr: SocketAddr) -> anyhow::Result<UdpTransport> {
        let bind_addr = if server_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server_addr).await?;
        Ok(UdpTransport { socket })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, buf: &[u8]) -> anyhow::Result<()> {
        trace!("sending {} byte datagram", buf.len());
        self.socket.send(buf).await?;
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> anyhow::Result<usize> {
        let num_read = self.socket.recv(buf).await?;
        trace!("received {} byte datagram", num_read);
        Ok(num_read)
    }
}
