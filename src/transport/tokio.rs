use std::net::SocketAddr;
use std::time::Instant;

use tokio::net::UdpSocket;

use crate::error::{Error, Result};
use crate::transport::{AsyncTransport, DEFAULT_MAX_PACKET_SIZE, TransportFuture};

/// Tokio UDP transport for RMCP+/IPMI.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    max_packet_size: usize,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to an RMCP+ target.
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        let bind_addr = match target {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;

        Ok(Self {
            socket,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        })
    }

    async fn recv_impl(&self, deadline: Instant) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.max_packet_size];
        let deadline = tokio::time::Instant::from_std(deadline);

        match tokio::time::timeout_at(deadline, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(buf)
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_elapsed) => Err(Error::Timeout),
        }
    }
}

impl AsyncTransport for UdpTransport {
    fn send<'a>(&'a self, datagram: &'a [u8]) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            self.socket.send(datagram).await?;
            Ok(())
        })
    }

    fn recv(&self, deadline: Instant) -> TransportFuture<'_, Vec<u8>> {
        Box::pin(self.recv_impl(deadline))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn recv_times_out_at_deadline() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
        let transport = UdpTransport::connect(peer.local_addr().expect("addr"))
            .await
            .expect("connect");

        transport.send(b"ping").await.expect("send");
        let mut buf = [0u8; 16];
        let (n, _) = peer.recv_from(&mut buf).await.expect("peer recv");
        assert_eq!(&buf[..n], b"ping");

        let err = transport
            .recv(Instant::now() + Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }
}
