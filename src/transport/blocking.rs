use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::transport::{DEFAULT_MAX_PACKET_SIZE, Transport};

/// Blocking UDP transport for RMCP+/IPMI.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    max_packet_size: usize,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to an RMCP+ target.
    pub fn connect(target: SocketAddr) -> Result<Self> {
        let bind_addr = match target {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };

        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(target)?;

        Ok(Self {
            socket,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        })
    }

    /// The connected peer.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.peer_addr()?)
    }
}

impl Transport for UdpTransport {
    fn send(&self, datagram: &[u8]) -> Result<()> {
        self.socket.send(datagram)?;
        Ok(())
    }

    fn recv(&self, deadline: Instant) -> Result<Vec<u8>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout);
        }
        self.socket.set_read_timeout(Some(remaining))?;

        let mut buf = vec![0u8; self.max_packet_size];
        match self.socket.recv(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if is_timeout(&e) => Err(Error::Timeout),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn exchanges_datagrams_with_a_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").expect("bind");
        let transport = UdpTransport::connect(peer.local_addr().expect("addr")).expect("connect");

        transport.send(b"ping").expect("send");
        let mut buf = [0u8; 16];
        let (n, from) = peer.recv_from(&mut buf).expect("peer recv");
        assert_eq!(&buf[..n], b"ping");

        peer.send_to(b"pong", from).expect("peer send");
        let got = transport
            .recv(Instant::now() + Duration::from_secs(2))
            .expect("recv");
        assert_eq!(got, b"pong");
    }

    #[test]
    fn recv_times_out_at_deadline() {
        let peer = UdpSocket::bind("127.0.0.1:0").expect("bind");
        let transport = UdpTransport::connect(peer.local_addr().expect("addr")).expect("connect");

        let err = transport
            .recv(Instant::now() + Duration::from_millis(30))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(matches!(transport.recv(Instant::now()), Err(Error::Timeout)));
    }
}
