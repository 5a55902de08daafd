//! Datagram transports carrying RMCP+ packets.
//!
//! Transports only move bytes. Matching responses to requests and
//! enforcing per-call deadlines happens in the clients.

use std::net::{IpAddr, Ipv6Addr, SocketAddr, ToSocketAddrs};
#[cfg(feature = "blocking")]
use std::time::Instant;

use crate::error::{Error, Result};

/// The RMCP well-known port.
pub const DEFAULT_PORT: u16 = 623;

/// Maximum UDP payload we accept.
///
/// IPMI packets are small; 4 KiB is a conservative upper bound.
pub(crate) const DEFAULT_MAX_PACKET_SIZE: usize = 4096;

/// A synchronous datagram channel to one BMC.
#[cfg(feature = "blocking")]
pub trait Transport {
    /// Send one datagram.
    fn send(&self, datagram: &[u8]) -> Result<()>;

    /// Receive the next datagram, failing with [`Error::Timeout`] once
    /// `deadline` passes.
    fn recv(&self, deadline: Instant) -> Result<Vec<u8>>;
}

#[cfg(feature = "async")]
mod async_support {
    use core::future::Future;
    use core::pin::Pin;
    use std::time::Instant;

    use crate::error::Result;

    /// Boxed future returned by [`AsyncTransport`] methods.
    pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

    /// An asynchronous datagram channel to one BMC.
    pub trait AsyncTransport {
        /// Send one datagram.
        fn send<'a>(&'a self, datagram: &'a [u8]) -> TransportFuture<'a, ()>;

        /// Receive the next datagram, failing with
        /// [`Error::Timeout`](crate::Error::Timeout) once `deadline` passes.
        fn recv(&self, deadline: Instant) -> TransportFuture<'_, Vec<u8>>;
    }
}

#[cfg(feature = "async")]
pub use async_support::{AsyncTransport, TransportFuture};

#[cfg(feature = "blocking")]
pub(crate) mod blocking;

#[cfg(feature = "async")]
pub(crate) mod tokio;

#[cfg(feature = "blocking")]
pub use blocking::UdpTransport;

#[cfg(feature = "async")]
pub use self::tokio::UdpTransport as TokioUdpTransport;

/// Resolve `host`, `host:port`, `ip`, `ip:port` or `[ipv6]:port`.
///
/// The port defaults to [`DEFAULT_PORT`].
pub fn resolve_target(target: &str) -> Result<SocketAddr> {
    let target = target.trim();
    if target.is_empty() {
        return Err(Error::InvalidArgument("empty target address"));
    }

    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }
    if let Some(inner) = target.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        let ip: Ipv6Addr = inner
            .parse()
            .map_err(|_| Error::InvalidArgument("invalid bracketed IPv6 address"))?;
        return Ok(SocketAddr::new(IpAddr::V6(ip), DEFAULT_PORT));
    }

    let mut addrs = match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::InvalidArgument("invalid port"))?;
            (host, port).to_socket_addrs()?
        }
        _ => (target, DEFAULT_PORT).to_socket_addrs()?,
    };
    addrs
        .next()
        .ok_or(Error::InvalidArgument("target did not resolve to any address"))
}
