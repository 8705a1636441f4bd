//! Datagram transport used by the resolver.
//!
//! The resolver only needs one capability from the network: send a query
//! to an address and wait, up to a timeout, for one datagram back. That
//! capability is the [`Transport`] trait; [`UdpTransport`] is the real
//! implementation over a blocking `std::net::UdpSocket`.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::TransportError;

/// Largest response accepted over UDP with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Sends one query datagram and returns the response datagram.
pub trait Transport {
    /// Sends `query` to `server` and waits for the reply.
    ///
    /// `timeout` bounds the whole exchange, not each read.
    ///
    /// # Errors
    ///
    /// [`TransportError::Timeout`] when no reply from `server` arrives in
    /// time, [`TransportError::Io`] for socket failures.
    fn send(
        &self,
        server: SocketAddr,
        query: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(
        &self,
        server: SocketAddr,
        query: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).send(server, query, timeout)
    }
}

/// DNS over UDP (RFC 1035 §4.2.1).
///
/// Each call binds a fresh socket on an ephemeral port, so consecutive
/// queries never see each other's late replies.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpTransport;

impl UdpTransport {
    /// Creates the transport. It holds no state; sockets are per call.
    pub fn new() -> Self {
        UdpTransport
    }
}

impl Transport for UdpTransport {
    fn send(
        &self,
        server: SocketAddr,
        query: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let io_err = |source| TransportError::Io { server, source };

        let bind_addr: SocketAddr = if server.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr).map_err(io_err)?;
        let deadline = Instant::now() + timeout;

        let bytes_sent = socket.send_to(query, server).map_err(io_err)?;
        debug!(server = %server, bytes_sent, "UDP query sent");

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            // Datagrams from other sources must not extend the wait.
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|d| !d.is_zero())
                .ok_or(TransportError::Timeout(server))?;
            socket.set_read_timeout(Some(remaining)).map_err(io_err)?;

            let (bytes_received, from_addr) =
                socket.recv_from(&mut recv_buf).map_err(|e| match e.kind() {
                    ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                        TransportError::Timeout(server)
                    }
                    _ => io_err(e),
                })?;

            if from_addr != server {
                warn!(
                    expected = %server,
                    received_from = %from_addr,
                    "UDP response from unexpected source, ignoring"
                );
                continue;
            }

            debug!(server = %server, bytes_received, "UDP response received");
            recv_buf.truncate(bytes_received);
            return Ok(recv_buf);
        }
    }
}
