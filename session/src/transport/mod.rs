pub mod link_conditioner;

use std::{
    io::{self, ErrorKind},
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
};

use log::warn;

use link_conditioner::LinkConditioner;

/// Non-blocking UDP socket owned by a session.
///
/// Send failures are transient from the protocol's point of view
/// (retransmission covers reliable traffic), so they are logged and
/// swallowed. The receive side never blocks; the session's drain loop
/// runs until [`try_receive`] reports the socket empty.
///
/// [`try_receive`]: DatagramSocket::try_receive
pub struct DatagramSocket {
    socket: UdpSocket,
    conditioner: Option<LinkConditioner>,
}

impl DatagramSocket {
    /// Bind to `addr` (e.g. `"0.0.0.0:5000"`, or port 0 for ephemeral)
    /// and switch the socket to non-blocking mode.
    pub fn bind(addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket,
            conditioner: None,
        })
    }

    /// Resolve a `host:port` string to a single endpoint.
    pub fn resolve(host: &str) -> io::Result<SocketAddr> {
        host.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(ErrorKind::AddrNotAvailable, "host resolved to no addresses")
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Install (or remove) synthetic incoming loss.
    pub fn set_conditioner(&mut self, conditioner: Option<LinkConditioner>) {
        self.conditioner = conditioner;
    }

    /// Best-effort send. Returns whether the datagram left the socket.
    pub fn send(&self, payload: &[u8], to: &SocketAddr) -> bool {
        match self.socket.send_to(payload, to) {
            Ok(sent) if sent == payload.len() => true,
            Ok(sent) => {
                warn!("short send to {to}: {sent} of {} bytes", payload.len());
                false
            }
            Err(error) if error.kind() == ErrorKind::WouldBlock => false,
            Err(error) => {
                warn!("send to {to} failed: {error}");
                false
            }
        }
    }

    /// Receive one datagram if any is queued.
    ///
    /// Returns `None` when the socket has nothing to deliver this tick,
    /// either because it is drained (`WouldBlock`) or because an error
    /// ended the drain. Datagrams may also be synthetically dropped by
    /// the link conditioner.
    pub fn try_receive(&mut self, buffer: &mut [u8]) -> Option<(usize, SocketAddr)> {
        loop {
            match self.socket.recv_from(buffer) {
                Ok((length, from)) => {
                    if let Some(conditioner) = &mut self.conditioner {
                        if conditioner.should_drop() {
                            continue;
                        }
                    }
                    return Some((length, from));
                }
                Err(error) if error.kind() == ErrorKind::WouldBlock => return None,
                Err(error) => {
                    warn!("recv failed: {error}");
                    return None;
                }
            }
        }
    }
}
