use std::io::Write;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rosetta_api::{Destination, Transport};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("resolve {host}:{port}: {detail}")]
    Resolve { host: String, port: u16, detail: String },

    #[error("{transport} connect to {addr}: {source}")]
    Connect {
        transport: Transport,
        addr: String,
        source: std::io::Error,
    },

    #[error("{transport} send to {addr}: {source}")]
    Send {
        transport: Transport,
        addr: String,
        source: std::io::Error,
    },
}

// ═══════════════════════════════════════════════════════════════
//  Forwarder
// ═══════════════════════════════════════════════════════════════

/// Relays rendered messages to one destination.
///
/// TCP keeps at most one connection, opened lazily on the first send and
/// dropped on any write error; the next send reconnects. UDP uses a fresh
/// socket per message. No retries, no queueing.
pub struct Forwarder {
    destination: Destination,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl Forwarder {
    pub fn new(destination: Destination) -> Self {
        Self::with_timeout(destination, DEFAULT_CONNECT_TIMEOUT)
    }

    /// `timeout` bounds both connect and write on TCP.
    pub fn with_timeout(destination: Destination, timeout: Duration) -> Self {
        Self {
            destination,
            timeout,
            stream: Mutex::new(None),
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Deliver `message`; `true` on success.
    pub fn send(&self, message: &str) -> bool {
        self.try_send(message).is_ok()
    }

    /// Deliver `message`, reporting why it failed.
    pub fn try_send(&self, message: &str) -> Result<(), ForwardError> {
        match self.destination.transport {
            Transport::Tcp => self.send_tcp(message.as_bytes()),
            Transport::Udp => self.send_udp(message.as_bytes()),
        }
    }

    /// Release the TCP connection, if any. Idempotent.
    pub fn close(&self) {
        if let Some(stream) = self.lock_stream().take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock_stream().is_some()
    }

    fn send_tcp(&self, data: &[u8]) -> Result<(), ForwardError> {
        let mut guard = self.lock_stream();

        // Only a stream that just took a full write goes back in the slot.
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => self.connect()?,
        };
        stream
            .write_all(data)
            .and_then(|_| stream.flush())
            .map_err(|source| ForwardError::Send {
                transport: Transport::Tcp,
                addr: self.addr_label(),
                source,
            })?;
        *guard = Some(stream);
        Ok(())
    }

    fn connect(&self) -> Result<TcpStream, ForwardError> {
        let mut last_err = None;
        for addr in self.resolve()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    let _ = stream.set_write_timeout(Some(self.timeout));
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(ForwardError::Connect {
            transport: Transport::Tcp,
            addr: self.addr_label(),
            source: last_err.unwrap_or_else(|| std::io::Error::other("no address to connect to")),
        })
    }

    fn send_udp(&self, data: &[u8]) -> Result<(), ForwardError> {
        let target = self.resolve()?.into_iter().next().ok_or_else(|| self.unresolved("no addresses"))?;
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let send_err = |source| ForwardError::Send {
            transport: Transport::Udp,
            addr: self.addr_label(),
            source,
        };
        let socket = UdpSocket::bind(local).map_err(send_err)?;
        socket.send_to(data, target).map_err(send_err)?;
        Ok(())
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, ForwardError> {
        let addrs: Vec<SocketAddr> = (self.destination.host.as_str(), self.destination.port)
            .to_socket_addrs()
            .map_err(|e| self.unresolved(e.to_string()))?
            .collect();
        if addrs.is_empty() {
            return Err(self.unresolved("no addresses"));
        }
        Ok(addrs)
    }

    fn unresolved(&self, detail: impl Into<String>) -> ForwardError {
        ForwardError::Resolve {
            host: self.destination.host.clone(),
            port: self.destination.port,
            detail: detail.into(),
        }
    }

    fn addr_label(&self) -> String {
        format!("{}:{}", self.destination.host, self.destination.port)
    }

    fn lock_stream(&self) -> MutexGuard<'_, Option<TcpStream>> {
        // A panic while holding the lock leaves at worst a stale stream,
        // which the next failed write discards.
        self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;
    use std::time::Instant;

    use super::*;

    fn read_exact(listener: &TcpListener, len: usize) -> (TcpStream, Vec<u8>) {
        let (mut stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).unwrap();
        (stream, buf)
    }

    fn unused_port() -> u16 {
        TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }

    #[test]
    fn tcp_reuses_one_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fwd = Forwarder::new(Destination::tcp("127.0.0.1", listener.local_addr().unwrap().port()));

        assert!(fwd.send("abc"));
        assert!(fwd.send("def"));
        let (_conn, data) = read_exact(&listener, 6);
        assert_eq!(data, b"abcdef");
        assert!(fwd.is_connected());
    }

    #[test]
    fn tcp_connect_failure_stays_closed_then_retries() {
        let port = unused_port();
        let fwd = Forwarder::with_timeout(Destination::tcp("127.0.0.1", port), Duration::from_millis(500));

        assert!(!fwd.send("x"));
        assert!(!fwd.is_connected());
        assert!(matches!(fwd.try_send("x"), Err(ForwardError::Connect { .. })));

        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
        assert!(fwd.send("x"));
        let (_conn, data) = read_exact(&listener, 1);
        assert_eq!(data, b"x");
    }

    #[test]
    fn tcp_reconnects_after_severed_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fwd = Forwarder::new(Destination::tcp("127.0.0.1", listener.local_addr().unwrap().port()));

        assert!(fwd.send("first"));
        let (conn, _) = read_exact(&listener, 5);
        drop(conn);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut failure = None;
        while Instant::now() < deadline {
            if let Err(e) = fwd.try_send("ping") {
                failure = Some(e);
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        let failure = failure.expect("write to a closed peer never failed");
        assert!(matches!(failure, ForwardError::Send { transport: Transport::Tcp, .. }), "{failure}");
        assert!(!fwd.is_connected());

        assert!(fwd.send("again"));
        let (_conn, data) = read_exact(&listener, 5);
        assert_eq!(data, b"again");
    }

    #[test]
    fn udp_sends_one_datagram_per_message() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let fwd = Forwarder::new(Destination::udp("127.0.0.1", receiver.local_addr().unwrap().port()));

        assert!(fwd.send("one"));
        assert!(fwd.send("two"));
        assert!(!fwd.is_connected());

        let mut buf = [0u8; 16];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"one");
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"two");
    }

    #[test]
    fn unresolvable_host() {
        let fwd = Forwarder::new(Destination::udp("host.invalid.", 9));
        assert!(matches!(fwd.try_send("x"), Err(ForwardError::Resolve { .. })));
    }

    #[test]
    fn close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fwd = Forwarder::new(Destination::tcp("127.0.0.1", listener.local_addr().unwrap().port()));
        fwd.close();
        assert!(fwd.send("x"));
        fwd.close();
        fwd.close();
        assert!(!fwd.is_connected());
    }
}
