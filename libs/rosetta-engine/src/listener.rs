use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One received datagram, decoded and stamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    /// Payload text. Undecodable bytes are replaced, never dropped.
    pub payload: String,
    pub source: SocketAddr,
    pub received_at: DateTime<Utc>,
}

/// Receives packets on the listener's own task.
///
/// Called synchronously from the receive loop: time spent here delays
/// the next `recv`.
pub trait PacketHandler: Send + Sync + 'static {
    fn on_packet(&self, packet: InboundPacket);
}

impl<F> PacketHandler for F
where
    F: Fn(InboundPacket) + Send + Sync + 'static,
{
    fn on_packet(&self, packet: InboundPacket) {
        self(packet)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: std::io::Error },
}

#[derive(Debug, Clone, Copy)]
pub struct ListenerOptions {
    /// Largest datagram accepted whole.
    pub recv_buffer: usize,
    /// How long one `recv` may block before the stop flag is rechecked.
    pub poll_interval: Duration,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            recv_buffer: 65_535,
            poll_interval: Duration::from_millis(250),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  UdpListener
// ═══════════════════════════════════════════════════════════════

/// UDP receive loop on a dedicated blocking task.
pub struct UdpListener {
    local_addr: SocketAddr,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl UdpListener {
    /// Bind `ip:port` and start receiving. Binding happens before this
    /// returns, so an unavailable port is reported here.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<H: PacketHandler>(
        ip: IpAddr,
        port: u16,
        options: ListenerOptions,
        handler: Arc<H>,
    ) -> Result<Self, ListenerError> {
        let addr = SocketAddr::new(ip, port);
        let socket = UdpSocket::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
        socket
            .set_read_timeout(Some(options.poll_interval))
            .map_err(|source| ListenerError::Bind { addr, source })?;
        let local_addr = socket.local_addr().map_err(|source| ListenerError::Bind { addr, source })?;

        tracing::info!(addr = %local_addr, "udp listener bound");

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let handle = tokio::task::spawn_blocking(move || {
            receive_loop(socket, options.recv_buffer, &*handler, &loop_token);
            tracing::info!(addr = %local_addr, "udp listener stopped");
        });

        Ok(Self {
            local_addr,
            token,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Ask the loop to exit. Takes effect once the current `recv` returns
    /// (at most one poll interval). Idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(addr = %self.local_addr, error = %e, "udp listener task failed");
            }
        }
    }
}

impl Drop for UdpListener {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Never returns early on a per-datagram problem: receive errors and
/// handler panics are logged and the loop carries on.
fn receive_loop(socket: UdpSocket, recv_buffer: usize, handler: &dyn PacketHandler, token: &CancellationToken) {
    let mut buf = vec![0u8; recv_buffer.max(1)];

    while !token.is_cancelled() {
        let (n, source) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "udp receive error, continuing");
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
        };

        let packet = InboundPacket {
            payload: String::from_utf8_lossy(&buf[..n]).into_owned(),
            source,
            received_at: Utc::now(),
        };
        tracing::debug!(%source, bytes = n, "datagram received");

        if catch_unwind(AssertUnwindSafe(|| handler.on_packet(packet))).is_err() {
            tracing::error!(%source, "packet handler panicked, continuing");
        }
    }
}
