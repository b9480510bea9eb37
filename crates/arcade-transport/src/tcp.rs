//! TCP transport with length-prefixed frames.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_LEN};
use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    max_frame_len: usize,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// Sets the largest frame accepted from (or sent to) a peer.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len.max(1);
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let _ = stream.set_nodelay(true);

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer_addr, "accepted TCP connection");

        let (read_half, write_half) = stream.into_split();
        Ok(TcpConnection {
            id,
            peer_addr,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            max_frame_len: self.max_frame_len,
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A single framed TCP connection.
///
/// The read and write halves sit behind separate locks: one reader and one
/// writer at a time, and a frame is always written whole.
pub struct TcpConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    max_frame_len: usize,
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, data, self.max_frame_len).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        read_frame(&mut *reader, self.max_frame_len).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}
