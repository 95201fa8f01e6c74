//! TCP link to an instrument server.
//!
//! [`InstrumentLink`] owns exactly one socket. It knows nothing about the
//! command grammar; it only moves bytes and maps every transport failure
//! into an [`InstrumentError`].

use crate::error::{InstrumentError, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A persistent, exclusively owned TCP connection.
#[derive(Debug)]
pub struct InstrumentLink {
    addr: String,
    stream: Option<TcpStream>,
}

impl InstrumentLink {
    /// Open a connection to `address:port`.
    ///
    /// Fails with [`InstrumentError::Connection`] if the endpoint refuses, is
    /// unreachable, or does not accept within `connect_timeout`.
    pub async fn connect(address: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let addr = format!("{address}:{port}");

        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| InstrumentError::Connection {
                addr: addr.clone(),
                message: format!("connection timed out after {connect_timeout:?}"),
            })?
            .map_err(|e| InstrumentError::Connection {
                addr: addr.clone(),
                message: e.to_string(),
            })?;

        // Replies are tiny; don't let Nagle hold commands back
        stream.set_nodelay(true)?;

        tracing::info!(%addr, "Connected to instrument server");

        Ok(Self {
            addr,
            stream: Some(stream),
        })
    }

    /// `address:port` of the remote end.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether the socket is still held.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        let addr = &self.addr;
        self.stream
            .as_mut()
            .ok_or_else(|| InstrumentError::Connection {
                addr: addr.clone(),
                message: "link is closed".into(),
            })
    }

    /// Write all of `bytes` to the socket.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream_mut()?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read up to `max_bytes`.
    ///
    /// Blocks until at least one byte arrives or the peer closes the
    /// connection, in which case the returned buffer is empty.
    pub async fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let stream = self.stream_mut()?;
        let mut buffer = vec![0u8; max_bytes];
        let n = stream.read(&mut buffer).await?;
        buffer.truncate(n);
        Ok(buffer)
    }

    /// Release the socket. Calling this more than once is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            // Peer may already be gone; the socket is dropped either way
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(addr = %self.addr, error = %e, "Shutdown on close failed");
            }
            tracing::info!(addr = %self.addr, "Disconnected from instrument server");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_send_receive_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&buf[..n]).await.unwrap();
        });

        let mut link = InstrumentLink::connect("127.0.0.1", port, DEFAULT_CONNECT_TIMEOUT)
            .await
            .unwrap();
        assert!(link.is_open());
        link.send(b"PING").await.unwrap();
        assert_eq!(link.receive(10).await.unwrap(), b"PING");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_after_peer_close_is_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut link = InstrumentLink::connect("127.0.0.1", port, DEFAULT_CONNECT_TIMEOUT)
            .await
            .unwrap();
        server.await.unwrap();
        assert!(link.receive(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = InstrumentLink::connect("127.0.0.1", port, DEFAULT_CONNECT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.map(|(s, _)| s) });

        let mut link = InstrumentLink::connect("127.0.0.1", port, DEFAULT_CONNECT_TIMEOUT)
            .await
            .unwrap();
        let _peer = accept.await.unwrap().unwrap();

        link.close().await.unwrap();
        link.close().await.unwrap();
        assert!(!link.is_open());

        let err = link.send(b"X").await.unwrap_err();
        assert!(err.is_connection());
    }
}
