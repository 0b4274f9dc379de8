//! The network stream under an SMTP session

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_native_tls::{TlsConnector, TlsStream};
use pin_project::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::relay::error::RelayResult;

/// Represents the different types of underlying network streams
#[pin_project(project = NetworkStreamProj)]
pub enum NetworkStream {
    /// Plain TCP stream
    Tcp(#[pin] TcpStream),
    /// Encrypted TCP stream
    Tls(#[pin] TlsStream<TcpStream>),
}

impl fmt::Debug for NetworkStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let peer = self.peer_addr().ok();
        match *self {
            NetworkStream::Tcp(_) => f.debug_tuple("Tcp").field(&peer).finish(),
            NetworkStream::Tls(_) => f.debug_tuple("Tls").field(&peer).finish(),
        }
    }
}

impl NetworkStream {
    /// Opens a plain TCP connection
    pub async fn connect(host: &str, port: u16) -> io::Result<NetworkStream> {
        Ok(NetworkStream::Tcp(TcpStream::connect((host, port)).await?))
    }

    /// Upgrades to TLS, validating the certificate against `domain`.
    ///
    /// An already encrypted stream is returned as is.
    pub async fn upgrade_tls(self, domain: &str) -> RelayResult<NetworkStream> {
        match self {
            NetworkStream::Tcp(stream) => {
                let tls_stream = TlsConnector::new().connect(domain, stream).await?;
                Ok(NetworkStream::Tls(tls_stream))
            }
            tls @ NetworkStream::Tls(_) => Ok(tls),
        }
    }

    /// Is the stream encrypted
    pub fn is_encrypted(&self) -> bool {
        matches!(self, NetworkStream::Tls(_))
    }

    /// Returns peer's address
    pub fn peer_addr(&self) -> io::Result<std::net::SocketAddr> {
        match *self {
            NetworkStream::Tcp(ref s) => s.peer_addr(),
            NetworkStream::Tls(ref s) => s.get_ref().peer_addr(),
        }
    }
}

impl AsyncRead for NetworkStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_read(cx, buf),
            NetworkStreamProj::Tls(s) => s.poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NetworkStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_write(cx, buf),
            NetworkStreamProj::Tls(s) => s.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_flush(cx),
            NetworkStreamProj::Tls(s) => s.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_shutdown(cx),
            NetworkStreamProj::Tls(s) => s.poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_plain_stream_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 ready\r\n").await.unwrap();
        });

        let mut stream = NetworkStream::connect("127.0.0.1", port).await.unwrap();
        assert!(!stream.is_encrypted());
        assert_eq!(stream.peer_addr().unwrap().port(), port);

        let mut greeting = String::new();
        stream.read_to_string(&mut greeting).await.unwrap();
        assert_eq!(greeting, "220 ready\r\n");
        server.await.unwrap();
    }
}
